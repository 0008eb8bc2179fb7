//! Declarative field schemas for request data.
//!
//! A [`Schema`] turns raw JSON into a validated [`Object`] whose values are
//! already coerced to the column types, or fails with a [`ValidationError`]
//! listing a message per field.

pub mod definitions;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::database::Object;
use crate::security::Identity;

#[derive(Debug, Error)]
#[error("Submitted data is not valid")]
pub struct ValidationError {
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self { fields: BTreeMap::new() }
    }

    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.add(name, message);
        error
    }

    pub fn add(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.fields.insert(name.into(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    String,
    Boolean,
    DateTime,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::String => "String",
            FieldType::Boolean => "Boolean",
            FieldType::DateTime => "DateTime",
        }
    }
}

/// How missing fields are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Creating an object: required fields must be present
    Full,
    /// Updating an object: only submitted fields are validated
    Partial,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub one_of: Option<&'static [&'static str]>,
    pub email: bool,
    /// Permission needed to submit a value for this field
    pub write_permission: Option<&'static str>,
}

impl Field {
    const fn new(name: &'static str, kind: FieldType) -> Self {
        Self {
            name,
            kind,
            required: true,
            nullable: false,
            min_length: None,
            max_length: None,
            one_of: None,
            email: false,
            write_permission: None,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// Field may be omitted or sent as null
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self.nullable = true;
        self
    }

    /// Field may be omitted but never null
    pub const fn missing_ok(mut self) -> Self {
        self.required = false;
        self
    }

    pub const fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub const fn one_of(mut self, choices: &'static [&'static str]) -> Self {
        self.one_of = Some(choices);
        self
    }

    pub const fn email(mut self) -> Self {
        self.email = true;
        self
    }

    pub const fn write_permission(mut self, permission: &'static str) -> Self {
        self.write_permission = Some(permission);
        self
    }

    fn deserialize(&self, raw: &Value) -> Result<Value, String> {
        if raw.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err("Required".to_string())
            };
        }

        let value = match self.kind {
            FieldType::Integer => coerce_integer(raw).map(Value::from),
            FieldType::Boolean => coerce_boolean(raw).map(Value::from),
            FieldType::String => raw.as_str().map(|s| Value::from(s.trim())),
            FieldType::DateTime => raw
                .as_str()
                .and_then(parse_datetime)
                .map(|dt| Value::from(format_datetime(&dt))),
        }
        .ok_or_else(|| format!("\"{}\" is not a valid {}", display(raw), self.kind.name()))?;

        if let Value::String(text) = &value {
            self.check_text(text)?;
        }
        Ok(value)
    }

    fn check_text(&self, text: &str) -> Result<(), String> {
        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(format!("Shorter than minimum length {}", min));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(format!("Longer than maximum length {}", max));
            }
        }
        if let Some(choices) = self.one_of {
            if !choices.contains(&text) {
                return Err(format!("\"{}\" is not one of {}", text, choices.join(", ")));
            }
        }
        if self.email && !is_email(text) {
            return Err("Invalid email address".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    /// Validate one submitted object.
    ///
    /// Keys that are not schema fields are dropped. Fields guarded by a write
    /// permission are rejected when `identity` does not hold it.
    pub fn deserialize(&self, data: &Value, mode: Mode, identity: &Identity) -> Result<Object, ValidationError> {
        let Some(input) = data.as_object() else {
            return Err(ValidationError::field(self.name, "Expected an object"));
        };

        let mut errors = ValidationError::new();
        let mut output = Object::new();

        for field in self.fields {
            match input.get(field.name) {
                None => {
                    if mode == Mode::Full && field.required {
                        errors.add(field.name, "Required");
                    }
                }
                Some(raw) => {
                    if let Some(permission) = field.write_permission {
                        if !identity.has_permission(permission) {
                            errors.add(field.name, "Permission denied");
                            continue;
                        }
                    }
                    match field.deserialize(raw) {
                        Ok(value) => {
                            output.insert(field.name.to_string(), value);
                        }
                        Err(message) => errors.add(field.name, message),
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn describe(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "type": f.kind.name(),
                    "required": f.required,
                    "nullable": f.nullable,
                })
            })
            .collect();
        json!({ "name": self.name, "fields": fields })
    }
}

/// Parse a datetime in RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD` form.
///
/// Naive values are taken as UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

/// Storage form of datetime values
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn coerce_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn is_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn display(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static THING: Schema = Schema {
        name: "thing",
        fields: &[
            Field::string("name").length(3, 20),
            Field::integer("count").optional(),
            Field::boolean("flag").missing_ok().write_permission("thing_set_flag"),
            Field::datetime("when").optional(),
        ],
    };

    #[test]
    fn full_mode_requires_fields() {
        let err = THING.deserialize(&json!({}), Mode::Full, &Identity::anonymous()).unwrap_err();
        assert_eq!(err.fields.get("name").map(String::as_str), Some("Required"));
        assert_eq!(err.fields.len(), 1);
    }

    #[test]
    fn partial_mode_validates_submitted_fields_only() {
        let data = THING
            .deserialize(&json!({"count": "42", "unknown": 1}), Mode::Partial, &Identity::anonymous())
            .unwrap();
        assert_eq!(data.get("count"), Some(&json!(42)));
        assert!(!data.contains_key("unknown"));
        assert!(!data.contains_key("name"));
    }

    #[test]
    fn rejects_short_names_and_bad_types() {
        let err = THING
            .deserialize(&json!({"name": "ab", "count": "many"}), Mode::Full, &Identity::anonymous())
            .unwrap_err();
        assert!(err.fields["name"].contains("minimum length"));
        assert!(err.fields["count"].contains("not a valid Integer"));
    }

    #[test]
    fn gated_fields_need_permission() {
        let err = THING
            .deserialize(&json!({"name": "abc", "flag": true}), Mode::Full, &Identity::anonymous())
            .unwrap_err();
        assert_eq!(err.fields["flag"], "Permission denied");

        let data = THING
            .deserialize(&json!({"name": "abc", "flag": true}), Mode::Full, &Identity::admin(1))
            .unwrap();
        assert_eq!(data["flag"], json!(true));
    }

    #[test]
    fn normalizes_datetimes() {
        let data = THING
            .deserialize(&json!({"name": "abc", "when": "2014-03-01"}), Mode::Full, &Identity::anonymous())
            .unwrap();
        assert_eq!(data["when"], json!("2014-03-01T00:00:00Z"));
        assert!(parse_datetime("2014-03-01T10:30:00").is_some());
        assert!(parse_datetime("2014-03-01T10:30:00+02:00").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
