use serde_json::{json, Value};

use crate::database::Query;
use crate::filter::types::FilterOp;
use crate::filter::{admin_policy, FilterScope, QueryFilter, QueryFilterError};
use crate::resource::RequestMethod;
use crate::schemas::{format_datetime, parse_datetime, FieldType};

/// A searchable field and the operators it allows
#[derive(Debug, Clone)]
pub struct SearchField {
    pub kind: FieldType,
    pub ops: Vec<FilterOp>,
}

impl SearchField {
    /// Field supporting every operator
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            ops: FilterOp::ALL.to_vec(),
        }
    }

    pub fn with_ops(kind: FieldType, ops: &[FilterOp]) -> Self {
        Self { kind, ops: ops.to_vec() }
    }

    pub fn valid_operation(&self, op: FilterOp) -> bool {
        self.ops.contains(&op)
    }

    /// Convert a raw query string value to the field type
    fn deserialize(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self.kind {
            FieldType::String => Some(Value::from(raw)),
            FieldType::Integer => raw.parse::<i64>().ok().map(Value::from),
            FieldType::Boolean => match raw.to_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldType::DateTime => parse_datetime(raw).map(|dt| Value::from(format_datetime(&dt))),
        }
    }
}

/// Filter collection results by `field__op=value` query parameters.
///
/// Only GET collection requests are filtered, and only fields of the resource
/// model can be searched. Unknown fields and operators are rejected.
#[derive(Debug, Clone)]
pub struct BySearchFields {
    fields: Vec<(&'static str, SearchField)>,
}

impl BySearchFields {
    pub fn new() -> Self {
        Self { fields: vec![] }
    }

    pub fn field(mut self, name: &'static str, field: SearchField) -> Self {
        self.fields.push((name, field));
        self
    }

    fn get_field(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, f)| f)
    }

    fn get_field_value(&self, field: &SearchField, op: FilterOp, raw: &str) -> Option<Value> {
        if op.is_unary() {
            return Some(Value::Null);
        }
        if op.is_list() {
            let values: Option<Vec<Value>> = raw
                .split(',')
                .filter(|v| !v.trim().is_empty())
                .map(|v| field.deserialize(v))
                .collect();
            return values.map(Value::Array);
        }
        field.deserialize(raw)
    }
}

impl Default for BySearchFields {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryFilter for BySearchFields {
    fn name(&self) -> &'static str {
        "search_fields"
    }

    fn applies_to_admin(&self) -> bool {
        true
    }

    fn applies_to(&self, scope: &FilterScope<'_>) -> bool {
        let request = scope.request();
        if request.method != RequestMethod::Get || !request.is_collection_request() {
            return false;
        }
        admin_policy(self, scope)
    }

    fn filter_query(&self, mut query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError> {
        for (name, raw_value) in scope.request().query_pairs() {
            // Skip non filter arguments; `field__op__more` is malformed
            let Some((field_name, op_name)) = name.split_once("__") else {
                continue;
            };
            if op_name.contains("__") {
                return Err(QueryFilterError::new(name.as_str()));
            }

            let field = self.get_field(field_name);
            let op = op_name.parse::<FilterOp>().ok();
            let (field, op) = match (field, op) {
                (Some(field), Some(op)) if field.valid_operation(op) => (field, op),
                // Use filter name as error code
                _ => return Err(QueryFilterError::new(name.as_str())),
            };

            let value = self
                .get_field_value(field, op, raw_value)
                .ok_or_else(|| QueryFilterError::with_message(name.as_str(), format!("Invalid value for '{}'", name)))?;

            query = query
                .filter(field_name, op, value)
                .map_err(|_| QueryFilterError::new(name.as_str()))?;
        }

        Ok(query)
    }

    fn describe(&self) -> Option<Value> {
        let fields: serde_json::Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, field)| {
                (
                    name.to_string(),
                    json!({
                        "type": field.kind.name(),
                        "operations": field.ops.iter().map(FilterOp::as_str).collect::<Vec<_>>(),
                    }),
                )
            })
            .collect();

        Some(json!({
            "name": self.name(),
            "doc": "Filter results by search field(s) using `field__op=value` parameters",
            "fields": fields,
            "methods": ["GET"],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::USER;
    use crate::resource::model::tests::resource_for;
    use crate::resource::RouteType;
    use crate::security::Identity;

    fn search() -> BySearchFields {
        BySearchFields::new()
            .field("email", SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]))
            .field("id", SearchField::new(FieldType::Integer))
    }

    #[tokio::test]
    async fn rejects_unknown_fields_with_parameter_code() {
        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Collection, "unknownfield__eq=x", Identity::user(1)).await;
        let err = search().filter_query(USER.query(), &resource.filter_scope()).unwrap_err();
        assert_eq!(err.parameter, "unknownfield__eq");
    }

    #[tokio::test]
    async fn rejects_disallowed_operators() {
        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Collection, "email__gt=a", Identity::user(1)).await;
        let err = search().filter_query(USER.query(), &resource.filter_scope()).unwrap_err();
        assert_eq!(err.parameter, "email__gt");
    }

    #[tokio::test]
    async fn builds_conditions_for_valid_params() {
        let resource = resource_for(
            &USER,
            RequestMethod::Get,
            RouteType::Collection,
            "email__contains=test&id__in=1,2&fields=email",
            Identity::user(1),
        )
        .await;
        let query = search().filter_query(USER.query(), &resource.filter_scope()).unwrap();
        let sql = query.to_select_sql();
        assert!(sql.query.contains("\"email\" LIKE ? AND \"id\" IN (?, ?)"));
        assert_eq!(sql.params, vec![json!("%test%"), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn only_applies_to_collection_reads() {
        let resource = resource_for(&USER, RequestMethod::Put, RouteType::Collection, "email__eq=x", Identity::admin(1)).await;
        assert!(!search().applies_to(&resource.filter_scope()));

        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Collection, "", Identity::admin(1)).await;
        assert!(search().applies_to(&resource.filter_scope()));
    }

    #[tokio::test]
    async fn rejects_nested_operators() {
        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Collection, "email__contains__x=a", Identity::user(1)).await;
        let err = search().filter_query(USER.query(), &resource.filter_scope()).unwrap_err();
        assert_eq!(err.parameter, "email__contains__x");
    }

    #[tokio::test]
    async fn rejects_values_of_the_wrong_type() {
        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Collection, "id__eq=abc", Identity::user(1)).await;
        let err = search().filter_query(USER.query(), &resource.filter_scope()).unwrap_err();
        assert_eq!(err.parameter, "id__eq");
    }
}
