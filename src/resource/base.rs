use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::database::{ModelDef, Object};
use crate::error::ApiError;
use crate::filter::QueryFilter;
use crate::resource::action::{ActionDescriptor, ActionType};
use crate::resource::model::{default_handlers, describe};
use crate::resource::route::{route_path, RequestMethod, RouteType};
use crate::resource::{CollectionMode, Handler};
use crate::schemas::{parse_datetime, Schema};
use crate::security::{Identity, API_DESCRIBE};

/// Header used to choose the collection mode of a request
pub const COLLECTION_MODE_HEADER: &str = "x-rest-collection-mode";

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Resource name can't be empty")]
    EmptyName,

    #[error("Invalid resource action type {0}")]
    InvalidActionType(String),

    #[error("Action {action} is declared twice on resource {resource}")]
    DuplicateAction { resource: String, action: String },
}

/// Request body is not valid JSON
#[derive(Debug, Error)]
#[error("Request body is not valid JSON: {0}")]
pub struct InvalidRequestDataError(pub String);

/// A date query parameter could not be parsed
#[derive(Debug, Error)]
#[error("Invalid date value for '{parameter}': {value}")]
pub struct DateParseError {
    pub parameter: String,
    pub value: String,
}

/// Optional step run on each validated item before it is inserted
pub type CreateHook = fn(&mut Object, &Identity) -> Result<(), ApiError>;

/// Optional step run on the validated changes of an object before they are
/// written; receives the stored row as second argument
pub type UpdateHook = fn(&mut Object, &Object, &Identity) -> Result<(), ApiError>;

/// Declarative description of a REST resource.
///
/// Built once during bootstrap with [`ResourceDef::builder`] and shared
/// read-only between requests afterwards.
pub struct ResourceDef {
    pub name: String,
    pub doc: &'static str,
    pub model: &'static ModelDef,
    pub schema: &'static Schema,
    pub list_schema: &'static Schema,
    pub query_filters: Vec<Arc<dyn QueryFilter>>,
    pub actions: Vec<ActionDescriptor>,
    pub handlers: HashMap<(RequestMethod, RouteType), Handler>,
    pub create_hook: Option<CreateHook>,
    pub update_hook: Option<UpdateHook>,
}

impl ResourceDef {
    pub fn builder(name: impl Into<String>, model: &'static ModelDef, schema: &'static Schema) -> ResourceDefBuilder {
        ResourceDefBuilder::new(name.into(), model, schema)
    }

    /// Get prefix used for this resource URL paths
    pub fn get_route_prefix(&self) -> Result<String, ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        Ok(self.name.to_lowercase())
    }

    pub fn get_collection_path(&self) -> Result<String, ConfigurationError> {
        let info = RouteType::Collection.info();
        Ok(route_path(info.pattern, &self.get_route_prefix()?, None, None))
    }

    pub fn get_member_path(&self, pk: i64) -> Result<String, ConfigurationError> {
        let info = RouteType::Member.info();
        Ok(route_path(info.pattern, &self.get_route_prefix()?, Some(pk), None))
    }

    pub fn get_related_path(&self, pk: i64, related_name: &str) -> Result<String, ConfigurationError> {
        let info = RouteType::Related.info();
        Ok(route_path(info.pattern, &self.get_route_prefix()?, Some(pk), Some(related_name)))
    }

    /// Actions callable on a route type
    pub fn get_actions_by_type(&self, route_type: RouteType) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter().filter(move |a| a.matches_route(route_type))
    }

    pub fn handler(&self, method: RequestMethod, route_type: RouteType) -> Option<Handler> {
        self.handlers.get(&(method, route_type)).copied()
    }

    /// Description served by the `@describe` action
    pub fn describe(&self) -> Value {
        let mut views: Vec<(RouteType, RequestMethod)> = self.handlers.keys().map(|(m, r)| (*r, *m)).collect();
        views.sort();
        let views: Vec<Value> = views
            .into_iter()
            .map(|(route_type, method)| {
                json!({
                    "route": route_type.as_str(),
                    "method": method,
                    "permission": self.model.get_permission(method.permission_suffix()),
                })
            })
            .collect();

        json!({
            "name": self.name,
            "doc": self.doc,
            "model": self.model.name,
            "path": self.get_collection_path().ok(),
            "views": views,
            "actions": self.actions.iter().map(|a| a.describe(self.model)).collect::<Vec<_>>(),
            "schema": self.schema.describe(),
            "related": self.model.relationships.iter().map(|r| r.name).collect::<Vec<_>>(),
            "filters": self.query_filters.iter().filter_map(|f| f.describe()).collect::<Vec<_>>(),
        })
    }
}

impl std::fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("model", &self.model.name)
            .field("filters", &self.query_filters.iter().map(|q| q.name()).collect::<Vec<_>>())
            .field("actions", &self.actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

pub struct ResourceDefBuilder {
    def: ResourceDef,
}

impl ResourceDefBuilder {
    fn new(name: String, model: &'static ModelDef, schema: &'static Schema) -> Self {
        Self {
            def: ResourceDef {
                name,
                doc: "",
                model,
                schema,
                list_schema: schema,
                query_filters: vec![],
                actions: vec![ActionDescriptor::collection("describe", describe)
                    .methods(&[RequestMethod::Get])
                    .permission(API_DESCRIBE)
                    .doc("Describe the resource views, actions and filters")],
                handlers: default_handlers(),
                create_hook: None,
                update_hook: None,
            },
        }
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.def.doc = doc;
        self
    }

    /// Schema used for items submitted to collection views
    pub fn list_schema(mut self, schema: &'static Schema) -> Self {
        self.def.list_schema = schema;
        self
    }

    /// Append a query filter; filters run in the order they are added
    pub fn filter(mut self, filter: impl QueryFilter + 'static) -> Self {
        self.def.query_filters.push(Arc::new(filter));
        self
    }

    pub fn handler(mut self, method: RequestMethod, route_type: RouteType, handler: Handler) -> Self {
        self.def.handlers.insert((method, route_type), handler);
        self
    }

    /// Remove a verb view
    pub fn without(mut self, method: RequestMethod, route_type: RouteType) -> Self {
        self.def.handlers.remove(&(method, route_type));
        self
    }

    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.def.actions.push(action);
        self
    }

    pub fn create_hook(mut self, hook: CreateHook) -> Self {
        self.def.create_hook = Some(hook);
        self
    }

    pub fn update_hook(mut self, hook: UpdateHook) -> Self {
        self.def.update_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<ResourceDef, ConfigurationError> {
        let def = self.def;
        let prefix = def.get_route_prefix()?;

        for (i, action) in def.actions.iter().enumerate() {
            let duplicate = def.actions[..i]
                .iter()
                .any(|other| other.name == action.name && overlaps(other.action_type, action.action_type));
            if duplicate {
                return Err(ConfigurationError::DuplicateAction {
                    resource: prefix,
                    action: action.name.clone(),
                });
            }
        }

        Ok(def)
    }
}

fn overlaps(a: ActionType, b: ActionType) -> bool {
    a == b || a == ActionType::Any || b == ActionType::Any
}

/// Per-request view of the HTTP request, with lazily parsed values
#[derive(Debug)]
pub struct ResourceRequest {
    pub method: RequestMethod,
    pub route_type: RouteType,
    pub action: Option<String>,
    raw_pk: Option<String>,
    raw_related_name: Option<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    pk_value: OnceCell<Option<i64>>,
    request_data: OnceCell<Value>,
}

impl ResourceRequest {
    pub fn new(method: RequestMethod, route_type: RouteType) -> Self {
        Self {
            method,
            route_type,
            action: None,
            raw_pk: None,
            raw_related_name: None,
            query: vec![],
            headers: HeaderMap::new(),
            body: Bytes::new(),
            pk_value: OnceCell::new(),
            request_data: OnceCell::new(),
        }
    }

    pub fn with_path(mut self, pk: Option<String>, related_name: Option<String>, action: Option<String>) -> Self {
        self.raw_pk = pk;
        self.raw_related_name = related_name;
        self.action = action;
        self
    }

    /// Parse a raw query string; repeated keys are kept in order
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Primary key from the path; `None` when absent or not an integer
    pub fn pk_value(&self) -> Option<i64> {
        *self
            .pk_value
            .get_or_init(|| self.raw_pk.as_deref().and_then(|pk| pk.parse::<i64>().ok()))
    }

    pub fn related_name(&self) -> Option<&str> {
        self.raw_related_name.as_deref()
    }

    /// JSON request body, parsed once
    pub fn request_data(&self) -> Result<&Value, InvalidRequestDataError> {
        self.request_data.get_or_try_init(|| {
            if self.body.iter().all(|b| b.is_ascii_whitespace()) {
                return Err(InvalidRequestDataError("empty body".to_string()));
            }
            serde_json::from_slice(&self.body).map_err(|e| {
                tracing::debug!("Invalid JSON in request body: {}", e);
                InvalidRequestDataError(e.to_string())
            })
        })
    }

    pub fn is_member_request(&self) -> bool {
        self.pk_value().is_some()
    }

    pub fn is_collection_request(&self) -> bool {
        !self.is_member_request()
    }

    pub fn is_related_request(&self) -> bool {
        self.is_member_request() && self.related_name().is_some()
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Every value of a repeatable query parameter
    pub fn query_params(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the `from` and `to` query parameters
    pub fn get_filter_from_to(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), DateParseError> {
        let parse = |name: &str| -> Result<Option<DateTime<Utc>>, DateParseError> {
            match self.query_param(name).filter(|v| !v.is_empty()) {
                None => Ok(None),
                Some(value) => parse_datetime(value).map(Some).ok_or_else(|| DateParseError {
                    parameter: name.to_string(),
                    value: value.to_string(),
                }),
            }
        };
        Ok((parse("from")?, parse("to")?))
    }

    /// Collection mode from the request header, falling back to `default`
    /// and then to strict mode
    pub fn collection_mode(&self, default: Option<CollectionMode>) -> CollectionMode {
        let fallback = default.unwrap_or(CollectionMode::Strict);
        match self.header(COLLECTION_MODE_HEADER) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid collection mode '{}'", value);
                fallback
            }),
            None => fallback,
        }
    }

    /// Field names requested with `fields`
    pub fn field_projection(&self) -> Option<Vec<String>> {
        let fields: Vec<String> = self
            .query_params("fields")
            .iter()
            .flat_map(|v| v.split(','))
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        if fields.is_empty() {
            None
        } else {
            Some(fields)
        }
    }

    /// Raw `include`/`inc` values, e.g. `tags` or `tags__pk`
    pub fn includes(&self) -> Vec<&str> {
        let mut values = self.query_params("include");
        values.extend(self.query_params("inc"));
        values
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PROJECT;
    use crate::schemas::definitions::PROJECT_SCHEMA;
    use axum::http::HeaderValue;

    fn request() -> ResourceRequest {
        ResourceRequest::new(RequestMethod::Get, RouteType::Collection)
    }

    #[test]
    fn route_prefix_requires_name() {
        let def = ResourceDef::builder("Projects", &PROJECT, &PROJECT_SCHEMA).build().unwrap();
        assert_eq!(def.get_route_prefix().unwrap(), "projects");
        assert_eq!(def.get_member_path(4).unwrap(), "/projects/4/");
        assert_eq!(def.get_related_path(4, "tasks").unwrap(), "/projects/4/tasks/");

        let err = ResourceDef::builder("", &PROJECT, &PROJECT_SCHEMA).build().unwrap_err();
        assert!(matches!(err, ConfigurationError::EmptyName));
    }

    #[test]
    fn builder_starts_with_verbs_and_describe() {
        let def = ResourceDef::builder("projects", &PROJECT, &PROJECT_SCHEMA)
            .without(RequestMethod::Delete, RouteType::Collection)
            .build()
            .unwrap();
        assert!(def.handler(RequestMethod::Get, RouteType::Collection).is_some());
        assert!(def.handler(RequestMethod::Delete, RouteType::Collection).is_none());
        assert_eq!(def.get_actions_by_type(RouteType::Collection).count(), 1);
        assert_eq!(def.get_actions_by_type(RouteType::Member).count(), 0);

        let description = def.describe();
        assert_eq!(description["path"], "/projects/");
        assert_eq!(description["views"].as_array().unwrap().len(), 9);
        assert_eq!(description["actions"][0]["permission"], API_DESCRIBE);
    }

    #[test]
    fn rejects_duplicate_actions() {
        let err = ResourceDef::builder("projects", &PROJECT, &PROJECT_SCHEMA)
            .action(ActionDescriptor::any("describe", describe))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAction { .. }));
    }

    #[test]
    fn pk_value_never_fails() {
        let req = request().with_path(Some("abc".into()), None, None);
        assert_eq!(req.pk_value(), None);
        assert!(req.is_collection_request());

        let req = request().with_path(Some("42".into()), Some("tasks".into()), None);
        assert_eq!(req.pk_value(), Some(42));
        assert!(req.is_related_request());
    }

    #[test]
    fn request_data_rejects_invalid_json() {
        let req = request().with_body(Bytes::from_static(b"{not json"));
        assert!(req.request_data().is_err());
        let req = request();
        assert!(req.request_data().is_err());
        let req = request().with_body(Bytes::from_static(b"[1, 2]"));
        assert_eq!(req.request_data().unwrap(), &serde_json::json!([1, 2]));
    }

    #[test]
    fn parses_repeatable_params() {
        let req = request().with_query(Some("id=1&id=2&fields=name,client_id&inc=tags__pk&include=client"));
        assert_eq!(req.query_params("id"), vec!["1", "2"]);
        assert_eq!(req.field_projection(), Some(vec!["name".to_string(), "client_id".to_string()]));
        assert_eq!(req.includes(), vec!["client", "tags__pk"]);
    }

    #[test]
    fn parses_from_to_dates() {
        let req = request().with_query(Some("from=2014-01-01&to=2014-01-31T18:00:00"));
        let (from, to) = req.get_filter_from_to().unwrap();
        assert!(from.unwrap() < to.unwrap());

        let req = request().with_query(Some("from=someday"));
        let err = req.get_filter_from_to().unwrap_err();
        assert_eq!(err.parameter, "from");
    }

    #[test]
    fn collection_mode_falls_back() {
        assert_eq!(request().collection_mode(None), CollectionMode::Strict);
        assert_eq!(request().collection_mode(Some(CollectionMode::Permissive)), CollectionMode::Permissive);

        let mut headers = HeaderMap::new();
        headers.insert(COLLECTION_MODE_HEADER, HeaderValue::from_static("permissive"));
        assert_eq!(request().with_headers(headers).collection_mode(None), CollectionMode::Permissive);

        let mut headers = HeaderMap::new();
        headers.insert(COLLECTION_MODE_HEADER, HeaderValue::from_static("lenient"));
        assert_eq!(request().with_headers(headers).collection_mode(None), CollectionMode::Strict);
    }
}
