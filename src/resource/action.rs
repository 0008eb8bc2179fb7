use serde_json::{json, Value};
use std::str::FromStr;

use crate::database::ModelDef;
use crate::resource::base::ConfigurationError;
use crate::resource::route::{RequestMethod, RouteType};
use crate::resource::Handler;

/// Route types an action can be called on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Member,
    Collection,
    /// Both member and collection routes
    Any,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Member => "member",
            ActionType::Collection => "collection",
            ActionType::Any => "*",
        }
    }
}

impl FromStr for ActionType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(ActionType::Member),
            "collection" => Ok(ActionType::Collection),
            "*" => Ok(ActionType::Any),
            other => Err(ConfigurationError::InvalidActionType(other.to_string())),
        }
    }
}

/// Registration entry for a non-CRUD operation of a resource
#[derive(Clone)]
pub struct ActionDescriptor {
    /// Name used in URLs after `@`
    pub name: String,
    pub action_type: ActionType,
    pub request_methods: Vec<RequestMethod>,
    /// Explicit permission; the model `action` permission is used otherwise
    pub permission: Option<String>,
    pub attr_name: &'static str,
    pub handler: Handler,
    pub doc: &'static str,
}

impl ActionDescriptor {
    /// The URL name defaults to `attr_name` with underscores replaced by hyphens
    pub fn new(attr_name: &'static str, action_type: ActionType, handler: Handler) -> Self {
        Self {
            name: attr_name.replace('_', "-"),
            action_type,
            request_methods: RequestMethod::ALL.to_vec(),
            permission: None,
            attr_name,
            handler,
            doc: "",
        }
    }

    pub fn member(attr_name: &'static str, handler: Handler) -> Self {
        Self::new(attr_name, ActionType::Member, handler)
    }

    pub fn collection(attr_name: &'static str, handler: Handler) -> Self {
        Self::new(attr_name, ActionType::Collection, handler)
    }

    pub fn any(attr_name: &'static str, handler: Handler) -> Self {
        Self::new(attr_name, ActionType::Any, handler)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn methods(mut self, methods: &[RequestMethod]) -> Self {
        self.request_methods = methods.to_vec();
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn matches_route(&self, route_type: RouteType) -> bool {
        match self.action_type {
            ActionType::Any => matches!(route_type, RouteType::Collection | RouteType::Member),
            ActionType::Member => route_type == RouteType::Member,
            ActionType::Collection => route_type == RouteType::Collection,
        }
    }

    pub fn allows(&self, method: RequestMethod) -> bool {
        self.request_methods.contains(&method)
    }

    /// Permission required to call this action
    pub fn get_permission(&self, model: &ModelDef) -> String {
        self.permission
            .clone()
            .unwrap_or_else(|| model.get_permission("action"))
    }

    pub fn describe(&self, model: &ModelDef) -> Value {
        json!({
            "name": self.name,
            "type": self.action_type.as_str(),
            "methods": self.request_methods,
            "permission": self.get_permission(model),
            "doc": self.doc,
        })
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("type", &self.action_type)
            .field("methods", &self.request_methods)
            .field("permission", &self.permission)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::ApiResponse;
    use crate::models::PROJECT;
    use crate::resource::ModelResource;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    fn noop(_: &mut ModelResource) -> BoxFuture<'_, crate::middleware::ApiResult> {
        async { Ok(ApiResponse::success(Value::Null)) }.boxed()
    }

    #[test]
    fn name_defaults_to_hyphenated_attr_name() {
        let action = ActionDescriptor::member("add_tags", noop);
        assert_eq!(action.name, "add-tags");
        assert_eq!(action.request_methods.len(), 4);
        assert!(action.matches_route(RouteType::Member));
        assert!(!action.matches_route(RouteType::Collection));
    }

    #[test]
    fn permission_defaults_to_model_action() {
        let action = ActionDescriptor::collection("search", noop).methods(&[RequestMethod::Get]);
        assert_eq!(action.get_permission(&PROJECT), "time_project_action");
        assert!(action.allows(RequestMethod::Get));
        assert!(!action.allows(RequestMethod::Post));

        let action = action.permission("public");
        assert_eq!(action.get_permission(&PROJECT), "public");
    }

    #[test]
    fn any_matches_member_and_collection() {
        let action = ActionDescriptor::any("ping", noop);
        assert!(action.matches_route(RouteType::Member));
        assert!(action.matches_route(RouteType::Collection));
        assert!(!action.matches_route(RouteType::Related));
    }

    #[test]
    fn rejects_unknown_action_types() {
        assert_eq!("*".parse::<ActionType>().unwrap(), ActionType::Any);
        assert!(matches!(
            "related".parse::<ActionType>(),
            Err(ConfigurationError::InvalidActionType(_))
        ));
    }
}
