//! Route binding.
//!
//! [`BoundResource::bind`] walks the route table once at startup: every
//! (route type, method) pair the resource has a handler for becomes a view with
//! the model permission of the method, and actions are attached to the routes
//! whose type they match. Requests are then dispatched by resolving the path
//! against the same table.

use axum::{
    extract::{Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::database::Session;
use crate::error::ApiError;
use crate::middleware::ApiResult;
use crate::resource::action::ActionDescriptor;
use crate::resource::base::{ConfigurationError, ResourceDef, ResourceRequest};
use crate::resource::model::ModelResource;
use crate::resource::registry::ResourceRegistry;
use crate::resource::route::{ResolvedRoute, RequestMethod, RouteType};
use crate::resource::Handler;
use crate::security::Identity;
use crate::AppState;

/// Verb view attached to a route
#[derive(Clone)]
pub struct BoundView {
    pub handler: Handler,
    pub permission: String,
}

/// A resource definition with its views resolved
pub struct BoundResource {
    def: Arc<ResourceDef>,
    prefix: String,
    views: HashMap<(RouteType, RequestMethod), BoundView>,
}

impl BoundResource {
    pub fn bind(def: Arc<ResourceDef>) -> Result<Self, ConfigurationError> {
        let prefix = def.get_route_prefix()?;
        let mut views = HashMap::new();

        for route_type in [RouteType::Collection, RouteType::Member, RouteType::Related] {
            let info = route_type.info();

            for method in info.methods {
                // Resources may leave out any verb
                let Some(handler) = def.handler(*method, route_type) else {
                    continue;
                };
                let permission = def.model.get_permission(method.permission_suffix());
                debug!("{} {} {} -> {}", info.route_name, method, prefix, permission);
                views.insert((route_type, *method), BoundView { handler, permission });
            }

            if info.action_pattern.is_some() {
                for action in def.get_actions_by_type(route_type) {
                    debug!(
                        "{} {} @{} -> {}",
                        info.route_name,
                        prefix,
                        action.name,
                        action.get_permission(def.model)
                    );
                }
            }
        }

        info!(
            "Bound resource '{}' with {} views and {} actions",
            prefix,
            views.len(),
            def.actions.len()
        );
        Ok(Self { def, prefix, views })
    }

    pub fn def(&self) -> &Arc<ResourceDef> {
        &self.def
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn view(&self, route_type: RouteType, method: RequestMethod) -> Option<&BoundView> {
        self.views.get(&(route_type, method))
    }

    /// Action callable on a route type under `name`
    pub fn action(&self, route_type: RouteType, name: &str) -> Option<&ActionDescriptor> {
        self.def.get_actions_by_type(route_type).find(|a| a.name == name)
    }

    /// Routes for the collection, member and related patterns, with and
    /// without trailing slash
    pub fn routes(self: &Arc<Self>, registry: &Arc<ResourceRegistry>) -> Router<AppState> {
        let p = &self.prefix;
        let paths = [
            format!("/{}", p),
            format!("/{}/", p),
            format!("/{}/:pk", p),
            format!("/{}/:pk/", p),
            format!("/{}/:pk/:related_name", p),
            format!("/{}/:pk/:related_name/", p),
        ];

        let mut router = Router::new();
        for path in paths {
            let bound = Arc::clone(self);
            let registry = Arc::clone(registry);
            router = router.route(
                &path,
                any(
                    move |State(state): State<AppState>, identity: Option<Extension<Identity>>, request: Request| {
                        let bound = Arc::clone(&bound);
                        let registry = Arc::clone(&registry);
                        async move {
                            let identity = identity.map(|Extension(i)| i).unwrap_or_default();
                            bound.dispatch(state, registry, identity, request).await
                        }
                    },
                ),
            );
        }
        router
    }

    pub async fn dispatch(
        &self,
        state: AppState,
        registry: Arc<ResourceRegistry>,
        identity: Identity,
        request: Request,
    ) -> Response {
        match self.handle(state, registry, identity, request).await {
            Ok(response) => response.into_response(),
            Err(err) => err.into_response(),
        }
    }

    /// Select the view, check its permission and run it inside one transaction
    async fn handle(
        &self,
        state: AppState,
        registry: Arc<ResourceRegistry>,
        identity: Identity,
        request: Request,
    ) -> ApiResult {
        let (parts, body) = request.into_parts();
        let method = RequestMethod::from_method(&parts.method)
            .ok_or_else(|| ApiError::method_not_allowed(format!("Method {} is not allowed", parts.method)))?;
        let route = self.resolve(&parts)?;

        let (handler, permission) = match route.action.as_deref() {
            Some(name) => {
                let action = self.find_action(route.route_type, name)?;
                if !action.allows(method) {
                    return Err(ApiError::method_not_allowed(format!(
                        "Action '{}' does not accept {}",
                        action.name, method
                    )));
                }
                (action.handler, action.get_permission(self.def.model))
            }
            None => {
                let view = self.view(route.route_type, method).ok_or_else(|| {
                    ApiError::method_not_allowed(format!(
                        "Method {} is not allowed on {} {}",
                        method,
                        self.prefix,
                        route.route_type.as_str()
                    ))
                })?;
                (view.handler, view.permission.clone())
            }
        };
        identity.check_permission(&permission)?;

        let body = axum::body::to_bytes(body, state.config.api.max_request_size_bytes)
            .await
            .map_err(|e| ApiError::InvalidJsonData(format!("Request body could not be read: {}", e)))?;

        let request = ResourceRequest::new(method, route.route_type)
            .with_path(route.pk.map(|pk| pk.to_string()), route.related_name, route.action)
            .with_query(parts.uri.query())
            .with_headers(parts.headers)
            .with_body(body);

        let session = Session::begin(state.db.pool()).await?;
        let mut resource = ModelResource::new(
            Arc::clone(&self.def),
            request,
            identity,
            session,
            Arc::clone(&state.config),
            registry,
        );

        let result = handler(&mut resource).await;
        let session = resource.into_session();
        match result {
            Ok(response) => {
                session.commit().await?;
                Ok(response)
            }
            Err(err) => {
                if let Err(e) = session.rollback().await {
                    error!("Rollback failed: {}", e);
                }
                Err(err)
            }
        }
    }

    fn resolve(&self, parts: &Parts) -> Result<ResolvedRoute, ApiError> {
        let path = parts.uri.path();
        ResolvedRoute::resolve(path)
            .filter(|route| route.member == self.prefix)
            .ok_or_else(|| ApiError::not_found(format!("No route matches {}", path)))
    }

    fn find_action(&self, route_type: RouteType, name: &str) -> Result<&ActionDescriptor, ApiError> {
        if let Some(action) = self.action(route_type, name) {
            return Ok(action);
        }

        let hyphenated = name.replace('_', "-");
        if hyphenated != name && self.action(route_type, &hyphenated).is_some() {
            warn!("Action '{}' not found on {}, did you mean '{}'?", name, self.prefix, hyphenated);
        }
        Err(ApiError::not_found(format!("Action '{}' not found", name)))
    }
}
