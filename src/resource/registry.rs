//! Registered resources per API version.
//!
//! Registries are filled during bootstrap and only read afterwards; the
//! finished [`ApiManager`] is shared through the application state.

use axum::{response::IntoResponse, routing::get, Extension, Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::database::ModelDef;
use crate::resource::base::{ConfigurationError, ResourceDef};
use crate::resource::directive::BoundResource;
use crate::resource::route::ResolvedRoute;
use crate::security::{Identity, API_DESCRIBE};
use crate::AppState;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Resource '{0}' is already registered")]
    Duplicate(String),

    #[error("API version '{0}' is already registered")]
    DuplicateVersion(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Resources of one API version, by route prefix
#[derive(Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Arc<BoundResource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind and register a resource; a name can only be registered once
    pub fn register(&mut self, def: ResourceDef) -> Result<(), RegistryError> {
        let name = def.get_route_prefix()?;
        if self.resources.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        let bound = BoundResource::bind(Arc::new(def))?;
        self.resources.insert(name, Arc::new(bound));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BoundResource>> {
        self.resources.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDef> {
        self.get(name).map(|bound| bound.def().as_ref())
    }

    pub fn model(&self, name: &str) -> Option<&'static ModelDef> {
        self.resource(name).map(|def| def.model)
    }

    /// Resource serving `model`, matched by table
    pub fn for_model(&self, model: &ModelDef) -> Option<&Arc<BoundResource>> {
        self.resources.values().find(|bound| bound.def().model.table == model.table)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn describe(&self) -> Value {
        let resources: Vec<Value> = self.resources.values().map(|bound| bound.def().describe()).collect();
        json!({ "resources": resources })
    }
}

/// A versioned API, e.g. `v1` mounted at `/api/v1`
pub struct ApiVersion {
    pub name: String,
    pub registry: Arc<ResourceRegistry>,
}

impl ApiVersion {
    pub fn new(name: impl Into<String>, registry: ResourceRegistry) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(registry),
        }
    }

    /// Mount path under the API prefix
    pub fn prefix(&self, api_prefix: &str) -> String {
        format!("{}/{}", api_prefix.trim_end_matches('/'), self.name)
    }

    /// Match a path relative to the version root to a registered resource
    pub fn resolve(&self, path: &str) -> Option<(&Arc<BoundResource>, ResolvedRoute)> {
        let route = ResolvedRoute::resolve(path)?;
        let bound = self.registry.get(&route.member)?;
        Some((bound, route))
    }

    pub fn router(&self) -> Router<AppState> {
        let mut description = self.registry.describe();
        description["version"] = json!(self.name);
        let description = Arc::new(description);

        let mut router = Router::new().route(
            "/@describe",
            get(move |identity: Option<Extension<Identity>>| {
                let description = Arc::clone(&description);
                async move {
                    let identity = identity.map(|Extension(i)| i).unwrap_or_default();
                    match identity.check_permission(API_DESCRIBE) {
                        Ok(()) => Json(description.as_ref().clone()).into_response(),
                        Err(err) => err.into_response(),
                    }
                }
            }),
        );

        for bound in self.registry.resources.values() {
            router = router.merge(bound.routes(&self.registry));
        }
        router
    }
}

/// Every API version of the application
#[derive(Default)]
pub struct ApiManager {
    versions: Vec<ApiVersion>,
}

impl ApiManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_version(&mut self, version: ApiVersion) -> Result<(), RegistryError> {
        if self.version(&version.name).is_some() {
            return Err(RegistryError::DuplicateVersion(version.name));
        }
        info!(
            "Registered API {} with resources: {}",
            version.name,
            version.registry.names().collect::<Vec<_>>().join(", ")
        );
        self.versions.push(version);
        Ok(())
    }

    pub fn version(&self, name: &str) -> Option<&ApiVersion> {
        self.versions.iter().find(|v| v.name == name)
    }

    pub fn versions(&self) -> &[ApiVersion] {
        &self.versions
    }

    /// Router nesting every version under `api_prefix`
    pub fn router(&self, api_prefix: &str) -> Router<AppState> {
        self.versions.iter().fold(Router::new(), |router, version| {
            router.nest(&version.prefix(api_prefix), version.router())
        })
    }
}
