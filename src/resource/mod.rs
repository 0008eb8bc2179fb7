//! Declarative REST resources.
//!
//! A [`ResourceDef`] binds a model to collection, member and related routes.
//! The directive turns definitions into axum routes, attaching the permission
//! each view requires, and the registry keeps the definitions of every API
//! version.

pub mod action;
pub mod base;
pub mod directive;
pub mod model;
pub mod registry;
pub mod route;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::middleware::ApiResult;

pub use action::{ActionDescriptor, ActionType};
pub use base::{ConfigurationError, ResourceDef, ResourceRequest};
pub use model::ModelResource;
pub use registry::{ApiManager, ApiVersion, RegistryError, ResourceRegistry};
pub use route::{RequestMethod, RouteType};

/// View function bound to a route: a verb handler or an action
pub type Handler = for<'a> fn(&'a mut ModelResource) -> BoxFuture<'a, ApiResult>;

/// How create and update views treat a single submitted object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// Only lists are accepted
    Strict,
    /// A single object is wrapped into a list, and answered with a single object
    Permissive,
}

impl FromStr for CollectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(CollectionMode::Strict),
            "permissive" => Ok(CollectionMode::Permissive),
            other => Err(format!("Unknown collection mode: {}", other)),
        }
    }
}
