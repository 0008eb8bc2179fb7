//! Query filters applied to collection queries.
//!
//! Filters are built with the resource definition and shared by every request,
//! so they hold configuration only. They run in declaration order and each one
//! narrows the query returned by the previous one.

pub mod date;
pub mod error;
pub mod model;
pub mod search;
pub mod types;
pub mod user;

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::database::Query;
use crate::resource::ResourceRequest;
use crate::security::Identity;

pub use date::ByDateRange;
pub use error::QueryFilterError;
pub use model::CollectionByPrimaryKey;
pub use search::{BySearchFields, SearchField};
pub use types::{FilterOp, SortDirection, SqlResult};
pub use user::{ByCurrentUser, ByCurrentUserId};

pub trait QueryFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply to administrators too. By default admins see unfiltered results.
    fn applies_to_admin(&self) -> bool {
        false
    }

    fn applies_to(&self, scope: &FilterScope<'_>) -> bool {
        admin_policy(self, scope)
    }

    fn filter_query(&self, query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError>;

    /// Description for API clients, for filters driven by request parameters
    fn describe(&self) -> Option<Value> {
        None
    }
}

/// Default applicability: every non-admin user, and admins when the filter asks for it
pub fn admin_policy<F: QueryFilter + ?Sized>(filter: &F, scope: &FilterScope<'_>) -> bool {
    !scope.identity().is_admin() || filter.applies_to_admin()
}

/// The request a filter runs for: the resource request itself, or the
/// request a related target is reached through
#[derive(Clone, Copy)]
pub struct FilterScope<'a> {
    request: &'a ResourceRequest,
    identity: &'a Identity,
    config: &'a AppConfig,
}

impl<'a> FilterScope<'a> {
    pub fn new(request: &'a ResourceRequest, identity: &'a Identity, config: &'a AppConfig) -> Self {
        Self {
            request,
            identity,
            config,
        }
    }

    pub fn request(&self) -> &'a ResourceRequest {
        self.request
    }

    pub fn identity(&self) -> &'a Identity {
        self.identity
    }

    pub fn config(&self) -> &'a AppConfig {
        self.config
    }
}

/// Run every applicable filter, in declaration order
pub fn apply_filters(
    filters: &[Arc<dyn QueryFilter>],
    mut query: Query,
    scope: &FilterScope<'_>,
) -> Result<Query, QueryFilterError> {
    for filter in filters {
        if filter.applies_to(scope) {
            debug!("Applying query filter {}", filter.name());
            query = filter.filter_query(query, scope)?;
        }
    }
    Ok(query)
}
