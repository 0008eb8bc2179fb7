use serde_json::Value;

use crate::database::Query;
use crate::filter::types::FilterOp;
use crate::filter::{admin_policy, FilterScope, QueryFilter, QueryFilterError};
use crate::resource::RequestMethod;

/// Restrict queries to objects owned by the current user.
///
/// The owner column comes from the model definition. Rows without an owner are
/// shared and stay visible unless `filter_nulls` is set. Administrators are not
/// filtered.
#[derive(Debug, Clone, Default)]
pub struct ByCurrentUser {
    filter_nulls: bool,
}

impl ByCurrentUser {
    pub fn new() -> Self {
        Self { filter_nulls: false }
    }

    /// Also hide rows that have no owner
    pub fn filter_nulls(mut self) -> Self {
        self.filter_nulls = true;
        self
    }
}

impl QueryFilter for ByCurrentUser {
    fn name(&self) -> &'static str {
        "current_user"
    }

    fn filter_query(&self, query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError> {
        let Some(column) = query.model().owner_column else {
            return Ok(query);
        };

        // Anonymous users own nothing
        let Some(user_id) = scope.identity().user_id() else {
            return Ok(query.raw("1=0", vec![]));
        };

        let owned = query
            .condition(column, FilterOp::Eq, Value::from(user_id))
            .map_err(|_| QueryFilterError::new(self.name()))?;

        if self.filter_nulls {
            return Ok(query.filter_any(vec![owned]));
        }

        let shared = query
            .condition(column, FilterOp::Null, Value::Null)
            .map_err(|_| QueryFilterError::new(self.name()))?;
        Ok(query.filter_any(vec![owned, shared]))
    }
}

/// Restrict writes on users to the current user's own row.
///
/// Reads stay unfiltered. Administrators may change any user.
#[derive(Debug, Clone, Default)]
pub struct ByCurrentUserId;

impl QueryFilter for ByCurrentUserId {
    fn name(&self) -> &'static str {
        "current_user_id"
    }

    fn applies_to(&self, scope: &FilterScope<'_>) -> bool {
        scope.request().method != RequestMethod::Get && admin_policy(self, scope)
    }

    fn filter_query(&self, query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError> {
        let Some(user_id) = scope.identity().user_id() else {
            return Ok(query.raw("1=0", vec![]));
        };
        Ok(query.ids(&[user_id]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PROJECT, TAG, USER};
    use crate::resource::model::tests::resource_for;
    use crate::resource::RouteType;
    use crate::security::Identity;
    use serde_json::json;

    #[tokio::test]
    async fn keeps_owned_and_shared_rows() {
        let resource = resource_for(&TAG, RequestMethod::Get, RouteType::Collection, "", Identity::user(4)).await;
        let sql = ByCurrentUser::new().filter_query(TAG.query(), &resource.filter_scope()).unwrap().to_select_sql();
        assert!(sql.query.contains("(\"user_id\" = ? OR \"user_id\" IS NULL)"));
        assert_eq!(sql.params, vec![json!(4)]);
    }

    #[tokio::test]
    async fn can_hide_shared_rows() {
        let resource = resource_for(&PROJECT, RequestMethod::Get, RouteType::Collection, "", Identity::user(4)).await;
        let sql = ByCurrentUser::new()
            .filter_nulls()
            .filter_query(PROJECT.query(), &resource.filter_scope())
            .unwrap()
            .to_select_sql();
        assert!(sql.query.contains("(\"user_id\" = ?)"));
        assert!(!sql.query.contains("IS NULL"));
    }

    #[tokio::test]
    async fn skips_admins_and_blocks_anonymous() {
        let resource = resource_for(&TAG, RequestMethod::Get, RouteType::Collection, "", Identity::admin(1)).await;
        assert!(!ByCurrentUser::new().applies_to(&resource.filter_scope()));

        let resource = resource_for(&TAG, RequestMethod::Get, RouteType::Collection, "", Identity::anonymous()).await;
        assert!(ByCurrentUser::new().applies_to(&resource.filter_scope()));
        let sql = ByCurrentUser::new().filter_query(TAG.query(), &resource.filter_scope()).unwrap().to_select_sql();
        assert!(sql.query.contains("WHERE (1=0)"));
    }

    #[tokio::test]
    async fn user_writes_are_limited_to_own_row() {
        let resource = resource_for(&USER, RequestMethod::Put, RouteType::Member, "", Identity::user(4)).await;
        let scope = resource.filter_scope();
        assert!(ByCurrentUserId.applies_to(&scope));
        let sql = ByCurrentUserId.filter_query(USER.query(), &scope).unwrap().to_select_sql();
        assert!(sql.query.contains("\"id\" IN (?)"));
        assert_eq!(sql.params, vec![json!(4)]);
    }

    #[tokio::test]
    async fn user_reads_and_admin_writes_are_not_limited() {
        let resource = resource_for(&USER, RequestMethod::Get, RouteType::Member, "", Identity::user(4)).await;
        assert!(!ByCurrentUserId.applies_to(&resource.filter_scope()));

        let resource = resource_for(&USER, RequestMethod::Delete, RouteType::Member, "", Identity::admin(1)).await;
        assert!(!ByCurrentUserId.applies_to(&resource.filter_scope()));
    }
}
