use serde_json::{json, Value};

use crate::database::Query;
use crate::filter::types::FilterOp;
use crate::filter::{admin_policy, FilterScope, QueryFilter, QueryFilterError};
use crate::resource::RequestMethod;
use crate::schemas::format_datetime;

/// Restrict collection reads to a `from`/`to` window on a datetime column
#[derive(Debug, Clone)]
pub struct ByDateRange {
    column: &'static str,
}

impl ByDateRange {
    pub fn new(column: &'static str) -> Self {
        Self { column }
    }
}

impl QueryFilter for ByDateRange {
    fn name(&self) -> &'static str {
        "date_range"
    }

    fn applies_to_admin(&self) -> bool {
        true
    }

    fn applies_to(&self, scope: &FilterScope<'_>) -> bool {
        let request = scope.request();
        request.method == RequestMethod::Get && request.is_collection_request() && admin_policy(self, scope)
    }

    fn filter_query(&self, mut query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError> {
        let (from, to) = scope
            .request()
            .get_filter_from_to()
            .map_err(|e| QueryFilterError::with_message(e.parameter.clone(), e.to_string()))?;

        if let Some(from) = from {
            query = query
                .filter(self.column, FilterOp::Gte, Value::from(format_datetime(&from)))
                .map_err(|_| QueryFilterError::new("from"))?;
        }
        if let Some(to) = to {
            query = query
                .filter(self.column, FilterOp::Lte, Value::from(format_datetime(&to)))
                .map_err(|_| QueryFilterError::new("to"))?;
        }
        Ok(query)
    }

    fn describe(&self) -> Option<Value> {
        Some(json!({
            "name": self.name(),
            "doc": format!("Filter results by `{}` using `from` and `to` dates", self.column),
            "parameters": ["from", "to"],
            "methods": ["GET"],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ACTIVITY;
    use crate::resource::model::tests::resource_for;
    use crate::resource::RouteType;
    use crate::security::Identity;

    #[tokio::test]
    async fn filters_start_column() {
        let resource = resource_for(
            &ACTIVITY,
            RequestMethod::Get,
            RouteType::Collection,
            "from=2014-01-01&to=2014-01-31T23:59:59",
            Identity::user(1),
        )
        .await;
        let sql = ByDateRange::new("start").filter_query(ACTIVITY.query(), &resource.filter_scope()).unwrap().to_select_sql();
        assert!(sql.query.contains("\"start\" >= ? AND \"start\" <= ?"));
        assert_eq!(sql.params, vec![json!("2014-01-01T00:00:00Z"), json!("2014-01-31T23:59:59Z")]);
    }

    #[tokio::test]
    async fn reports_the_bad_parameter() {
        let resource = resource_for(&ACTIVITY, RequestMethod::Get, RouteType::Collection, "to=tomorrow", Identity::user(1)).await;
        let err = ByDateRange::new("start").filter_query(ACTIVITY.query(), &resource.filter_scope()).unwrap_err();
        assert_eq!(err.parameter, "to");
    }

    #[tokio::test]
    async fn no_dates_leaves_query_untouched() {
        let resource = resource_for(&ACTIVITY, RequestMethod::Get, RouteType::Collection, "", Identity::user(1)).await;
        let sql = ByDateRange::new("start").filter_query(ACTIVITY.query(), &resource.filter_scope()).unwrap().to_select_sql();
        assert!(sql.query.contains("WHERE 1=1"));
    }
}
