use serde_json::{json, Value};

use crate::database::Query;
use crate::filter::{FilterScope, QueryFilter, QueryFilterError};
use crate::resource::RequestMethod;

/// Restrict collection reads to the objects named by repeated `id` parameters
#[derive(Debug, Clone, Default)]
pub struct CollectionByPrimaryKey;

const PARAMETER: &str = "id";

impl QueryFilter for CollectionByPrimaryKey {
    fn name(&self) -> &'static str {
        "primary_key"
    }

    fn applies_to_admin(&self) -> bool {
        true
    }

    fn applies_to(&self, scope: &FilterScope<'_>) -> bool {
        let request = scope.request();
        request.method == RequestMethod::Get && request.is_collection_request()
    }

    fn filter_query(&self, query: Query, scope: &FilterScope<'_>) -> Result<Query, QueryFilterError> {
        let values = scope.request().query_params(PARAMETER);
        if values.is_empty() {
            return Ok(query);
        }

        let max_ids = scope.config().filter.max_ids;
        if values.len() > max_ids {
            return Err(QueryFilterError::with_message(
                PARAMETER,
                format!("A maximum of {} IDs are allowed per request", max_ids),
            ));
        }

        let ids = values
            .iter()
            .map(|v| v.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| QueryFilterError::with_message(PARAMETER, "Invalid ID value"))?;

        Ok(query.ids(&ids))
    }

    fn describe(&self) -> Option<Value> {
        Some(json!({
            "name": self.name(),
            "doc": "Get objects by primary key, e.g. `?id=1&id=2`",
            "parameters": [PARAMETER],
            "methods": ["GET"],
        }))
    }
}
