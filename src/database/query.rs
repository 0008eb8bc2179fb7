use serde_json::Value;

use crate::database::model::{ModelDef, ID};
use crate::database::DatabaseError;
use crate::filter::types::{FilterOp, SortDirection, SqlResult};

/// A single predicate of a [`Query`]
#[derive(Debug, Clone)]
pub enum Condition {
    Compare { column: String, op: FilterOp, value: Value },
    /// Pre-rendered SQL using `?` placeholders
    Raw { sql: String, params: Vec<Value> },
    /// Matches when any nested condition matches
    Any(Vec<Condition>),
}

/// Collection query over one model.
///
/// Queries are immutable values: every builder method consumes the query and
/// returns the narrowed one, so filters can be chained in order.
#[derive(Debug, Clone)]
pub struct Query {
    model: &'static ModelDef,
    conditions: Vec<Condition>,
    order: Vec<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Query {
    pub fn new(model: &'static ModelDef) -> Self {
        Self {
            model,
            conditions: vec![],
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn model(&self) -> &'static ModelDef {
        self.model
    }

    /// Build a comparison on one of the model's columns
    pub fn condition(&self, column: &str, op: FilterOp, value: Value) -> Result<Condition, DatabaseError> {
        if !self.model.has_column(column) {
            return Err(DatabaseError::UnknownColumn(format!("{}.{}", self.model.table, column)));
        }
        Ok(Condition::Compare {
            column: column.to_string(),
            op,
            value,
        })
    }

    pub fn filter(mut self, column: &str, op: FilterOp, value: Value) -> Result<Self, DatabaseError> {
        let condition = self.condition(column, op, value)?;
        self.conditions.push(condition);
        Ok(self)
    }

    pub fn filter_any(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions.push(Condition::Any(conditions));
        self
    }

    pub fn raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.conditions.push(Condition::Raw { sql: sql.into(), params });
        self
    }

    /// Restrict to a list of primary keys
    pub fn ids(mut self, ids: &[i64]) -> Self {
        let values = ids.iter().map(|id| Value::from(*id)).collect();
        self.conditions.push(Condition::Compare {
            column: ID.to_string(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Result<Self, DatabaseError> {
        if !self.model.has_column(column) {
            return Err(DatabaseError::UnknownColumn(format!("{}.{}", self.model.table, column)));
        }
        self.order.push((column.to_string(), direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: i64, offset: Option<i64>) -> Self {
        self.limit = Some(limit.max(0));
        self.offset = offset.map(|o| o.max(0));
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0));
        self
    }

    pub fn to_select_sql(&self) -> SqlResult {
        let columns = self
            .model
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        self.select(&columns, true)
    }

    pub fn to_ids_sql(&self) -> SqlResult {
        self.select(&format!("\"{}\"", ID), true)
    }

    pub fn to_count_sql(&self) -> SqlResult {
        self.select("COUNT(*) AS count", false)
    }

    pub fn to_delete_sql(&self) -> SqlResult {
        let (where_clause, params) = self.where_sql();
        SqlResult {
            query: format!("DELETE FROM \"{}\" WHERE {}", self.model.table, where_clause),
            params,
        }
    }

    fn select(&self, columns: &str, with_window: bool) -> SqlResult {
        let (where_clause, params) = self.where_sql();
        let mut parts = vec![
            format!("SELECT {}", columns),
            format!("FROM \"{}\"", self.model.table),
            format!("WHERE {}", where_clause),
        ];

        if with_window {
            parts.push(self.order_clause());
            match (self.limit, self.offset) {
                (Some(l), Some(o)) => parts.push(format!("LIMIT {} OFFSET {}", l, o)),
                (Some(l), None) => parts.push(format!("LIMIT {}", l)),
                (None, Some(o)) => parts.push(format!("LIMIT -1 OFFSET {}", o)),
                (None, None) => {}
            }
        }

        let query = parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");
        SqlResult { query, params }
    }

    fn order_clause(&self) -> String {
        // Stable default ordering
        if self.order.is_empty() {
            return format!("ORDER BY \"{}\" ASC", ID);
        }
        let terms: Vec<String> = self
            .order
            .iter()
            .map(|(column, dir)| format!("\"{}\" {}", column, dir.to_sql()))
            .collect();
        format!("ORDER BY {}", terms.join(", "))
    }

    pub fn where_sql(&self) -> (String, Vec<Value>) {
        let mut params = vec![];
        let sql = render_all(&self.conditions, " AND ", &mut params);
        (sql, params)
    }
}

fn render_all(conditions: &[Condition], joiner: &str, params: &mut Vec<Value>) -> String {
    if conditions.is_empty() {
        return "1=1".to_string();
    }
    conditions
        .iter()
        .map(|c| render(c, params))
        .collect::<Vec<_>>()
        .join(joiner)
}

fn render(condition: &Condition, params: &mut Vec<Value>) -> String {
    match condition {
        Condition::Raw { sql, params: raw } => {
            params.extend(raw.iter().cloned());
            format!("({})", sql)
        }
        Condition::Any(conditions) => {
            if conditions.is_empty() {
                return "1=0".to_string();
            }
            format!("({})", render_all(conditions, " OR ", params))
        }
        Condition::Compare { column, op, value } => render_compare(column, *op, value, params),
    }
}

fn render_compare(column: &str, op: FilterOp, value: &Value, params: &mut Vec<Value>) -> String {
    let quoted = format!("\"{}\"", column);
    let mut param = |v: Value| {
        params.push(v);
        "?"
    };

    match op {
        FilterOp::Eq if value.is_null() => format!("{} IS NULL", quoted),
        FilterOp::Neq if value.is_null() => format!("{} IS NOT NULL", quoted),
        FilterOp::Eq => format!("{} = {}", quoted, param(value.clone())),
        FilterOp::Neq => format!("{} <> {}", quoted, param(value.clone())),
        FilterOp::Gt => format!("{} > {}", quoted, param(value.clone())),
        FilterOp::Gte => format!("{} >= {}", quoted, param(value.clone())),
        FilterOp::Lt => format!("{} < {}", quoted, param(value.clone())),
        FilterOp::Lte => format!("{} <= {}", quoted, param(value.clone())),
        FilterOp::In | FilterOp::Nin => {
            let values = match value {
                Value::Array(values) => values.clone(),
                other => vec![other.clone()],
            };
            if values.is_empty() {
                // Nothing is in an empty list
                return if op == FilterOp::In { "1=0" } else { "1=1" }.to_string();
            }
            let placeholders: Vec<&str> = values.into_iter().map(&mut param).collect();
            let keyword = if op == FilterOp::In { "IN" } else { "NOT IN" };
            format!("{} {} ({})", quoted, keyword, placeholders.join(", "))
        }
        FilterOp::Contains | FilterOp::Starts | FilterOp::Ends => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let pattern = match op {
                FilterOp::Contains => format!("%{}%", text),
                FilterOp::Starts => format!("{}%", text),
                _ => format!("%{}", text),
            };
            format!("{} LIKE {}", quoted, param(Value::String(pattern)))
        }
        FilterOp::Null => format!("{} IS NULL", quoted),
        FilterOp::NotNull => format!("{} IS NOT NULL", quoted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::model::{Column, ID_COLUMN};
    use serde_json::json;

    static THING: ModelDef = ModelDef {
        name: "Thing",
        table: "test_thing",
        columns: &[ID_COLUMN, Column::text("name"), Column::integer("user_id").nullable()],
        relationships: &[],
        owner_column: Some("user_id"),
    };

    #[test]
    fn empty_query_selects_everything() {
        let sql = THING.query().to_select_sql();
        assert_eq!(
            sql.query,
            "SELECT \"id\", \"name\", \"user_id\" FROM \"test_thing\" WHERE 1=1 ORDER BY \"id\" ASC"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn chains_conditions_in_order() {
        let query = THING
            .query()
            .filter("name", FilterOp::Contains, json!("acme"))
            .unwrap()
            .filter("user_id", FilterOp::Eq, json!(3))
            .unwrap()
            .limit(10, Some(20));
        let sql = query.to_select_sql();
        assert!(sql.query.contains("WHERE \"name\" LIKE ? AND \"user_id\" = ?"));
        assert!(sql.query.ends_with("LIMIT 10 OFFSET 20"));
        assert_eq!(sql.params, vec![json!("%acme%"), json!(3)]);
    }

    #[test]
    fn renders_any_and_lists() {
        let query = THING.query();
        let by_user = query.condition("user_id", FilterOp::Eq, json!(1)).unwrap();
        let no_user = query.condition("user_id", FilterOp::Null, Value::Null).unwrap();
        let sql = query.filter_any(vec![by_user, no_user]).ids(&[1, 2]).to_count_sql();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM \"test_thing\" WHERE (\"user_id\" = ? OR \"user_id\" IS NULL) AND \"id\" IN (?, ?)"
        );
        assert_eq!(sql.params, vec![json!(1), json!(1), json!(2)]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let sql = THING.query().ids(&[]).to_delete_sql();
        assert_eq!(sql.query, "DELETE FROM \"test_thing\" WHERE 1=0");
    }

    #[test]
    fn rejects_unknown_columns() {
        let result = THING.query().filter("missing", FilterOp::Eq, json!(1));
        assert!(matches!(result, Err(DatabaseError::UnknownColumn(_))));
    }
}
