use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::database::model::{ColumnKind, ModelDef, RelationKind, Relationship, ID};
use crate::database::query::Query;
use crate::database::{DatabaseError, Object};
use crate::filter::types::SqlResult;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Unit of work for a single request.
///
/// Wraps one transaction. Writes become visible to later statements of the same
/// session immediately and are persisted by [`Session::commit`]; dropping the
/// session without committing rolls everything back.
pub struct Session {
    tx: Transaction<'static, Sqlite>,
}

impl Session {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, DatabaseError> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub async fn all(&mut self, query: &Query) -> Result<Vec<Object>, DatabaseError> {
        let sql = query.to_select_sql();
        let rows = self.fetch_all(&sql).await?;
        rows.iter().map(|row| decode_row(query.model(), row)).collect()
    }

    pub async fn first(&mut self, query: &Query) -> Result<Option<Object>, DatabaseError> {
        let query = query.clone().limit(1, None);
        Ok(self.all(&query).await?.into_iter().next())
    }

    /// Get an object by primary key
    pub async fn get(&mut self, model: &'static ModelDef, id: i64) -> Result<Option<Object>, DatabaseError> {
        self.first(&model.query().ids(&[id])).await
    }

    pub async fn exists(&mut self, model: &'static ModelDef, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.count(&model.query().ids(&[id])).await? > 0)
    }

    pub async fn count(&mut self, query: &Query) -> Result<i64, DatabaseError> {
        let sql = query.to_count_sql();
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    /// Primary keys of the rows matched by a query
    pub async fn ids(&mut self, query: &Query) -> Result<Vec<i64>, DatabaseError> {
        let sql = query.to_ids_sql();
        let rows = self.fetch_all(&sql).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>(ID).map_err(DatabaseError::from))
            .collect()
    }

    /// Insert a row and return its primary key
    pub async fn insert(&mut self, model: &'static ModelDef, values: &Object) -> Result<i64, DatabaseError> {
        let columns: Vec<&str> = model
            .columns
            .iter()
            .map(|c| c.name)
            .filter(|name| values.contains_key(*name))
            .collect();

        let query = if columns.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES", model.table)
        } else {
            let names: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!("INSERT INTO \"{}\" ({}) VALUES ({})", model.table, names.join(", "), placeholders)
        };
        let params: Vec<Value> = columns.iter().map(|c| values[*c].clone()).collect();

        debug!("insert into {}: {}", model.table, query);
        let result = bind_params(sqlx::query(&query), &params).execute(&mut *self.tx).await?;
        Ok(result.last_insert_rowid())
    }

    /// Update columns of one row. Returns false when the row does not exist.
    pub async fn update(&mut self, model: &'static ModelDef, id: i64, values: &Object) -> Result<bool, DatabaseError> {
        let columns: Vec<&str> = model
            .columns
            .iter()
            .map(|c| c.name)
            .filter(|name| *name != ID && values.contains_key(*name))
            .collect();

        if columns.is_empty() {
            return self.exists(model, id).await;
        }

        let assignments: Vec<String> = columns.iter().map(|c| format!("\"{}\" = ?", c)).collect();
        let query = format!(
            "UPDATE \"{}\" SET {} WHERE \"{}\" = ?",
            model.table,
            assignments.join(", "),
            ID
        );
        let mut params: Vec<Value> = columns.iter().map(|c| values[*c].clone()).collect();
        params.push(id.into());

        debug!("update {}: {}", model.table, query);
        let result = bind_params(sqlx::query(&query), &params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every row matched by a query and return the number of deleted rows
    pub async fn delete(&mut self, query: &Query) -> Result<u64, DatabaseError> {
        let sql = query.to_delete_sql();
        debug!("delete: {}", sql.query);
        let result = bind_params(sqlx::query(&sql.query), &sql.params)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    /// Link `target_id` to the object `pk` through a list relationship.
    ///
    /// Returns false when the target does not exist or is already linked.
    pub async fn append_related(
        &mut self,
        relationship: &Relationship,
        pk: i64,
        target_id: i64,
    ) -> Result<bool, DatabaseError> {
        if !self.exists(relationship.target, target_id).await? {
            return Ok(false);
        }

        let (query, params): (String, Vec<Value>) = match relationship.kind {
            RelationKind::HasMany { remote_column } => (
                format!(
                    "UPDATE \"{table}\" SET \"{col}\" = ? WHERE \"id\" = ? AND (\"{col}\" IS NULL OR \"{col}\" <> ?)",
                    table = relationship.target.table,
                    col = remote_column
                ),
                vec![pk.into(), target_id.into(), pk.into()],
            ),
            RelationKind::ManyToMany {
                association,
                local_column,
                remote_column,
            } => (
                format!(
                    "INSERT OR IGNORE INTO \"{}\" (\"{}\", \"{}\") VALUES (?, ?)",
                    association.table, local_column, remote_column
                ),
                vec![pk.into(), target_id.into()],
            ),
            RelationKind::BelongsTo { .. } => return Ok(false),
        };

        let result = bind_params(sqlx::query(&query), &params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unlink `target_id` from the object `pk`. Returns false when it was not linked.
    pub async fn remove_related(
        &mut self,
        relationship: &Relationship,
        pk: i64,
        target_id: i64,
    ) -> Result<bool, DatabaseError> {
        let (query, params): (String, Vec<Value>) = match relationship.kind {
            RelationKind::HasMany { remote_column } => (
                format!(
                    "UPDATE \"{table}\" SET \"{col}\" = NULL WHERE \"id\" = ? AND \"{col}\" = ?",
                    table = relationship.target.table,
                    col = remote_column
                ),
                vec![target_id.into(), pk.into()],
            ),
            RelationKind::ManyToMany {
                association,
                local_column,
                remote_column,
            } => (
                format!(
                    "DELETE FROM \"{}\" WHERE \"{}\" = ? AND \"{}\" = ?",
                    association.table, local_column, remote_column
                ),
                vec![pk.into(), target_id.into()],
            ),
            RelationKind::BelongsTo { .. } => return Ok(false),
        };

        let result = bind_params(sqlx::query(&query), &params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_all(&mut self, sql: &SqlResult) -> Result<Vec<SqliteRow>, DatabaseError> {
        debug!("select: {}", sql.query);
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }
}

fn decode_row(model: &ModelDef, row: &SqliteRow) -> Result<Object, DatabaseError> {
    let mut object = Object::new();
    for column in model.columns {
        let value = match column.kind {
            ColumnKind::Integer => row.try_get::<Option<i64>, _>(column.name)?.map(Value::from),
            ColumnKind::Boolean => row.try_get::<Option<bool>, _>(column.name)?.map(Value::from),
            ColumnKind::Text | ColumnKind::DateTime => row.try_get::<Option<String>, _>(column.name)?.map(Value::from),
        };
        object.insert(column.name.to_string(), value.unwrap_or(Value::Null));
    }
    Ok(object)
}

fn bind_params<'q>(mut q: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    for value in params {
        q = bind_value(q, value);
    }
    q
}

fn bind_value<'q>(q: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => q.bind(Option::<String>::None),
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        // Structured values are stored as JSON text
        other => q.bind(other.to_string()),
    }
}
