pub mod manager;
pub mod model;
pub mod query;
pub mod session;

use thiserror::Error;

pub use manager::DatabaseManager;
pub use model::{Column, ColumnKind, ModelDef, RelationKind, Relationship, ID};
pub use query::{Condition, Query};
pub use session::Session;

/// A decoded row, keyed by column name
pub type Object = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation (unique, foreign key, not null, check)
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            use sqlx::error::ErrorKind;
            match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    return DatabaseError::Integrity(db_err.message().to_string());
                }
                _ => {}
            }
        }
        DatabaseError::Sqlx(err)
    }
}
