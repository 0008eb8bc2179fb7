use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::model::ModelDef;
use crate::database::DatabaseError;

/// Owns the connection pool and the schema bootstrap
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open the pool described by the database configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout));

        // Every in-memory connection is its own database, so keep exactly one alive
        if Self::is_memory_url(&config.url) {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!("Connected to database: {}", config.url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables (and association tables) for the given models when missing
    pub async fn initialize(&self, models: &[&'static ModelDef]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut created_associations: Vec<&str> = vec![];

        for model in models {
            sqlx::query(&model.create_table_sql()).execute(&mut *tx).await?;
        }
        for model in models {
            for association in model.associations() {
                if created_associations.contains(&association.table) {
                    continue;
                }
                sqlx::query(&association.create_table_sql()).execute(&mut *tx).await?;
                created_associations.push(association.table);
            }
        }

        tx.commit().await?;
        info!(
            "Initialized {} tables and {} association tables",
            models.len(),
            created_associations.len()
        );
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    fn is_memory_url(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_memory_urls() {
        assert!(DatabaseManager::is_memory_url("sqlite::memory:"));
        assert!(DatabaseManager::is_memory_url("sqlite://file?mode=memory&cache=shared"));
        assert!(!DatabaseManager::is_memory_url("sqlite://sandglass.db?mode=rwc"));
    }
}
