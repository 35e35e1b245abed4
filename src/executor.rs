//! Query execution against PostgreSQL
//!
//! The pipeline only sees the [`QueryExecutor`] trait; [`PgExecutor`] is the
//! sqlx-backed implementation used by the server.

use crate::config::DbConfig;
use crate::error::{PipelineError, Result};
use crate::intent::QueryParam;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{debug, warn};

/// One result row, column order preserved.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` with positionally bound `params`.
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>>;
}

pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Build a lazily connecting pool; no connection is opened until the
    /// first query.
    pub fn connect_lazy(config: &DbConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(config.connect_options());
        Self { pool }
    }

    /// Check that the database is reachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::Execution(e.to_string()))?;
        Ok(())
    }
}

/// Wrap a query so each row comes back as a single JSON object.
pub fn wrap_as_json_rows(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(';');
    format!("SELECT row_to_json(q) AS row FROM ({}) AS q", body)
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        let wrapped = wrap_as_json_rows(sql);

        // Held for this call only; returned to the pool when dropped.
        let mut conn = self.pool.acquire().await.map_err(|e| {
            warn!("Failed to acquire database connection: {}", e);
            PipelineError::Execution(e.to_string())
        })?;

        let mut query = sqlx::query_scalar::<_, Json<Value>>(&wrapped);
        for param in params {
            query = match param {
                QueryParam::Text(s) => query.bind(s.clone()),
                QueryParam::Integer(i) => query.bind(*i),
                QueryParam::Decimal(f) => query.bind(*f),
            };
        }

        let values = query.fetch_all(&mut *conn).await.map_err(|e| {
            warn!("Query execution failed: {}", e);
            PipelineError::Execution(e.to_string())
        })?;

        let rows = values
            .into_iter()
            .map(|Json(value)| match value {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            })
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), "Query returned rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_as_json_rows() {
        assert_eq!(
            wrap_as_json_rows("SELECT * FROM customers;"),
            "SELECT row_to_json(q) AS row FROM (SELECT * FROM customers) AS q"
        );
    }

    #[test]
    fn test_wrap_keeps_placeholders() {
        let sql = wrap_as_json_rows("SELECT * FROM products WHERE price > $1");
        assert!(sql.contains("price > $1"));
    }
}
