//! Storage executor.
//!
//! The only way the service touches the data store: run one prepared
//! statement and read every row back as JSON.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row as _, TypeInfo, ValueRef};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::lookup::{ResultSet, Row, Statement};
use common::utils::Dialect;

/// Executes lookup statements against a data store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs the statement and returns all rows.
    async fn fetch_all(&self, statement: &Statement) -> AppResult<ResultSet>;

    /// Round-trips a trivial query and reports the latency.
    async fn ping(&self) -> AppResult<Duration>;
}

/// `QueryExecutor` over an sqlx `AnyPool` (SQLite, MySQL or PostgreSQL).
pub struct SqlExecutor {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlExecutor {
    /// Opens a pool for `config.database_url`.
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        sqlx::any::install_default_drivers();

        let dialect = Dialect::from_database_url(&config.database_url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        tracing::info!(backend = %dialect, max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

#[async_trait]
impl QueryExecutor for SqlExecutor {
    async fn fetch_all(&self, statement: &Statement) -> AppResult<ResultSet> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = query.bind(param.clone());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;

        let results = rows.iter().map(row_to_json).collect::<AppResult<Vec<_>>>()?;
        Ok(ResultSet::from_rows(results, self.dialect.to_string()))
    }

    async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(start.elapsed())
    }
}

fn row_to_json(row: &AnyRow) -> AppResult<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        out.insert(column.name().to_string(), column_value(row, column.ordinal())?);
    }
    Ok(out)
}

fn column_value(row: &AnyRow, index: usize) -> AppResult<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number));
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(v));
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Ok(Value::String(v));
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::from(v));
    }

    Err(AppError::DatabaseQuery(format!(
        "unsupported column type {} at index {}",
        type_name, index
    )))
}


#[cfg(test)]
mod tests {
    use super::testing::memory_executor;
    use super::*;
    use common::models::lookup::QueryShape;

    fn statement(sql: &str, params: &[&str], shape: QueryShape) -> Statement {
        Statement {
            sql: sql.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            shape,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_unfiltered() {
        let executor = memory_executor().await;
        let result = executor
            .fetch_all(&statement(
                r#"SELECT "id" AS "id", "ces" AS "ces" FROM "111" ORDER BY "id""#,
                &[],
                QueryShape::Unfiltered,
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.meta.rows_read, 3);
        assert_eq!(result.meta.served_by, "sqlite");
        assert_eq!(result.results[0]["id"], Value::from(1));
        assert_eq!(result.results[2]["ces"], Value::from("beta"));
        let keys: Vec<&String> = result.results[0].keys().collect();
        assert_eq!(keys, vec!["id", "ces"]);
    }

    #[tokio::test]
    async fn test_fetch_all_binds_like_pattern() {
        let executor = memory_executor().await;
        let result = executor
            .fetch_all(&statement(
                r#"SELECT "id" AS "id" FROM "111" WHERE "id" LIKE ? ORDER BY "id""#,
                &["%1%"],
                QueryShape::Fuzzy,
            ))
            .await
            .unwrap();
        let ids: Vec<&Value> = result.results.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec![&Value::from(1), &Value::from(10)]);

        let result = executor
            .fetch_all(&statement(
                r#"SELECT "ces" AS "ces" FROM "111" WHERE "ces" LIKE ?"#,
                &["中文"],
                QueryShape::Exact,
            ))
            .await
            .unwrap();
        assert_eq!(result.meta.rows_read, 1);
        assert_eq!(result.results[0]["ces"], Value::from("中文"));
    }

    #[tokio::test]
    async fn test_nulls_and_reals() {
        let executor = memory_executor().await;
        let result = executor
            .fetch_all(&statement(
                r#"SELECT "score" AS "score" FROM "111" ORDER BY "id""#,
                &[],
                QueryShape::Unfiltered,
            ))
            .await
            .unwrap();
        assert_eq!(result.results[0]["score"], Value::from(1.5));
        assert_eq!(result.results[2]["score"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_table_is_a_query_error() {
        let executor = memory_executor().await;
        let err = executor
            .fetch_all(&statement(r#"SELECT 1 FROM "222""#, &[], QueryShape::Unfiltered))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseQuery(_)));
    }

    #[tokio::test]
    async fn test_ping() {
        let executor = memory_executor().await;
        assert!(executor.ping().await.is_ok());
    }
}
