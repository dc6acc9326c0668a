//! 查询分发服务模块

use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use url::Url;

use common::config::LookupConfig;
use common::errors::AppResult;
use common::models::lookup::ResultSet;
use common::utils::{Dialect, LookupValidator, StatementBuilder};

use crate::executor::QueryExecutor;

/// 校验请求并执行唯一一条只读查询
pub struct LookupService {
    config: Arc<LookupConfig>,
    dialect: Dialect,
    executor: Arc<dyn QueryExecutor>,
}

impl LookupService {
    /// 创建新的查询服务实例
    pub fn new(config: Arc<LookupConfig>, dialect: Dialect, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            config,
            dialect,
            executor,
        }
    }

    /// 校验、构造语句、执行并返回全部结果行
    pub async fn lookup(&self, method: &Method, url: &Url) -> AppResult<ResultSet> {
        let spec = LookupValidator::new(&self.config)
            .validate(method, url)
            .inspect_err(|e| tracing::debug!(reason = %e, "请求被拒绝"))?;

        let statement = StatementBuilder::new(self.dialect, &self.config.projection).build(&spec);

        let start = Instant::now();
        let result = self
            .executor
            .fetch_all(&statement)
            .await
            .inspect_err(|e| tracing::error!(error = %e, sql = %statement.sql, "Error performing database operation"))?;

        tracing::info!(
            table = %spec.table(),
            shape = %statement.shape,
            rows = result.meta.rows_read,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "查询完成"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{row, StubExecutor};
    use common::errors::AppError;
    use common::models::lookup::QueryShape;

    fn service(executor: Arc<StubExecutor>) -> LookupService {
        LookupService::new(Arc::new(LookupConfig::default()), Dialect::Sqlite, executor)
    }

    fn url(query: &str) -> Url {
        Url::parse(&format!("http://localhost:8083/api/?{}", query)).unwrap()
    }

    #[tokio::test]
    async fn test_unfiltered_lookup() {
        let executor = Arc::new(StubExecutor::with_rows(vec![row(1, "a")]));
        let result = service(executor.clone())
            .lookup(&Method::GET, &url("table=111&search=1"))
            .await
            .unwrap();

        assert_eq!(result.meta.rows_read, 1);
        let statements = executor.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].shape, QueryShape::Unfiltered);
        assert_eq!(statements[0].sql, r#"SELECT "id" AS "id", "ces" AS "ces" FROM "111""#);
    }

    #[tokio::test]
    async fn test_fuzzy_lookup_binds_wrapped_term() {
        let executor = Arc::new(StubExecutor::with_rows(vec![]));
        service(executor.clone())
            .lookup(&Method::GET, &url("table=111&fuzzy=true&column=id&search=1"))
            .await
            .unwrap();

        let statements = executor.statements();
        assert_eq!(statements[0].shape, QueryShape::Fuzzy);
        assert_eq!(statements[0].params, vec!["%1%"]);
        assert!(statements[0].sql.ends_with(r#"WHERE "id" LIKE ?"#));
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_storage() {
        let executor = Arc::new(StubExecutor::with_rows(vec![]));
        let err = service(executor.clone())
            .lookup(&Method::GET, &url("table=111&search=%3Cscript%3E"))
            .await
            .unwrap_err();

        assert_eq!(err, AppError::InvalidSearch);
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_storage_error_is_propagated() {
        let executor = Arc::new(StubExecutor::failing("disk I/O error"));
        let err = service(executor)
            .lookup(&Method::GET, &url("table=222&column=ces&search=x"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DatabaseQuery(_)));
    }
}
