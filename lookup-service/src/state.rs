//! Application state for lookup service.

use std::sync::Arc;

use common::config::{AppConfig, LookupConfig};
use common::errors::AppResult;
use common::utils::Dialect;

use crate::executor::{QueryExecutor, SqlExecutor};
use crate::service::LookupService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub lookup: Arc<LookupConfig>,
    pub dialect: Dialect,
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    /// Creates the state and opens the database pool.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let executor = SqlExecutor::connect(&config).await?;
        let dialect = executor.dialect();
        Ok(Self::with_executor(config, dialect, Arc::new(executor)))
    }

    /// Creates the state around an existing executor.
    pub fn with_executor(config: AppConfig, dialect: Dialect, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            lookup: Arc::new(config.lookup.clone()),
            config: Arc::new(config),
            dialect,
            executor,
        }
    }

    pub fn lookup_service(&self) -> LookupService {
        LookupService::new(
            self.lookup.clone(),
            self.dialect,
            self.executor.clone(),
        )
    }
}
