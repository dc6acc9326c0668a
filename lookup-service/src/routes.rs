//! 路由模块

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// 健康检查走固定路由，其余请求全部交给查询处理器
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .fallback(handlers::lookup)
}
