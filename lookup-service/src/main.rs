//! 白名单表查询服务
//!
//! 提供单一只读查询端点，包括：
//! - 请求方法、路径与参数的白名单校验
//! - 按参数组合选择全表 / 精确 / 模糊三种查询
//! - 结果集以 JSON 返回

mod executor;
mod handlers;
mod routes;
mod service;
mod state;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "lookup-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "表查询服务 API",
        version = "0.1.0",
        description = "白名单参数校验后的只读表查询"
    ),
    paths(
        handlers::lookup,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ResultSet,
        common::models::ResultMeta,
        common::models::QueryShape,
        handlers::HealthResponse,
        handlers::DatabaseHealth,
    )),
    tags(
        (name = "lookup", description = "表查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME).context("加载配置失败")?;

    // 创建应用状态（连接数据库）
    let state = AppState::new(config.clone())
        .await
        .context("初始化应用状态失败（检查 DATABASE_URL）")?;

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(
        service = SERVICE_NAME,
        address = %addr,
        trusted_base_url = %config.lookup.trusted_base_url,
        "启动服务"
    );

    let listener = TcpListener::bind(&addr).await.context("绑定地址失败")?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(routes::router())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Load .env file from the working directory (best-effort, no error if missing).
fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set by the environment
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

/// `KEY=VALUE` pairs of a dotenv file; blank lines and `#` comments are skipped.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .collect()
}
