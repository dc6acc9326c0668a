//! Handler模块

use axum::{
    extract::State,
    http::{header, uri::Authority, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::models::lookup::ResultSet;
use crate::state::AppState;

/// 按白名单参数查询表数据
///
/// 除健康检查与文档外的所有路径和方法都会进入此处，由校验流程决定结果。
#[utoipa::path(
    get,
    path = "/api/",
    tag = "lookup",
    params(
        ("table" = String, Query, description = "要查询的表（白名单）"),
        ("fuzzy" = Option<String>, Query, description = "是否模糊查询：true / false"),
        ("column" = Option<String>, Query, description = "用于过滤的列（白名单）"),
        ("search" = String, Query, description = "查询内容：中文、字母、数字、- 和 .")
    ),
    responses(
        (status = 200, description = "查询结果", body = ResultSet),
        (status = 400, description = "缺少 table 参数", body = String),
        (status = 403, description = "路径或参数不合法", body = String),
        (status = 405, description = "仅支持 GET", body = String),
        (status = 500, description = "数据库或内部错误", body = String)
    )
)]
pub async fn lookup(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    match run_lookup(&state, &method, &headers, &uri).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run_lookup(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    uri: &Uri,
) -> AppResult<ResultSet> {
    // 方法校验先于 URL 还原，保证非 GET 请求一律 405
    if *method != Method::GET {
        return Err(AppError::MethodNotAllowed);
    }

    let url = request_url(headers, uri, &state.lookup.public_scheme).inspect_err(|e| {
        if e.is_client_error() {
            tracing::debug!(reason = %e, "请求被拒绝");
        } else {
            tracing::error!(error = %e, "Error processing request");
        }
    })?;

    state.lookup_service().lookup(method, &url).await
}

/// Rebuilds the absolute URL the client requested.
///
/// Only the scheme and authority come from headers; path and query always
/// come from the request line.
fn request_url(headers: &HeaderMap, uri: &Uri, default_scheme: &str) -> AppResult<Url> {
    // 多级代理时取第一个值
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| uri.scheme_str())
        .unwrap_or(default_scheme)
        .to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(AppError::InvalidPath);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .ok_or_else(|| AppError::Internal("request carries no host".into()))?;
    if host.contains(['/', '?', '#', '@']) {
        return Err(AppError::InvalidPath);
    }
    let authority: Authority = host
        .parse()
        .map_err(|e| AppError::Internal(format!("invalid host '{}': {}", host, e)))?;

    let mut url = Url::parse(&format!("{}://{}/", scheme, authority))
        .map_err(|e| AppError::Internal(format!("invalid request URL: {}", e)))?;
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务状态", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.executor.ping().await {
        Ok(latency) => DatabaseHealth {
            connected: true,
            latency_ms: Some(latency.as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "数据库不可用");
            DatabaseHealth {
                connected: false,
                latency_ms: None,
                error: Some(e.to_string()),
            }
        }
    };

    Json(HealthResponse {
        status: if database.connected { "healthy" } else { "degraded" }.to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database,
    })
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 数据库连通性
    pub database: DatabaseHealth,
}

#[derive(Serialize, ToSchema)]
pub struct DatabaseHealth {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
