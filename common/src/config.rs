//! Service configuration.
//!
//! Values come from environment variables (a `.env` file is loaded by the
//! binary before this runs). The lookup allow-lists live here so a deployment
//! or a test can swap them without touching validation code.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;
use validator::{Validate, ValidationError};

use crate::errors::{AppError, AppResult};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8083;
const DEFAULT_DATABASE_URL: &str = "sqlite:lookup.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_TRUSTED_BASE_URL: &str = "http://localhost:8083/api/";
const DEFAULT_ALLOWED_TABLES: &str = "111,222";
const DEFAULT_ALLOWED_COLUMNS: &str = "id,ces";
const DEFAULT_PROJECTION: &str = "id AS id,ces AS ces";
const DEFAULT_PUBLIC_SCHEME: &str = "http";

/// Table, column and alias names must be plain identifiers.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Top-level configuration of a service process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub lookup: LookupConfig,
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        Self::from_source(service_name, |key| std::env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup.
    pub fn from_source<F>(service_name: &str, get: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = get("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&get, "SERVER_PORT", DEFAULT_PORT)?;
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let connect_timeout_secs =
            parse_or(&get, "DB_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;

        Ok(Self {
            service_name: service_name.to_string(),
            host,
            port,
            database_url,
            max_connections,
            connect_timeout_secs,
            lookup: LookupConfig::from_source(&get)?,
        })
    }
}

/// One entry of the fixed output projection: `source AS alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionColumn {
    pub source: String,
    pub alias: String,
}

impl ProjectionColumn {
    pub fn new(source: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            alias: alias.into(),
        }
    }

    /// Parses `source`, `source AS alias` or `source alias`.
    fn parse(entry: &str) -> AppResult<Self> {
        let parts: Vec<&str> = entry.split_whitespace().collect();
        match parts.as_slice() {
            [source] => Ok(Self::new(*source, *source)),
            [source, kw, alias] if kw.eq_ignore_ascii_case("as") => Ok(Self::new(*source, *alias)),
            [source, alias] => Ok(Self::new(*source, *alias)),
            _ => Err(AppError::Config(format!("invalid projection entry '{}'", entry))),
        }
    }
}

/// Allow-lists and request gate for the lookup endpoint.
#[derive(Debug, Clone, Validate)]
pub struct LookupConfig {
    /// Every accepted request URL starts with this prefix.
    #[validate(url(message = "trusted base URL must be an absolute URL"))]
    pub trusted_base_url: String,

    /// Scheme used to rebuild the request URL when no `X-Forwarded-Proto` is sent.
    pub public_scheme: String,

    #[validate(
        length(min = 1, message = "at least one table must be allowed"),
        custom(function = "validate_identifiers")
    )]
    pub allowed_tables: Vec<String>,

    #[validate(custom(function = "validate_identifiers"))]
    pub allowed_columns: Vec<String>,

    #[validate(
        length(min = 1, message = "projection must not be empty"),
        custom(function = "validate_projection")
    )]
    pub projection: Vec<ProjectionColumn>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            trusted_base_url: DEFAULT_TRUSTED_BASE_URL.to_string(),
            public_scheme: DEFAULT_PUBLIC_SCHEME.to_string(),
            allowed_tables: split_list(DEFAULT_ALLOWED_TABLES),
            allowed_columns: split_list(DEFAULT_ALLOWED_COLUMNS),
            projection: vec![ProjectionColumn::new("id", "id"), ProjectionColumn::new("ces", "ces")],
        }
    }
}

impl LookupConfig {
    /// Builds and validates the lookup configuration from a key lookup.
    pub fn from_source<F>(get: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let projection = get("LOOKUP_PROJECTION")
            .unwrap_or_else(|| DEFAULT_PROJECTION.to_string())
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ProjectionColumn::parse)
            .collect::<AppResult<Vec<_>>>()?;

        let mut config = Self {
            trusted_base_url: get("LOOKUP_TRUSTED_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TRUSTED_BASE_URL.to_string()),
            public_scheme: get("LOOKUP_PUBLIC_SCHEME")
                .unwrap_or_else(|| DEFAULT_PUBLIC_SCHEME.to_string()),
            allowed_tables: split_list(
                &get("LOOKUP_ALLOWED_TABLES").unwrap_or_else(|| DEFAULT_ALLOWED_TABLES.to_string()),
            ),
            allowed_columns: split_list(
                &get("LOOKUP_ALLOWED_COLUMNS")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_COLUMNS.to_string()),
            ),
            projection,
        };

        config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        // 保存为 Url 序列化后的形式，与还原出的请求 URL 一致
        config.trusted_base_url = Url::parse(&config.trusted_base_url)
            .map_err(|e| AppError::Config(format!("invalid trusted base URL: {}", e)))?
            .to_string();
        Ok(config)
    }

    pub fn is_allowed_table(&self, table: &str) -> bool {
        self.allowed_tables.iter().any(|t| t == table)
    }

    pub fn is_allowed_column(&self, column: &str) -> bool {
        self.allowed_columns.iter().any(|c| c == column)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn validate_identifiers(values: &Vec<String>) -> Result<(), ValidationError> {
    if values.iter().all(|v| IDENTIFIER.is_match(v)) {
        Ok(())
    } else {
        Err(ValidationError::new("identifier")
            .with_message("entries must match [A-Za-z0-9_]+".into()))
    }
}

fn validate_projection(columns: &Vec<ProjectionColumn>) -> Result<(), ValidationError> {
    if columns
        .iter()
        .all(|c| IDENTIFIER.is_match(&c.source) && IDENTIFIER.is_match(&c.alias))
    {
        Ok(())
    } else {
        Err(ValidationError::new("identifier")
            .with_message("projection entries must match [A-Za-z0-9_]+".into()))
    }
}
