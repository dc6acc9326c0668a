//! Lookup request validator.
//!
//! Runs the fixed check sequence over an incoming request and, only when
//! every check passes, hands out a `LookupSpec`. The first failing check
//! decides the error.

use axum::http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::config::LookupConfig;
use crate::errors::{AppError, AppResult};
use crate::models::lookup::{LookupParams, LookupSpec};

/// CJK ideographs, ASCII letters, digits, `-` and `.`; at least one character.
static SEARCH_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\x{4e00}-\x{9fa5}A-Za-z0-9.\-]+$").unwrap());

/// Validates lookup requests against a `LookupConfig`.
pub struct LookupValidator<'a> {
    config: &'a LookupConfig,
}

impl<'a> LookupValidator<'a> {
    pub fn new(config: &'a LookupConfig) -> Self {
        Self { config }
    }

    /// Validates a whole request: method, URL prefix, then the query parameters.
    ///
    /// # Errors
    /// The `AppError` of the first check that fails.
    pub fn validate(&self, method: &Method, url: &Url) -> AppResult<LookupSpec> {
        if *method != Method::GET {
            return Err(AppError::MethodNotAllowed);
        }
        if !url.as_str().starts_with(&self.config.trusted_base_url) {
            return Err(AppError::InvalidPath);
        }
        self.validate_params(LookupParams::from_url(url))
    }

    /// Validates the query parameters alone.
    pub fn validate_params(&self, params: LookupParams) -> AppResult<LookupSpec> {
        let table = match non_empty(params.table) {
            None => return Err(AppError::MissingTable),
            Some(table) if !self.config.is_allowed_table(&table) => {
                return Err(AppError::InvalidTable)
            }
            Some(table) => table,
        };

        let fuzzy = match non_empty(params.fuzzy).as_deref() {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(_) => return Err(AppError::InvalidFuzzy),
        };

        let column = match non_empty(params.column) {
            Some(column) if !self.config.is_allowed_column(&column) => {
                return Err(AppError::InvalidColumn)
            }
            column => column,
        };

        let search = match params.search {
            Some(search) if is_valid_search(&search) => search,
            _ => return Err(AppError::InvalidSearch),
        };

        Ok(LookupSpec::new(table, column, search, fuzzy))
    }
}

/// Checks a search term against the permitted character class.
pub fn is_valid_search(term: &str) -> bool {
    SEARCH_TERM.is_match(term)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
