//! Lookup models.
//!
//! A request travels through these types in order:
//! `LookupParams` (raw query string) -> `LookupSpec` (validated) ->
//! `Statement` (SQL plus bound values) -> `ResultSet` (rows as JSON).

use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// One result row: output column name -> value, in projection order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Raw lookup parameters as they appear in the query string.
///
/// Only the first occurrence of each key is kept. Empty values are kept as
/// `Some("")`; the validator decides what emptiness means per parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupParams {
    pub table: Option<String>,
    pub fuzzy: Option<String>,
    pub column: Option<String>,
    pub search: Option<String>,
}

impl LookupParams {
    /// Reads the four lookup keys from a parsed request URL.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "table" => &mut params.table,
                "fuzzy" => &mut params.fuzzy,
                "column" => &mut params.column,
                "search" => &mut params.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// A lookup whose every field passed the allow-list and charset checks.
///
/// Only `utils::lookup_validator` can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSpec {
    table: String,
    column: Option<String>,
    search: String,
    fuzzy: Option<bool>,
}

impl LookupSpec {
    pub(crate) fn new(
        table: String,
        column: Option<String>,
        search: String,
        fuzzy: Option<bool>,
    ) -> Self {
        Self {
            table,
            column,
            search,
            fuzzy,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn fuzzy(&self) -> Option<bool> {
        self.fuzzy
    }

    /// The statement shape this lookup runs as.
    pub fn shape(&self) -> QueryShape {
        QueryShape::select(self.fuzzy, self.column(), Some(self.search()))
    }
}

/// The three statement shapes the service can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryShape {
    /// Every row of the table.
    Unfiltered,
    /// Rows where the column matches the search term as given.
    Exact,
    /// Rows where the column contains the search term.
    Fuzzy,
}

impl QueryShape {
    /// Picks the shape from which optional parameters are in play.
    pub fn select(fuzzy: Option<bool>, column: Option<&str>, search: Option<&str>) -> Self {
        match (fuzzy, column, search) {
            (Some(true), Some(_), Some(_)) => QueryShape::Fuzzy,
            (_, Some(_), Some(_)) => QueryShape::Exact,
            _ => QueryShape::Unfiltered,
        }
    }
}

impl std::fmt::Display for QueryShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryShape::Unfiltered => write!(f, "unfiltered"),
            QueryShape::Exact => write!(f, "exact"),
            QueryShape::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// A ready-to-run statement. `params` are bound in order, never spliced into `sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
    pub shape: QueryShape,
}

/// Full result of a lookup, serialized as the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultSet {
    pub success: bool,

    /// Result rows, each an object keyed by output column alias.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<Row>,

    pub meta: ResultMeta,
}

impl ResultSet {
    /// Wraps the rows read by a backend.
    pub fn from_rows(results: Vec<Row>, served_by: impl Into<String>) -> Self {
        Self {
            success: true,
            meta: ResultMeta {
                served_by: served_by.into(),
                rows_read: results.len(),
                changes: 0,
                changed_db: false,
            },
            results,
        }
    }
}

/// Metadata attached by the storage executor.
///
/// Holds no timing so that repeating a lookup yields the same body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResultMeta {
    /// Backend that answered (`sqlite`, `mysql`, `postgres`).
    pub served_by: String,
    /// Number of rows returned.
    pub rows_read: usize,
    /// Rows written; always 0 for lookups.
    pub changes: u64,
    pub changed_db: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_keeps_first_occurrence() {
        let url = Url::parse("http://localhost/api/?table=111&table=222&search=a+b&x=1").unwrap();
        let params = LookupParams::from_url(&url);
        assert_eq!(params.table.as_deref(), Some("111"));
        assert_eq!(params.search.as_deref(), Some("a b"));
        assert_eq!(params.column, None);
        assert_eq!(params.fuzzy, None);
    }

    #[test]
    fn test_from_url_decodes_percent_escapes() {
        let url = Url::parse("http://localhost/api/?search=%E4%B8%AD%E6%96%87&column=").unwrap();
        let params = LookupParams::from_url(&url);
        assert_eq!(params.search.as_deref(), Some("中文"));
        assert_eq!(params.column.as_deref(), Some(""));
    }

    #[test]
    fn test_shape_selection() {
        assert_eq!(QueryShape::select(Some(true), Some("id"), Some("1")), QueryShape::Fuzzy);
        assert_eq!(QueryShape::select(Some(false), Some("id"), Some("1")), QueryShape::Exact);
        assert_eq!(QueryShape::select(None, Some("id"), Some("1")), QueryShape::Exact);
        assert_eq!(QueryShape::select(Some(true), None, Some("1")), QueryShape::Unfiltered);
        assert_eq!(QueryShape::select(None, None, Some("1")), QueryShape::Unfiltered);
        assert_eq!(QueryShape::select(Some(true), Some("id"), None), QueryShape::Unfiltered);
    }

    #[test]
    fn test_result_set_serialization() {
        let mut row = Row::new();
        row.insert("id".into(), serde_json::json!(1));
        row.insert("ces".into(), serde_json::json!("abc"));
        let set = ResultSet::from_rows(vec![row], "sqlite");

        let body = serde_json::to_string(&set).unwrap();
        assert_eq!(
            body,
            r#"{"success":true,"results":[{"id":1,"ces":"abc"}],"meta":{"served_by":"sqlite","rows_read":1,"changes":0,"changed_db":false}}"#
        );
    }
}
