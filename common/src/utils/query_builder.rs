//! SQL statement builder for validated lookups.
//!
//! Identifiers (table, column, projection) are quoted for the target dialect
//! and come only from allow-listed configuration; the search term is always
//! a bound parameter.

use crate::config::ProjectionColumn;
use crate::errors::{AppError, AppResult};
use crate::models::lookup::{LookupSpec, QueryShape, Statement};

/// SQL dialect of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
    Postgres,
}

impl Dialect {
    /// Derives the dialect from a connection URL scheme.
    pub fn from_database_url(url: &str) -> AppResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(AppError::Config(format!(
                "unsupported database scheme '{}'",
                other
            ))),
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote_ident(&self, ident: &str) -> String {
        let quote = match self {
            Dialect::MySql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        };
        let escaped = ident.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "sqlite"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

/// Builds the statement for a `LookupSpec`.
pub struct StatementBuilder<'a> {
    dialect: Dialect,
    projection: &'a [ProjectionColumn],
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: Dialect, projection: &'a [ProjectionColumn]) -> Self {
        Self {
            dialect,
            projection,
        }
    }

    /// Renders the fixed `source AS alias` list.
    pub fn projection_sql(&self) -> String {
        self.projection
            .iter()
            .map(|c| {
                format!(
                    "{} AS {}",
                    self.dialect.quote_ident(&c.source),
                    self.dialect.quote_ident(&c.alias)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn build(&self, spec: &LookupSpec) -> Statement {
        let shape = spec.shape();
        let base = format!(
            "SELECT {} FROM {}",
            self.projection_sql(),
            self.dialect.quote_ident(spec.table())
        );

        match (shape, spec.column()) {
            (QueryShape::Fuzzy, Some(column)) => Statement {
                sql: self.like_clause(base, column),
                params: vec![format!("%{}%", spec.search())],
                shape,
            },
            (QueryShape::Exact, Some(column)) => Statement {
                sql: self.like_clause(base, column),
                params: vec![spec.search().to_string()],
                shape,
            },
            _ => Statement {
                sql: base,
                params: vec![],
                shape: QueryShape::Unfiltered,
            },
        }
    }

    fn like_clause(&self, base: String, column: &str) -> String {
        let column = self.dialect.quote_ident(column);
        // PostgreSQL 没有 integer ~~ text，先转成文本再匹配
        let target = match self.dialect {
            Dialect::Postgres => format!("CAST({} AS TEXT)", column),
            Dialect::Sqlite | Dialect::MySql => column,
        };
        format!("{} WHERE {} LIKE {}", base, target, self.dialect.placeholder(1))
    }
}
