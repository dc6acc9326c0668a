//! Shared data models.

pub mod lookup;

// Re-export commonly used types
pub use lookup::{LookupParams, LookupSpec, QueryShape, ResultMeta, ResultSet, Row, Statement};
