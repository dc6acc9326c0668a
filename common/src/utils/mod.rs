//! Request validation and statement building.

pub mod lookup_validator;
pub mod query_builder;

// Re-export commonly used types
pub use lookup_validator::LookupValidator;
pub use query_builder::{Dialect, StatementBuilder};
