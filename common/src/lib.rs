//! Shared building blocks for the lookup service.
//!
//! - `config`: deployment configuration (server, database, allow-lists)
//! - `errors`: the error taxonomy and its HTTP mapping
//! - `middleware`: request-id tagging
//! - `models`: lookup request / statement / result types
//! - `utils`: request validation and statement building

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod utils;
