//! # Roster Shared Library
//!
//! Storage, validation, and versioning logic behind the Roster API.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and embedded migrations
//! - `models`: Row models for `users` and `managers`
//! - `validation`: Field normalization and manager checks
//! - `transition`: Create, delete, and versioned update of user records
//! - `error`: Errors shared by validation and transitions

pub mod db;
pub mod error;
pub mod models;
pub mod transition;
pub mod validation;

/// Current version of the Roster shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
