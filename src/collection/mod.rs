//! SQLite storage module for user collections
//!
//! Provides persistent per-user card collections keyed by
//! `(username, cert_number)`, with tag, sort, and filter operations.

pub mod repository;
pub mod schema;

pub use repository::{CardRepository, SortOrder};
pub use schema::create_tables;
