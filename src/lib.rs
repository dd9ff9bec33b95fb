//! aerodoc - An embeddable document database on a pluggable key-value engine
//!
//! Documents live in tables backed by ordered stores of any transactional
//! key-value engine. Queries are built as statements, planned by a
//! rule-based optimizer and executed as lazy document streams.

pub mod config;
pub mod database;
pub mod document;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod planner;
pub mod query;
pub mod stream;

pub use config::DatabaseConfig;
pub use database::{Database, IndexConfig, TableConfig, Transaction};
pub use document::{Document, FieldBuffer, FieldPath, Value};
pub use errors::{DbError, DbErrorCode, DbResult};
