//! Tabula Core - DataFusion table engine
//!
//! This crate provides:
//! - Registration of uploaded CSV, JSON and Parquet files as tables
//! - Read-only SQL execution with results rendered as JSON rows
//! - Schema extraction for LLM prompts (names, types and row counts only)
//! - On-disk storage of uploads so tables survive restarts

pub mod engine;
pub mod error;
pub mod guard;
pub mod result;
pub mod schema;
pub mod store;
pub mod upload;

pub use engine::{QueryEngine, RegisteredTable};
pub use error::CoreError;
pub use result::QueryResult;
pub use schema::{ColumnMeta, SchemaDescription, TableSchema};
pub use store::TableStore;
pub use upload::{sanitize_table_name, StorageFormat, UploadFormat};
