//! Schema extraction for LLM prompts
//!
//! Only metadata leaves this module: column names, SQL type names and row
//! counts. No data values are read apart from the `COUNT(*)` aggregate.

use std::collections::BTreeMap;

use arrow::array::Int64Array;
use arrow::datatypes::DataType;
use datafusion::prelude::SessionContext;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Column metadata (safe to send to an LLM)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,

    /// Declared SQL type, e.g. `INTEGER` or `TEXT`
    pub data_type: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// One table of a [`SchemaDescription`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns in declaration order
    pub columns: Vec<ColumnMeta>,

    /// Total row count
    pub row_count: u64,
}

/// Summary of every available table, keyed by table name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and fixtures.
    pub fn with_table(mut self, name: impl Into<String>, table: TableSchema) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }
}

/// Extract the schema of a registered table
pub async fn extract_schema(
    ctx: &SessionContext,
    table_name: &str,
) -> Result<TableSchema, CoreError> {
    let table = ctx
        .table(table_name)
        .await
        .map_err(|_| CoreError::TableNotFound(table_name.to_string()))?;

    let columns = table
        .schema()
        .fields()
        .iter()
        .map(|field| ColumnMeta::new(field.name().clone(), sql_type_name(field.data_type())))
        .collect();

    let row_count = count_rows(ctx, table_name).await?;

    Ok(TableSchema { columns, row_count })
}

/// Row count without fetching any data
pub async fn count_rows(ctx: &SessionContext, table_name: &str) -> Result<u64, CoreError> {
    let batches = ctx
        .sql(&format!("SELECT COUNT(*) FROM \"{}\"", table_name))
        .await?
        .collect()
        .await?;

    let count = batches
        .first()
        .filter(|b| b.num_rows() > 0)
        .and_then(|b| b.column(0).as_any().downcast_ref::<Int64Array>())
        .map(|arr| arr.value(0).max(0) as u64)
        .unwrap_or(0);

    Ok(count)
}

/// Render an Arrow type the way a SQL user would write it
pub fn sql_type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INTEGER".to_string(),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "REAL".to_string(),
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("DECIMAL({}, {})", p, s),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "TEXT".to_string(),
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Timestamp(_, _) => "TIMESTAMP".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView => "BLOB".to_string(),
        DataType::Null => "NULL".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}
