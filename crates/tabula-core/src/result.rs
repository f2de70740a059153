//! Query results as JSON rows

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One result row, column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Result of a read-only query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

/// Convert record batches to JSON objects, keeping nulls as explicit `null`
pub fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Row>, CoreError> {
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs)?;
    writer.finish()?;

    let buf = writer.into_inner();
    serde_json::from_slice(&buf).map_err(|e| CoreError::QueryFailed(e.to_string()))
}

/// Make output column names unique so rows keyed by name keep every column.
///
/// Repeats get a numeric suffix (`id`, `id_1`, `id_2`), skipping any suffix
/// that is already taken by another column.
pub fn unique_column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.into_iter().collect();
    let mut taken: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
    let mut seen = HashSet::new();

    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.to_string()) {
                return name.to_string();
            }
            let mut suffix = 1;
            loop {
                let candidate = format!("{}_{}", name, suffix);
                if taken.insert(candidate.clone()) {
                    seen.insert(candidate.clone());
                    return candidate;
                }
                suffix += 1;
            }
        })
        .collect()
}

/// Relabel a batch's columns, keeping types and data
pub fn rename_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch, CoreError> {
    let fields: Vec<_> = batch
        .schema()
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| field.as_ref().clone().with_name(name))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, batch.columns().to_vec())?)
}
