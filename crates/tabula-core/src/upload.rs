//! Upload formats and table naming

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Format of a file as the user uploaded it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    /// A JSON array of objects
    Json,
    /// Newline-delimited JSON objects
    JsonLines,
    Parquet,
}

/// Format of a file as it sits in the data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    Csv,
    /// Newline-delimited JSON
    Json,
    Parquet,
}

impl UploadFormat {
    /// Detect the format from a file name's extension
    pub fn from_filename(filename: &str) -> Result<Self, CoreError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(UploadFormat::Csv),
            "json" => Ok(UploadFormat::Json),
            "jsonl" | "ndjson" => Ok(UploadFormat::JsonLines),
            "parquet" => Ok(UploadFormat::Parquet),
            _ => Err(CoreError::UnsupportedFormat(format!(
                "'{}' (expected .csv, .json, .jsonl, .ndjson or .parquet)",
                filename
            ))),
        }
    }

    pub fn storage_format(&self) -> StorageFormat {
        match self {
            UploadFormat::Csv => StorageFormat::Csv,
            UploadFormat::Json | UploadFormat::JsonLines => StorageFormat::Json,
            UploadFormat::Parquet => StorageFormat::Parquet,
        }
    }

    /// Convert uploaded bytes to the on-disk representation.
    ///
    /// JSON arrays become newline-delimited JSON since that is what
    /// DataFusion's JSON reader consumes. Other formats are only checked
    /// for emptiness; their parsers report problems at registration time.
    pub fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(CoreError::InvalidUpload("file is empty".to_string()));
        }

        match self {
            UploadFormat::Json => json_array_to_ndjson(bytes),
            UploadFormat::JsonLines => {
                for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
                    if line.iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    let value: serde_json::Value = serde_json::from_slice(line).map_err(|e| {
                        CoreError::InvalidUpload(format!("line {}: {}", idx + 1, e))
                    })?;
                    if !value.is_object() {
                        return Err(CoreError::InvalidUpload(format!(
                            "line {}: expected a JSON object",
                            idx + 1
                        )));
                    }
                }
                Ok(bytes.to_vec())
            }
            UploadFormat::Csv | UploadFormat::Parquet => Ok(bytes.to_vec()),
        }
    }
}

impl StorageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Csv => "csv",
            StorageFormat::Json => "json",
            StorageFormat::Parquet => "parquet",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "csv" => Some(StorageFormat::Csv),
            "json" => Some(StorageFormat::Json),
            "parquet" => Some(StorageFormat::Parquet),
            _ => None,
        }
    }
}

fn json_array_to_ndjson(bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::InvalidUpload(format!("invalid JSON: {}", e)))?;

    let records = match value {
        serde_json::Value::Array(records) => records,
        serde_json::Value::Object(_) => vec![value],
        _ => {
            return Err(CoreError::InvalidUpload(
                "expected a JSON array of objects".to_string(),
            ))
        }
    };

    if records.is_empty() {
        return Err(CoreError::InvalidUpload("JSON array is empty".to_string()));
    }

    let mut out = Vec::with_capacity(bytes.len());
    for (idx, record) in records.iter().enumerate() {
        if !record.is_object() {
            return Err(CoreError::InvalidUpload(format!(
                "element {} is not a JSON object",
                idx
            )));
        }
        serde_json::to_writer(&mut out, record)
            .map_err(|e| CoreError::InvalidUpload(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Derive a SQL-safe table name from an uploaded file name.
///
/// `Sales Report (2024).csv` becomes `sales_report_2024`; names starting
/// with a digit get a `t_` prefix.
pub fn sanitize_table_name(filename: &str) -> Result<String, CoreError> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut name = String::with_capacity(stem.len());
    for ch in stem.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_');

    if name.is_empty() {
        return Err(CoreError::InvalidTableName(format!(
            "cannot derive a table name from '{}'",
            filename
        )));
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        Ok(format!("t_{}", name))
    } else {
        Ok(name.to_string())
    }
}
