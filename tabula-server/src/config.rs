//! Server configuration from environment variables.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Directory holding one file per uploaded table.
    pub data_dir: String,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: std::env::var("TABULA_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            data_dir: std::env::var("TABULA_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            max_upload_bytes: std::env::var("TABULA_MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (50 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid TABULA_MAX_UPLOAD_BYTES")?,
        })
    }
}
