//! On-disk storage for uploaded tables

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::upload::{sanitize_table_name, StorageFormat, UploadFormat};

/// Subdirectory for uploads that have not been accepted yet
const STAGING_DIR: &str = ".staging";

/// A file in the data directory that backs a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTable {
    pub table_name: String,
    pub format: StorageFormat,
    pub path: PathBuf,
}

/// Data directory holding one file per uploaded table
pub struct TableStore {
    base_path: PathBuf,
}

impl TableStore {
    /// Create a store at the given path, creating the directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn table_path(&self, table_name: &str, format: StorageFormat) -> PathBuf {
        self.base_path
            .join(format!("{}.{}", table_name, format.extension()))
    }

    /// Write a table's file, replacing any earlier upload under the same name
    pub fn save(
        &self,
        table_name: &str,
        format: StorageFormat,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        // A re-upload may switch formats; drop the stale file first.
        self.remove(table_name)?;

        let path = self.table_path(table_name, format);
        fs::write(&path, bytes)?;
        info!("Stored table '{}' at {:?} ({} bytes)", table_name, path, bytes.len());
        Ok(path)
    }

    /// Validate an upload and write it to the staging area under a name
    /// derived from `filename`. Nothing in the data directory changes until
    /// [`TableStore::commit`].
    pub fn stage(&self, filename: &str, bytes: &[u8]) -> Result<StoredTable, CoreError> {
        let upload = UploadFormat::from_filename(filename)?;
        let table_name = sanitize_table_name(filename)?;
        let contents = upload.normalize(bytes)?;
        let format = upload.storage_format();

        let staging = self.base_path.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let path = staging.join(format!("{}.{}", table_name, format.extension()));
        fs::write(&path, &contents)?;
        debug!("Staged '{}' at {:?} ({} bytes)", filename, path, contents.len());

        Ok(StoredTable {
            table_name,
            format,
            path,
        })
    }

    /// Move a staged upload into place, then drop files of other formats
    /// left by earlier uploads of the same table
    pub fn commit(&self, staged: &StoredTable) -> Result<StoredTable, CoreError> {
        let path = self.table_path(&staged.table_name, staged.format);
        fs::rename(&staged.path, &path)?;

        for format in [StorageFormat::Csv, StorageFormat::Json, StorageFormat::Parquet] {
            let stale = self.table_path(&staged.table_name, format);
            if format != staged.format && stale.exists() {
                fs::remove_file(&stale)?;
            }
        }

        info!("Stored table '{}' at {:?}", staged.table_name, path);
        Ok(StoredTable {
            table_name: staged.table_name.clone(),
            format: staged.format,
            path,
        })
    }

    /// Delete a staged upload that will not be committed
    pub fn discard(&self, staged: &StoredTable) {
        if let Err(e) = fs::remove_file(&staged.path) {
            warn!("Failed to remove staged upload {:?}: {}", staged.path, e);
        }
    }

    /// Delete every file backing `table_name`. Returns whether anything was removed.
    pub fn remove(&self, table_name: &str) -> Result<bool, CoreError> {
        let mut removed = false;
        for format in [StorageFormat::Csv, StorageFormat::Json, StorageFormat::Parquet] {
            let path = self.table_path(table_name, format);
            if path.exists() {
                fs::remove_file(&path)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// List the tables present on disk, sorted by name
    pub fn stored_tables(&self) -> Result<Vec<StoredTable>, CoreError> {
        let mut tables = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(StorageFormat::from_extension);
            let table_name = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);

            match (table_name, format) {
                (Some(table_name), Some(format)) => tables.push(StoredTable {
                    table_name,
                    format,
                    path,
                }),
                _ => warn!("Ignoring unrecognized file in data directory: {:?}", path),
            }
        }

        tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        Ok(tables)
    }
}
