//! Query engine built on DataFusion

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::guard::ensure_read_only;
use crate::result::{batches_to_rows, rename_columns, unique_column_names, QueryResult, Row};
use crate::schema::{extract_schema, SchemaDescription, TableSchema};
use crate::store::TableStore;
use crate::upload::StorageFormat;

/// Largest preview a caller can ask for
pub const MAX_PREVIEW_ROWS: usize = 100;

/// A table known to the engine
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredTable {
    pub name: String,
    pub format: StorageFormat,
    pub path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

/// The query engine wrapping DataFusion's SessionContext
pub struct QueryEngine {
    ctx: SessionContext,
    tables: BTreeMap<String, RegisteredTable>,
}

impl QueryEngine {
    pub fn new() -> Self {
        info!("QueryEngine initialized");
        Self {
            ctx: SessionContext::new(),
            tables: BTreeMap::new(),
        }
    }

    /// Get a reference to the underlying SessionContext
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Register a stored file as a table, replacing an existing table of the same name.
    ///
    /// The file is read before anything is replaced, so a failed registration
    /// leaves the previous table in place.
    pub async fn register_file(
        &mut self,
        table_name: &str,
        path: &Path,
        format: StorageFormat,
    ) -> Result<(), CoreError> {
        let table = self.read_file(path, format).await.map_err(|e| {
            CoreError::InvalidUpload(format!(
                "failed to read '{}' as {:?}: {}",
                table_name, format, e
            ))
        })?;

        if self.tables.contains_key(table_name) {
            self.ctx.deregister_table(table_name)?;
            debug!("Replacing existing table '{}'", table_name);
        }
        self.ctx.register_table(table_name, table.into_view())?;

        self.tables.insert(
            table_name.to_string(),
            RegisteredTable {
                name: table_name.to_string(),
                format,
                path: path.to_path_buf(),
                registered_at: Utc::now(),
            },
        );
        info!("Registered {:?} table '{}' from {:?}", format, table_name, path);
        Ok(())
    }

    async fn read_file(&self, path: &Path, format: StorageFormat) -> Result<DataFrame, CoreError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| CoreError::Io(format!("non UTF-8 path: {:?}", path)))?;

        let df = match format {
            StorageFormat::Csv => self.ctx.read_csv(path_str, CsvReadOptions::new()).await?,
            StorageFormat::Json => {
                self.ctx
                    .read_json(path_str, NdJsonReadOptions::default())
                    .await?
            }
            StorageFormat::Parquet => {
                self.ctx
                    .read_parquet(path_str, ParquetReadOptions::default())
                    .await?
            }
        };
        Ok(df)
    }

    /// Store an uploaded file and register it, returning the table name.
    ///
    /// The upload is staged and read back before it replaces anything. If it
    /// cannot be read, the previous file and table stay as they were.
    pub async fn import_upload(
        &mut self,
        store: &TableStore,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, CoreError> {
        let staged = store.stage(filename, bytes)?;

        if let Err(e) = self.read_file(&staged.path, staged.format).await {
            store.discard(&staged);
            return Err(CoreError::InvalidUpload(format!(
                "failed to read '{}' as {:?}: {}",
                filename, staged.format, e
            )));
        }

        let stored = store.commit(&staged)?;
        self.register_file(&stored.table_name, &stored.path, stored.format)
            .await?;
        Ok(stored.table_name)
    }

    /// Register every table in `store`. Files that fail to load are skipped.
    pub async fn restore_from(&mut self, store: &TableStore) -> Result<usize, CoreError> {
        let mut restored = 0;
        for stored in store.stored_tables()? {
            match self
                .register_file(&stored.table_name, &stored.path, stored.format)
                .await
            {
                Ok(()) => restored += 1,
                Err(e) => warn!("Skipping stored table '{}': {}", stored.table_name, e),
            }
        }
        info!("Restored {} tables from {:?}", restored, store.base_path());
        Ok(restored)
    }

    /// Remove a table from the engine
    pub fn drop_table(&mut self, table_name: &str) -> Result<RegisteredTable, CoreError> {
        let table = self
            .tables
            .remove(table_name)
            .ok_or_else(|| CoreError::TableNotFound(table_name.to_string()))?;
        self.ctx.deregister_table(table_name)?;
        info!("Dropped table '{}'", table_name);
        Ok(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &RegisteredTable> {
        self.tables.values()
    }

    pub fn table(&self, table_name: &str) -> Option<&RegisteredTable> {
        self.tables.get(table_name)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Schema of one registered table
    pub async fn table_schema(&self, table_name: &str) -> Result<TableSchema, CoreError> {
        if !self.tables.contains_key(table_name) {
            return Err(CoreError::TableNotFound(table_name.to_string()));
        }
        extract_schema(&self.ctx, table_name).await
    }

    /// Summarize every registered table for prompt building
    pub async fn describe(&self) -> Result<SchemaDescription, CoreError> {
        let mut description = SchemaDescription::new();
        for name in self.tables.keys() {
            let schema = extract_schema(&self.ctx, name).await?;
            description.tables.insert(name.clone(), schema);
        }
        Ok(description)
    }

    /// Execute a read-only SQL statement
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, CoreError> {
        ensure_read_only(sql)?;

        let started = Instant::now();
        let options = SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false);

        let df = self.ctx.sql_with_options(sql, options).await?;
        // Joins can yield several columns with one name; rows are keyed by name.
        let columns = unique_column_names(df.schema().fields().iter().map(|f| f.name().as_str()));
        let batches = df
            .collect()
            .await?
            .iter()
            .map(|batch| rename_columns(batch, &columns))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = batches_to_rows(&batches)?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        debug!("Query returned {} rows in {} ms", rows.len(), execution_time_ms);

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms,
        })
    }

    /// First rows of a table, capped at [`MAX_PREVIEW_ROWS`]
    pub async fn preview(&self, table_name: &str, limit: usize) -> Result<Vec<Row>, CoreError> {
        if !self.tables.contains_key(table_name) {
            return Err(CoreError::TableNotFound(table_name.to_string()));
        }

        let limit = limit.min(MAX_PREVIEW_ROWS);
        let batches = self
            .ctx
            .table(table_name)
            .await?
            .limit(0, Some(limit))?
            .collect()
            .await?;
        batches_to_rows(&batches)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadFormat;
    use crate::TableStore;

    async fn engine_with(
        store: &TableStore,
        tables: &[(&str, UploadFormat, &str)],
    ) -> QueryEngine {
        let mut engine = QueryEngine::new();
        for (name, format, contents) in tables {
            let bytes = format.normalize(contents.as_bytes()).unwrap();
            let path = store.save(name, format.storage_format(), &bytes).unwrap();
            engine
                .register_file(name, &path, format.storage_format())
                .await
                .unwrap();
        }
        engine
    }

    const USERS_CSV: &str = "id,name,age\n1,Alice,31\n2,Bob,45\n3,Carol,28\n";
    const PRODUCTS_JSON: &str =
        r#"[{"id": 1, "name": "Widget", "price": 9.5}, {"id": 2, "name": "Gadget", "price": 20.0}]"#;

    #[tokio::test]
    async fn test_register_and_query_csv() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let engine = engine_with(&store, &[("users", UploadFormat::Csv, USERS_CSV)]).await;

        let result = engine
            .execute("SELECT name FROM users WHERE age > 30 ORDER BY name")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[0]["name"], serde_json::json!("Alice"));
        assert_eq!(result.rows[1]["name"], serde_json::json!("Bob"));
    }

    #[tokio::test]
    async fn test_register_and_query_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let engine =
            engine_with(&store, &[("products", UploadFormat::Json, PRODUCTS_JSON)]).await;

        let result = engine
            .execute("SELECT name FROM products WHERE price > 10")
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["name"], serde_json::json!("Gadget"));
    }

    #[tokio::test]
    async fn test_register_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let events = "{\"kind\": \"click\"}\n{\"kind\": \"view\"}\n{\"kind\": \"click\"}\n";
        let engine = engine_with(&store, &[("events", UploadFormat::JsonLines, events)]).await;

        let result = engine
            .execute("SELECT COUNT(*) AS clicks FROM events WHERE kind = 'click'")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["clicks"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_reupload_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut engine = engine_with(&store, &[("users", UploadFormat::Csv, USERS_CSV)]).await;

        let path = store
            .save("users", StorageFormat::Csv, b"id,name\n9,Zed\n")
            .unwrap();
        engine
            .register_file("users", &path, StorageFormat::Csv)
            .await
            .unwrap();

        assert_eq!(engine.table_count(), 1);
        let result = engine.execute("SELECT * FROM users").await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.columns, vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_write_statements_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let engine = engine_with(&store, &[("users", UploadFormat::Csv, USERS_CSV)]).await;

        let result = engine.execute("DROP TABLE users").await;
        assert!(matches!(result, Err(CoreError::ForbiddenStatement(_))));
        assert!(engine.execute("SELECT * FROM users").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_table_in_query() {
        let engine = QueryEngine::new();
        let result = engine.execute("SELECT * FROM missing").await;
        assert!(matches!(result, Err(CoreError::QueryFailed(_))));
    }

    #[tokio::test]
    async fn test_describe() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let engine = engine_with(
            &store,
            &[
                ("users", UploadFormat::Csv, USERS_CSV),
                ("products", UploadFormat::Json, PRODUCTS_JSON),
            ],
        )
        .await;

        let description = engine.describe().await.unwrap();
        assert_eq!(
            description.table_names().collect::<Vec<_>>(),
            vec!["products", "users"]
        );
        assert_eq!(description.tables["users"].row_count, 3);
        assert_eq!(description.tables["products"].row_count, 2);
        let price = description.tables["products"]
            .columns
            .iter()
            .find(|c| c.name == "price")
            .unwrap();
        assert_eq!(price.data_type, "REAL");
    }

    #[tokio::test]
    async fn test_describe_empty() {
        let engine = QueryEngine::new();
        assert!(engine.describe().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_caps_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut csv = String::from("n\n");
        for i in 0..150 {
            csv.push_str(&format!("{}\n", i));
        }
        let engine = engine_with(&store, &[("numbers", UploadFormat::Csv, csv.as_str())]).await;

        assert_eq!(engine.preview("numbers", 5).await.unwrap().len(), 5);
        assert_eq!(
            engine.preview("numbers", 1000).await.unwrap().len(),
            MAX_PREVIEW_ROWS
        );
        assert!(matches!(
            engine.preview("missing", 5).await,
            Err(CoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_drop_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut engine = engine_with(&store, &[("users", UploadFormat::Csv, USERS_CSV)]).await;

        let dropped = engine.drop_table("users").unwrap();
        assert_eq!(dropped.name, "users");
        assert_eq!(engine.table_count(), 0);
        assert!(engine.execute("SELECT * FROM users").await.is_err());
        assert!(matches!(
            engine.drop_table("users"),
            Err(CoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let path = store
            .save("broken", StorageFormat::Parquet, b"definitely not parquet")
            .unwrap();

        let mut engine = QueryEngine::new();
        let result = engine
            .register_file("broken", &path, StorageFormat::Parquet)
            .await;
        assert!(matches!(result, Err(CoreError::InvalidUpload(_))));
        assert!(engine.table("broken").is_none());
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut loader = QueryEngine::new();
        loader
            .import_upload(&store, "users.csv", USERS_CSV.as_bytes())
            .await
            .unwrap();
        loader
            .import_upload(&store, "products.json", PRODUCTS_JSON.as_bytes())
            .await
            .unwrap();
        store
            .save("broken", StorageFormat::Parquet, b"definitely not parquet")
            .unwrap();

        let mut engine = QueryEngine::new();
        let restored = engine.restore_from(&store).await.unwrap();

        assert_eq!(restored, 2);
        let names: Vec<&str> = engine.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["products", "users"]);
    }

    #[tokio::test]
    async fn test_rejected_reupload_keeps_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut engine = QueryEngine::new();
        engine
            .import_upload(&store, "users.csv", USERS_CSV.as_bytes())
            .await
            .unwrap();

        let result = engine
            .import_upload(&store, "users.parquet", b"definitely not parquet")
            .await;
        assert!(matches!(result, Err(CoreError::InvalidUpload(_))));

        let table = engine.table("users").unwrap();
        assert_eq!(table.format, StorageFormat::Csv);
        assert!(dir.path().join("users.csv").exists());
        assert!(!dir.path().join("users.parquet").exists());
        assert!(!dir.path().join(".staging").join("users.parquet").exists());

        let result = engine.execute("SELECT COUNT(*) AS n FROM users").await.unwrap();
        assert_eq!(result.rows[0]["n"], serde_json::json!(3));
    }

    #[tokio::test]
    async fn test_reupload_with_different_format_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let mut engine = QueryEngine::new();
        engine
            .import_upload(&store, "users.csv", USERS_CSV.as_bytes())
            .await
            .unwrap();

        let name = engine
            .import_upload(&store, "users.json", br#"[{"id": 9, "name": "Zed"}]"#)
            .await
            .unwrap();
        assert_eq!(name, "users");

        let result = engine.execute("SELECT name FROM users").await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["name"], serde_json::json!("Zed"));
        assert!(!dir.path().join("users.csv").exists());
    }

    #[tokio::test]
    async fn test_join_keeps_columns_with_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path()).unwrap();
        let engine = engine_with(
            &store,
            &[
                ("users", UploadFormat::Csv, USERS_CSV),
                ("orders", UploadFormat::Csv, "id,user_id,total\n77,1,12.5\n"),
            ],
        )
        .await;

        let result = engine
            .execute("SELECT u.id, o.id FROM users u JOIN orders o ON o.user_id = u.id")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id", "id_1"]);
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["id"], serde_json::json!(1));
        assert_eq!(result.rows[0]["id_1"], serde_json::json!(77));
    }
}
