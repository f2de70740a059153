//! Request handlers

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use tabula_ai::{AiError, ProviderKind};
use tabula_core::result::Row;
use tabula_core::{ColumnMeta, CoreError, QueryResult, StorageFormat};

use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Rows returned alongside a fresh upload
const UPLOAD_SAMPLE_ROWS: usize = 5;

fn core_error(e: CoreError) -> (StatusCode, String) {
    let status = match &e {
        CoreError::TableNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InvalidTableName(_)
        | CoreError::UnsupportedFormat(_)
        | CoreError::InvalidUpload(_)
        | CoreError::InvalidSql(_)
        | CoreError::ForbiddenStatement(_) => StatusCode::BAD_REQUEST,
        CoreError::QueryFailed(_) | CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn ai_error(e: AiError) -> (StatusCode, String) {
    let status = match &e {
        AiError::NoTablesAvailable | AiError::EmptyQuestion => StatusCode::BAD_REQUEST,
        AiError::NoProviderConfigured => StatusCode::SERVICE_UNAVAILABLE,
        AiError::ProviderCallFailed { .. } | AiError::EmptyResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, e.to_string())
}

// === Health ===

pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Serialize, Deserialize)]
pub struct ProvidersStatus {
    pub openai: bool,
    pub anthropic: bool,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub tables: usize,
    pub providers: ProvidersStatus,
}

// GET /api/health
pub async fn health_status(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let credentials = state.credentials.load();
    let tables = state.engine.read().await.table_count();

    Json(HealthResponse {
        status: "ok".to_string(),
        tables,
        providers: ProvidersStatus {
            openai: credentials.has_openai(),
            anthropic: credentials.has_anthropic(),
        },
    })
}

// === Tables ===

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    pub table_name: String,
    pub columns: Vec<ColumnMeta>,
    pub row_count: u64,
    pub sample_data: Vec<Row>,
}

// POST /api/upload (multipart, field "file")
pub async fn upload_table(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or((StatusCode::BAD_REQUEST, "Uploaded file has no name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) =
        upload.ok_or((StatusCode::BAD_REQUEST, "Missing 'file' field".to_string()))?;

    // Files only change under the write lock.
    let mut engine = state.engine.write().await;
    let table_name = engine
        .import_upload(&state.store, &filename, &bytes)
        .await
        .map_err(core_error)?;

    let schema = engine.table_schema(&table_name).await.map_err(core_error)?;
    let sample_data = engine
        .preview(&table_name, UPLOAD_SAMPLE_ROWS)
        .await
        .map_err(core_error)?;

    info!(
        "Uploaded '{}' as table '{}' ({} rows)",
        filename, table_name, schema.row_count
    );

    Ok(Json(UploadResponse {
        table_name,
        columns: schema.columns,
        row_count: schema.row_count,
        sample_data,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub format: StorageFormat,
    pub columns: Vec<ColumnMeta>,
    pub row_count: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct SchemaResponse {
    pub tables: Vec<TableInfo>,
    pub total_tables: usize,
}

// GET /api/schema
pub async fn get_schema(State(state): State<Arc<AppState>>) -> ApiResult<SchemaResponse> {
    let engine = state.engine.read().await;
    let description = engine.describe().await.map_err(core_error)?;

    let tables: Vec<TableInfo> = engine
        .tables()
        .filter_map(|table| {
            let schema = description.tables.get(&table.name)?;
            Some(TableInfo {
                name: table.name.clone(),
                format: table.format,
                columns: schema.columns.clone(),
                row_count: schema.row_count,
                uploaded_at: table.registered_at,
            })
        })
        .collect();

    Ok(Json(SchemaResponse {
        total_tables: tables.len(),
        tables,
    }))
}

#[derive(Deserialize)]
pub struct PreviewParams {
    limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct PreviewResponse {
    pub table_name: String,
    pub rows: Vec<Row>,
}

// GET /api/tables/:name/preview?limit=10
pub async fn preview_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<PreviewParams>,
) -> ApiResult<PreviewResponse> {
    let limit = params.limit.unwrap_or(10);
    let engine = state.engine.read().await;
    let rows = engine.preview(&name, limit).await.map_err(core_error)?;

    Ok(Json(PreviewResponse {
        table_name: name,
        rows,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct DeleteTableResponse {
    pub success: bool,
    pub message: String,
}

// DELETE /api/tables/:name
pub async fn delete_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<DeleteTableResponse> {
    let mut engine = state.engine.write().await;
    if engine.table(&name).is_none() {
        return Err(core_error(CoreError::TableNotFound(name)));
    }
    // Remove the file before the registration; a failed removal keeps the table.
    state.store.remove(&name).map_err(core_error)?;
    engine.drop_table(&name).map_err(core_error)?;

    Ok(Json(DeleteTableResponse {
        success: true,
        message: format!("Table '{}' deleted", name),
    }))
}

// === Queries ===

#[derive(Deserialize)]
pub struct NaturalLanguageQueryRequest {
    pub query: String,
    #[serde(default)]
    pub provider: Option<ProviderKind>,
}

#[derive(Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: Option<String>,
    pub sql: String,
    pub columns: Vec<String>,
    pub results: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    fn new(query: Option<String>, sql: String, result: QueryResult) -> Self {
        Self {
            query,
            sql,
            columns: result.columns,
            results: result.rows,
            row_count: result.row_count,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

// POST /api/query
pub async fn natural_language_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NaturalLanguageQueryRequest>,
) -> ApiResult<QueryResponse> {
    // Release the engine while the LLM call is in flight.
    let schema = {
        let engine = state.engine.read().await;
        engine.describe().await.map_err(core_error)?
    };

    let credentials = state.credentials.load();
    let sql = state
        .generator
        .translate_to_sql(&req.query, &schema, &credentials, req.provider)
        .await
        .map_err(ai_error)?;

    info!("Translated '{}' to: {}", req.query, sql);

    let engine = state.engine.read().await;
    let result = engine.execute(&sql).await.map_err(core_error)?;

    Ok(Json(QueryResponse::new(Some(req.query), sql, result)))
}

#[derive(Deserialize)]
pub struct SqlRequest {
    pub sql: String,
}

// POST /api/sql
pub async fn execute_sql(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SqlRequest>,
) -> ApiResult<QueryResponse> {
    let engine = state.engine.read().await;
    let result = engine.execute(&req.sql).await.map_err(core_error)?;

    Ok(Json(QueryResponse::new(None, req.sql, result)))
}

#[derive(Serialize, Deserialize)]
pub struct RandomQueryResponse {
    pub query: String,
}

// POST /api/generate-random-query
pub async fn generate_random_query(
    State(state): State<Arc<AppState>>,
) -> ApiResult<RandomQueryResponse> {
    let schema = {
        let engine = state.engine.read().await;
        engine.describe().await.map_err(core_error)?
    };

    let credentials = state.credentials.load();
    let query = state
        .generator
        .generate_natural_language_query(&schema, &credentials)
        .await
        .map_err(ai_error)?;

    Ok(Json(RandomQueryResponse { query }))
}
