//! Tabula Server - REST API for natural language queries over uploaded tables

pub mod api;
pub mod config;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tabula_ai::{LlmCredentials, QueryGenerator};
use tabula_core::{CoreError, QueryEngine, TableStore};

pub use config::ServerConfig;

/// Where request handlers get LLM credentials from
pub enum CredentialSource {
    /// Re-read the environment on every request
    Environment,
    /// A fixed set of credentials
    Fixed(LlmCredentials),
}

impl CredentialSource {
    pub fn load(&self) -> LlmCredentials {
        match self {
            CredentialSource::Environment => LlmCredentials::from_env(),
            CredentialSource::Fixed(credentials) => credentials.clone(),
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub engine: RwLock<QueryEngine>,
    pub store: TableStore,
    pub generator: QueryGenerator,
    pub credentials: CredentialSource,
}

impl AppState {
    pub fn new(store: TableStore, generator: QueryGenerator, credentials: CredentialSource) -> Self {
        Self {
            engine: RwLock::new(QueryEngine::new()),
            store,
            generator,
            credentials,
        }
    }

    /// Register every table found in the data directory
    pub async fn restore_tables(&self) -> Result<usize, CoreError> {
        let mut engine = self.engine.write().await;
        engine.restore_from(&self.store).await
    }
}

/// Build the API router
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/api/health", get(api::health_status))
        .route("/api/upload", post(api::upload_table))
        .route("/api/schema", get(api::get_schema))
        .route("/api/tables/:name", delete(api::delete_table))
        .route("/api/tables/:name/preview", get(api::preview_table))
        .route("/api/query", post(api::natural_language_query))
        .route("/api/sql", post(api::execute_sql))
        .route("/api/generate-random-query", post(api::generate_random_query))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
