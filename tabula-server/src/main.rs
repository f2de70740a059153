//! Tabula Server binary

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tabula_ai::{LlmCredentials, QueryGenerator};
use tabula_core::TableStore;
use tabula_server::{build_router, AppState, CredentialSource, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        "Loaded config: bind_addr={}, data_dir={}, max_upload_bytes={}",
        config.bind_addr, config.data_dir, config.max_upload_bytes
    );

    let credentials = LlmCredentials::from_env();
    if !credentials.has_openai() && !credentials.has_anthropic() {
        warn!("No LLM API key set. Natural language endpoints will return 503 until one is configured.");
    }

    let store = TableStore::new(&config.data_dir)?;
    let state = Arc::new(AppState::new(
        store,
        QueryGenerator::new(),
        CredentialSource::Environment,
    ));
    state.restore_tables().await?;

    let app = build_router(state, config.max_upload_bytes);

    info!("Starting Tabula server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
