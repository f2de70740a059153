//! Errors for question generation and SQL translation

use thiserror::Error;

use crate::provider::ProviderKind;

/// Failure of a single vendor API call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors surfaced to callers of [`crate::QueryGenerator`]
#[derive(Error, Debug)]
pub enum AiError {
    #[error("No tables available in database")]
    NoTablesAvailable,

    #[error("No LLM API key available. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NoProviderConfigured,

    #[error("Error generating query with {provider}: {source}")]
    ProviderCallFailed {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },

    #[error("Question is empty")]
    EmptyQuestion,

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: ProviderKind },
}

pub type Result<T> = std::result::Result<T, AiError>;
