//! Tabula AI - LLM integration for natural language queries
//!
//! This crate provides:
//! - Provider selection from the configured API keys (OpenAI first, then Anthropic)
//! - LLM API clients (OpenAI/Anthropic) behind the [`CompletionProvider`] trait
//! - Prompt building from table schemas (no data values)
//! - Question generation and natural language to SQL translation

pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod provider;

pub use client::{AnthropicClient, HttpProviderFactory, OpenAiClient};
pub use config::LlmCredentials;
pub use error::{AiError, ProviderError};
pub use generator::QueryGenerator;
pub use provider::{
    select_provider, CompletionProvider, CompletionRequest, ProviderFactory, ProviderKind,
    ProviderSelection,
};

// Re-export the schema types prompts are built from
pub use tabula_core::{ColumnMeta, SchemaDescription, TableSchema};
