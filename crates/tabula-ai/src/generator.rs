//! Question generation and SQL translation

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::HttpProviderFactory;
use crate::config::LlmCredentials;
use crate::error::{AiError, Result};
use crate::prompt::{
    build_question_prompt, build_sql_prompt, clean_sql_response, sanitize_generated_query,
    QUESTION_SYSTEM_PROMPT, SQL_SYSTEM_PROMPT,
};
use crate::provider::{
    select_provider, CompletionRequest, ProviderFactory, ProviderKind, ProviderSelection,
    QUESTION_MAX_TOKENS, QUESTION_TEMPERATURE, SQL_MAX_TOKENS, SQL_TEMPERATURE,
};
use crate::SchemaDescription;

/// Dispatches prompts to the vendor picked for each call
#[derive(Clone)]
pub struct QueryGenerator {
    factory: Arc<dyn ProviderFactory>,
}

impl QueryGenerator {
    /// Generator talking to the real vendor APIs
    pub fn new() -> Self {
        Self::with_factory(Arc::new(HttpProviderFactory::new()))
    }

    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        Self { factory }
    }

    /// Suggest one question a user might ask about the tables in `schema`
    pub async fn generate_natural_language_query(
        &self,
        schema: &SchemaDescription,
        credentials: &LlmCredentials,
    ) -> Result<String> {
        if schema.is_empty() {
            return Err(AiError::NoTablesAvailable);
        }
        let selection = select_provider(credentials, None)?;

        let request = CompletionRequest {
            model: selection.kind.question_model().to_string(),
            system: QUESTION_SYSTEM_PROMPT.to_string(),
            prompt: build_question_prompt(schema),
            temperature: QUESTION_TEMPERATURE,
            max_tokens: QUESTION_MAX_TOKENS,
        };

        let response = self.dispatch(&selection, &request).await?;
        let question = sanitize_generated_query(&response);
        if question.is_empty() {
            return Err(AiError::EmptyResponse {
                provider: selection.kind,
            });
        }

        info!("Generated question with {}", selection.kind);
        Ok(question)
    }

    /// Translate a natural-language question into a single SQL query
    pub async fn translate_to_sql(
        &self,
        question: &str,
        schema: &SchemaDescription,
        credentials: &LlmCredentials,
        preferred: Option<ProviderKind>,
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(AiError::EmptyQuestion);
        }
        if schema.is_empty() {
            return Err(AiError::NoTablesAvailable);
        }
        let selection = select_provider(credentials, preferred)?;

        let request = CompletionRequest {
            model: selection.kind.sql_model().to_string(),
            system: SQL_SYSTEM_PROMPT.to_string(),
            prompt: build_sql_prompt(question, schema),
            temperature: SQL_TEMPERATURE,
            max_tokens: SQL_MAX_TOKENS,
        };

        let response = self.dispatch(&selection, &request).await?;
        let sql = clean_sql_response(&response);
        if sql.is_empty() {
            return Err(AiError::EmptyResponse {
                provider: selection.kind,
            });
        }

        info!("Translated question to SQL with {}", selection.kind);
        Ok(sql)
    }

    async fn dispatch(
        &self,
        selection: &ProviderSelection,
        request: &CompletionRequest,
    ) -> Result<String> {
        info!("Using {} with model {}", selection.kind, request.model);
        let provider = self.factory.create(selection);

        provider.complete(request).await.map_err(|source| {
            warn!("{} call failed: {}", selection.kind, source);
            AiError::ProviderCallFailed {
                provider: selection.kind,
                source,
            }
        })
    }
}

impl Default for QueryGenerator {
    fn default() -> Self {
        Self::new()
    }
}
