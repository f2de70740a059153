//! LLM API clients (OpenAI / Anthropic)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::provider::{
    CompletionProvider, CompletionRequest, ProviderFactory, ProviderKind, ProviderSelection,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl OpenAiRequest {
    pub fn from_request(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageContent,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessageContent {
    content: Option<String>,
}

/// Client for the OpenAI chat completions API (or any compatible endpoint)
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = OpenAiRequest::from_request(request);

        debug!(
            "Calling OpenAI-compatible API at {} with model: {}",
            self.base_url, request.model
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let text = read_success_body(response).await?;
        let content = parse_openai_response(&text)?;

        info!("Received response from OpenAI");
        Ok(content)
    }
}

/// Pull the first choice's message text out of a chat completions body
pub fn parse_openai_response(body: &str) -> Result<String, ProviderError> {
    let response: OpenAiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse("No response from OpenAI".to_string()))
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

impl AnthropicRequest {
    pub fn from_request(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = AnthropicRequest::from_request(request);

        debug!("Calling Anthropic API with model: {}", request.model);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let text = read_success_body(response).await?;
        let content = parse_anthropic_response(&text)?;

        info!("Received response from Anthropic");
        Ok(content)
    }
}

/// Pull the first text block out of a messages API body
pub fn parse_anthropic_response(body: &str) -> Result<String, ProviderError> {
    let response: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    response
        .content
        .into_iter()
        .find_map(|c| c.text)
        .ok_or_else(|| ProviderError::MalformedResponse("No response from Anthropic".to_string()))
}

async fn read_success_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds real HTTP clients sharing one connection pool
#[derive(Debug, Clone, Default)]
pub struct HttpProviderFactory {
    client: reqwest::Client,
}

impl HttpProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, selection: &ProviderSelection) -> Box<dyn CompletionProvider> {
        match selection.kind {
            ProviderKind::OpenAI => Box::new(OpenAiClient::new(
                selection.api_key.clone(),
                selection.base_url.clone(),
                self.client.clone(),
            )),
            ProviderKind::Anthropic => Box::new(AnthropicClient::new(
                selection.api_key.clone(),
                selection.base_url.clone(),
                self.client.clone(),
            )),
        }
    }
}
