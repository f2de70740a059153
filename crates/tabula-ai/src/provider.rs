//! Provider abstraction and selection policy

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LlmCredentials;
use crate::error::{AiError, ProviderError};

/// Model and sampling settings for question generation
pub const QUESTION_TEMPERATURE: f64 = 0.8;
pub const QUESTION_MAX_TOKENS: u32 = 100;

/// Model and sampling settings for SQL translation
pub const SQL_TEMPERATURE: f64 = 0.1;
pub const SQL_MAX_TOKENS: u32 = 500;

/// The two supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
        }
    }

    /// Model used to suggest questions
    pub fn question_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4.1-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }

    /// Model used to translate questions into SQL
    pub fn sql_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4.1-2025-04-14",
            ProviderKind::Anthropic => "claude-sonnet-4-0",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Uniform "complete(prompt, params) -> text" capability of a vendor
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send the request and return the vendor's single text payload
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// The vendor chosen for one call, with what is needed to reach it
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSelection")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Builds the client for a selected vendor
pub trait ProviderFactory: Send + Sync {
    fn create(&self, selection: &ProviderSelection) -> Box<dyn CompletionProvider>;
}

/// Pick the vendor for a call.
///
/// Without a preference OpenAI wins whenever its key is present, then
/// Anthropic. A preference is honoured only when that vendor's key is
/// present; there is no fallback to the other vendor.
pub fn select_provider(
    credentials: &LlmCredentials,
    preferred: Option<ProviderKind>,
) -> Result<ProviderSelection, AiError> {
    let openai = || {
        credentials.openai_api_key.as_ref().map(|key| ProviderSelection {
            kind: ProviderKind::OpenAI,
            api_key: key.clone(),
            base_url: credentials.openai_base_url.clone(),
        })
    };
    let anthropic = || {
        credentials.anthropic_api_key.as_ref().map(|key| ProviderSelection {
            kind: ProviderKind::Anthropic,
            api_key: key.clone(),
            base_url: credentials.anthropic_base_url.clone(),
        })
    };

    let selection = match preferred {
        Some(ProviderKind::OpenAI) => openai(),
        Some(ProviderKind::Anthropic) => anthropic(),
        None => openai().or_else(anthropic),
    };

    selection.ok_or(AiError::NoProviderConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(openai: Option<&str>, anthropic: Option<&str>) -> LlmCredentials {
        LlmCredentials::new(openai.map(String::from), anthropic.map(String::from))
    }

    #[test]
    fn test_openai_wins_when_both_present() {
        let selection = select_provider(&credentials(Some("o"), Some("a")), None).unwrap();
        assert_eq!(selection.kind, ProviderKind::OpenAI);
        assert_eq!(selection.api_key, "o");
    }

    #[test]
    fn test_anthropic_when_only_anthropic() {
        let selection = select_provider(&credentials(None, Some("a")), None).unwrap();
        assert_eq!(selection.kind, ProviderKind::Anthropic);
        assert_eq!(selection.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_no_keys() {
        let result = select_provider(&credentials(None, None), None);
        assert!(matches!(result, Err(AiError::NoProviderConfigured)));
    }

    #[test]
    fn test_preferred_provider() {
        let both = credentials(Some("o"), Some("a"));
        let selection = select_provider(&both, Some(ProviderKind::Anthropic)).unwrap();
        assert_eq!(selection.kind, ProviderKind::Anthropic);
    }

    #[test]
    fn test_preferred_provider_without_key_does_not_fall_back() {
        let only_openai = credentials(Some("o"), None);
        let result = select_provider(&only_openai, Some(ProviderKind::Anthropic));
        assert!(matches!(result, Err(AiError::NoProviderConfigured)));
    }

    #[test]
    fn test_models() {
        assert_eq!(ProviderKind::OpenAI.question_model(), "gpt-4.1-mini");
        assert_eq!(
            ProviderKind::Anthropic.question_model(),
            "claude-3-haiku-20240307"
        );
        assert_eq!(ProviderKind::OpenAI.to_string(), "OpenAI");
    }

    #[test]
    fn test_provider_kind_serde() {
        let kind: ProviderKind = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(kind, ProviderKind::Anthropic);
        assert_eq!(
            serde_json::to_string(&ProviderKind::OpenAI).unwrap(),
            "\"openai\""
        );
    }

    #[test]
    fn test_selection_debug_hides_key() {
        let selection = select_provider(&credentials(Some("sk-secret"), None), None).unwrap();
        assert!(!format!("{:?}", selection).contains("sk-secret"));
    }
}
