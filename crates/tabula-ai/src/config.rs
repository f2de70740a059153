//! LLM credentials from environment variables.

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const ANTHROPIC_API_BASE: &str = "ANTHROPIC_API_BASE";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API keys and endpoints for the two supported vendors.
///
/// Built per call (see [`LlmCredentials::from_env`]) and handed to the
/// generator, so a key exported while the server runs is picked up on the
/// next request.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmCredentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
}

impl LlmCredentials {
    pub fn new(openai_api_key: Option<String>, anthropic_api_key: Option<String>) -> Self {
        Self {
            openai_api_key: non_blank(openai_api_key),
            anthropic_api_key: non_blank(anthropic_api_key),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        }
    }

    /// No keys at all
    pub fn none() -> Self {
        Self::new(None, None)
    }

    pub fn from_env() -> Self {
        let mut credentials = Self::new(
            std::env::var(OPENAI_API_KEY).ok(),
            std::env::var(ANTHROPIC_API_KEY).ok(),
        );
        if let Some(base) = non_blank(std::env::var(OPENAI_API_BASE).ok()) {
            credentials.openai_base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = non_blank(std::env::var(ANTHROPIC_API_BASE).ok()) {
            credentials.anthropic_base_url = base.trim_end_matches('/').to_string();
        }
        credentials
    }

    pub fn has_openai(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn has_anthropic(&self) -> bool {
        self.anthropic_api_key.is_some()
    }
}

// Keys never show up in logs.
impl std::fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCredentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid races.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [OPENAI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_BASE, ANTHROPIC_API_BASE] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn from_env_with_both_keys() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var(OPENAI_API_KEY, "openai-key");
            std::env::set_var(ANTHROPIC_API_KEY, "anthropic-key");
        }

        let credentials = LlmCredentials::from_env();
        assert_eq!(credentials.openai_api_key.as_deref(), Some("openai-key"));
        assert_eq!(credentials.anthropic_api_key.as_deref(), Some("anthropic-key"));
        assert_eq!(credentials.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(credentials.anthropic_base_url, DEFAULT_ANTHROPIC_BASE_URL);

        clear_env();
    }

    #[test]
    fn from_env_no_keys() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let credentials = LlmCredentials::from_env();
        assert!(!credentials.has_openai());
        assert!(!credentials.has_anthropic());

        clear_env();
    }

    #[test]
    fn from_env_blank_key_counts_as_absent() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var(OPENAI_API_KEY, "   ");
            std::env::set_var(ANTHROPIC_API_KEY, "anthropic-key");
        }

        let credentials = LlmCredentials::from_env();
        assert!(!credentials.has_openai());
        assert!(credentials.has_anthropic());

        clear_env();
    }

    #[test]
    fn from_env_custom_base_urls() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var(OPENAI_API_BASE, "http://localhost:11434/");
            std::env::set_var(ANTHROPIC_API_BASE, "http://proxy.internal");
        }

        let credentials = LlmCredentials::from_env();
        assert_eq!(credentials.openai_base_url, "http://localhost:11434");
        assert_eq!(credentials.anthropic_base_url, "http://proxy.internal");

        clear_env();
    }

    #[test]
    fn debug_redacts_keys() {
        let credentials = LlmCredentials::new(Some("sk-secret".to_string()), None);
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("sk-secret"));
    }
}
