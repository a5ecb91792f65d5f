//! Provider chain configuration from TOML (`[[providers]]` array)
//!
//! The order of the entries is the fallback order.
//!
//! ```toml
//! [[providers]]
//! name = "primary"
//! kind = "anthropic"
//! model = "claude-sonnet-4-5"
//!
//! [[providers]]
//! name = "local"
//! kind = "openai"
//! base_url = "http://localhost:11434/v1"
//! api_key_env = ""
//! model = "qwen3:32b"
//! max_tokens = 2048
//! ```

use serde::{Deserialize, Serialize};

/// Wire dialect of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` (OpenAI, Ollama, vLLM, OpenRouter...).
    #[default]
    #[serde(alias = "openai-compatible")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// One entry of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// Identity in logs and the cooldown table.
    pub name: String,
    pub kind: ProviderKind,
    /// Defaults per kind when unset.
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Empty means no key
    /// (local servers).
    pub api_key_env: Option<String>,
    pub model: String,
    /// Upper bound on completion tokens for this provider.
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: ProviderKind::default(),
            base_url: None,
            api_key_env: None,
            model: String::new(),
            max_tokens: 4_096,
            timeout_secs: 120,
        }
    }
}

impl FileProviderConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env())
    }
}

/// Cooldown and circuit-breaker tunables (`[provider_client]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderClientConfig {
    /// Cooldown when a rate-limited provider sent no retry hint.
    pub default_cooldown_secs: u64,
    /// Retry hints are clamped into `[min_cooldown_secs, max_cooldown_secs]`.
    pub min_cooldown_secs: u64,
    pub max_cooldown_secs: u64,
    /// Consecutive failures inside `failure_window_secs` that open the circuit.
    pub failure_threshold: usize,
    pub failure_window_secs: u64,
    pub circuit_open_secs: u64,
}

impl Default for FileProviderClientConfig {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 90,
            min_cooldown_secs: 10,
            max_cooldown_secs: 90,
            failure_threshold: 5,
            failure_window_secs: 60,
            circuit_open_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let anthropic = FileProviderConfig {
            kind: ProviderKind::Anthropic,
            ..FileProviderConfig::default()
        };
        assert_eq!(anthropic.base_url(), "https://api.anthropic.com");
        assert_eq!(anthropic.api_key_env(), "ANTHROPIC_API_KEY");

        let local = FileProviderConfig {
            base_url: Some("http://localhost:11434/v1".to_string()),
            api_key_env: Some(String::new()),
            ..FileProviderConfig::default()
        };
        assert_eq!(local.base_url(), "http://localhost:11434/v1");
        assert_eq!(local.api_key_env(), "");
    }

    #[test]
    fn test_kind_alias() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ProviderKind,
        }
        let w: Wrapper = toml::from_str(r#"kind = "openai-compatible""#).unwrap();
        assert_eq!(w.kind, ProviderKind::OpenAi);
    }
}
