//! Chat provider adapters
//!
//! Each adapter speaks one wire dialect over `reqwest` and normalizes the
//! answer into [`ChatResponse`](conclave_domain::ChatResponse). Fallback,
//! cooldowns and timeouts live in the application's provider client, not
//! here: an adapter makes exactly one HTTP call per `chat`.
//!
//! | Kind | Adapter | Endpoint |
//! |------|---------|----------|
//! | `openai` | [`OpenAiCompatibleProvider`] | `{base_url}/chat/completions` |
//! | `anthropic` | [`AnthropicProvider`] | `{base_url}/v1/messages` |

pub mod anthropic;
pub mod openai_compatible;

pub use anthropic::AnthropicProvider;
pub use openai_compatible::OpenAiCompatibleProvider;

use crate::config::{FileProviderConfig, ProviderKind};
use conclave_application::ports::chat_provider::{ChatProvider, ProviderError};
use conclave_domain::provider::strip_think_blocks;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors while constructing adapters from configuration.
#[derive(Error, Debug)]
pub enum ProviderBuildError {
    #[error("provider '{name}': environment variable {var} is not set")]
    MissingApiKey { name: String, var: String },

    #[error("provider '{name}': HTTP client setup failed: {source}")]
    Client {
        name: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Build the fallback chain, in configuration order.
pub fn build_providers(
    configs: &[FileProviderConfig],
) -> Result<Vec<Arc<dyn ChatProvider>>, ProviderBuildError> {
    configs
        .iter()
        .map(|config| {
            let provider: Arc<dyn ChatProvider> = match config.kind {
                ProviderKind::OpenAi => Arc::new(OpenAiCompatibleProvider::from_config(config)?),
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
            };
            debug!(
                "Provider '{}' ({:?}) at {}",
                config.name,
                config.kind,
                config.base_url()
            );
            Ok(provider)
        })
        .collect()
}

/// Read the API key named by the config. An empty variable name means the
/// endpoint needs no key.
fn api_key(config: &FileProviderConfig) -> Result<Option<String>, ProviderBuildError> {
    let var = config.api_key_env();
    if var.is_empty() {
        return Ok(None);
    }
    std::env::var(var)
        .map(Some)
        .map_err(|_| ProviderBuildError::MissingApiKey {
            name: config.name.clone(),
            var: var.to_string(),
        })
}

fn http_client(config: &FileProviderConfig) -> Result<reqwest::Client, ProviderBuildError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|source| ProviderBuildError::Client {
            name: config.name.clone(),
            source,
        })
}

/// `Retry-After` in seconds. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success status to a provider error.
fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited {
            retry_after: retry_after(headers),
        };
    }
    let message: String = body.chars().take(200).collect();
    ProviderError::Http {
        status: status.as_u16(),
        message,
    }
}

fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::Unavailable(e.to_string())
    } else {
        ProviderError::Http {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

/// Model text with reasoning blocks removed. When a reasoning block ate the
/// whole answer, its content is the best answer there is.
fn visible_text(raw: &str) -> String {
    let text = strip_think_blocks(raw);
    if !text.is_empty() {
        return text;
    }
    match (raw.find("<think>"), raw.find("</think>")) {
        (Some(start), Some(end)) if end > start => {
            raw[start + "<think>".len()..end].trim().to_string()
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("20"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(20)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_status_error() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(5))
            }
        );

        let long = "x".repeat(500);
        let ProviderError::Http { status, message } =
            status_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), &long)
        else {
            panic!("expected an HTTP error");
        };
        assert_eq!(status, 502);
        assert_eq!(message.len(), 200);
    }

    #[test]
    fn test_visible_text() {
        assert_eq!(visible_text("<think>plan</think>Answer"), "Answer");
        assert_eq!(visible_text("<think>only this</think>"), "only this");
        assert_eq!(visible_text("<think>cut off"), "cut off");
    }

    #[test]
    fn test_missing_api_key() {
        let config = FileProviderConfig {
            name: "p".to_string(),
            model: "m".to_string(),
            api_key_env: Some("CONCLAVE_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..FileProviderConfig::default()
        };
        let err = api_key(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "provider 'p': environment variable CONCLAVE_TEST_KEY_THAT_IS_NOT_SET is not set"
        );

        let keyless = FileProviderConfig {
            api_key_env: Some(String::new()),
            ..config
        };
        assert_eq!(api_key(&keyless).unwrap(), None);
    }
}
