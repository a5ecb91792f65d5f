//! Chat provider port
//!
//! One adapter per backend. Adapters normalize their wire format into
//! [`ChatResponse`]; the [`ProviderClient`](crate::use_cases::provider_client::ProviderClient)
//! layers fallback and cooldown on top.

use async_trait::async_trait;
use conclave_domain::{ChatRequest, ChatResponse, ProviderId};
use std::time::Duration;
use thiserror::Error;

/// Errors a single provider call can produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider asked us to back off.
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Identity used in the fallback chain and the cooldown table.
    fn id(&self) -> &ProviderId;

    /// Perform one chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_display() {
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.to_string(), "Rate limited (retry after 30s)");
        assert!(err.is_rate_limited());
        assert_eq!(
            ProviderError::RateLimited { retry_after: None }.to_string(),
            "Rate limited"
        );
    }
}
