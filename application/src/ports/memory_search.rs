//! Memory search port
//!
//! Project memory (notes, conventions, past decisions) injected into agent
//! prompts. Treated as a possibly slow read: callers wrap it in a timeout
//! and carry on without snippets on failure.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Memory search failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait MemorySearch: Send + Sync {
    async fn search(&self, scope: &str, query: &str) -> Result<Vec<String>, MemoryError>;
}

/// Memory that never has anything to say.
pub struct NoMemory;

#[async_trait]
impl MemorySearch for NoMemory {
    async fn search(&self, _scope: &str, _query: &str) -> Result<Vec<String>, MemoryError> {
        Ok(Vec::new())
    }
}
