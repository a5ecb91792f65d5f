//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// These cover invalid definitions and illegal state changes. Runtime
/// failures of collaborators (providers, tools) live in the application layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Pattern '{0}' has no phases")]
    EmptyPattern(String),

    #[error("Phase '{0}' selects no participants")]
    NoParticipants(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_display() {
        let error = DomainError::InvalidTransition {
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid session transition: completed -> running"
        );
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::EmptyPattern("p".to_string()).is_cancelled());
    }
}
