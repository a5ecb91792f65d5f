//! Core domain concepts shared across all subdomains.
//!
//! - [`id`] - identifiers for agents, patterns, providers, sessions and messages
//! - [`error::DomainError`] - domain-level errors
//! - [`json`] - JSON objects embedded in model output
//! - [`string`] - UTF-8 safe truncation helpers

pub mod error;
pub mod id;
pub mod json;
pub mod string;
