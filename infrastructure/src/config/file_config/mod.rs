//! Raw TOML configuration data types
//!
//! These structs mirror the TOML file exactly. They are deserialized with
//! `#[serde(default)]` everywhere, validated once, then converted into the
//! application and domain types the engine runs on.

mod engine;
mod logging;
mod providers;

pub use engine::{FileBusConfig, FileEngineConfig, FileExplorationConfig};
pub use logging::{FileLoggingConfig, FileMemoryConfig, FileToolsConfig};
pub use providers::{FileProviderClientConfig, FileProviderConfig, ProviderKind};

use conclave_application::config::{BusConfig, EngineParams, ExecutorParams, ExplorationParams};
use conclave_domain::exploration::{MAX_ITERATIONS, MAX_QUERIES};
use conclave_domain::negotiation::MAX_ROUNDS;
use conclave_domain::{CircuitPolicy, CooldownPolicy, ProviderConfig, ProviderLimits, VetoPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("provider #{index} has no name")]
    UnnamedProvider { index: usize },

    #[error("provider '{0}' is listed twice")]
    DuplicateProvider(String),

    #[error("provider '{0}': model name cannot be empty")]
    EmptyModelName(String),

    #[error("provider '{0}': timeout_secs cannot be 0")]
    InvalidTimeout(String),

    #[error("provider '{0}': max_tokens cannot be 0")]
    InvalidMaxTokens(String),

    #[error("{0} must be at least 1")]
    ZeroBound(&'static str),

    #[error("{field} cannot exceed {max}")]
    AboveCap { field: &'static str, max: usize },

    #[error("provider_client: min_cooldown_secs exceeds max_cooldown_secs")]
    InvalidCooldownRange,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Fallback chain, tried in order
    pub providers: Vec<FileProviderConfig>,
    /// Cooldown and circuit breaker
    pub provider_client: FileProviderClientConfig,
    /// Pattern engine and turn executor
    pub engine: FileEngineConfig,
    /// Exploration sub-loop bounds
    pub exploration: FileExplorationConfig,
    /// Message bus capacities
    pub bus: FileBusConfig,
    /// Event log and diagnostics
    pub logging: FileLoggingConfig,
    /// Project memory
    pub memory: FileMemoryConfig,
    /// Workspace tools
    pub tools: FileToolsConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    ///
    /// An empty provider list is valid here: commands that never call a
    /// model (such as `validate`) run without one.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut seen = HashSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            let name = provider.name.trim();
            if name.is_empty() {
                return Err(ConfigValidationError::UnnamedProvider { index });
            }
            if !seen.insert(name) {
                return Err(ConfigValidationError::DuplicateProvider(name.to_string()));
            }
            if provider.model.trim().is_empty() {
                return Err(ConfigValidationError::EmptyModelName(name.to_string()));
            }
            if provider.timeout_secs == 0 {
                return Err(ConfigValidationError::InvalidTimeout(name.to_string()));
            }
            if provider.max_tokens == 0 {
                return Err(ConfigValidationError::InvalidMaxTokens(name.to_string()));
            }
        }

        let bounds = [
            ("engine.max_tool_rounds", self.engine.max_tool_rounds),
            ("engine.negotiation_rounds", self.engine.negotiation_rounds),
            ("exploration.max_iterations", self.exploration.max_iterations),
            ("exploration.max_queries", self.exploration.max_queries),
            ("bus.session_capacity", self.bus.session_capacity),
            ("bus.global_capacity", self.bus.global_capacity),
        ];
        if let Some((field, _)) = bounds.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigValidationError::ZeroBound(field));
        }

        let caps = [
            ("engine.negotiation_rounds", self.engine.negotiation_rounds, MAX_ROUNDS),
            ("exploration.max_iterations", self.exploration.max_iterations, MAX_ITERATIONS),
            ("exploration.max_queries", self.exploration.max_queries, MAX_QUERIES),
        ];
        if let Some(&(field, _, max)) = caps.iter().find(|(_, value, max)| value > max) {
            return Err(ConfigValidationError::AboveCap { field, max });
        }

        if self.provider_client.min_cooldown_secs > self.provider_client.max_cooldown_secs {
            return Err(ConfigValidationError::InvalidCooldownRange);
        }
        Ok(())
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        let chain = self
            .providers
            .iter()
            .map(|p| {
                ProviderLimits::new(p.name.trim())
                    .with_max_tokens(p.max_tokens)
                    .with_timeout(Duration::from_secs(p.timeout_secs))
            })
            .collect();
        let client = &self.provider_client;
        ProviderConfig::new(chain)
            .with_cooldown(CooldownPolicy {
                default_window: Duration::from_secs(client.default_cooldown_secs),
                min_hint: Duration::from_secs(client.min_cooldown_secs),
                max_hint: Duration::from_secs(client.max_cooldown_secs),
            })
            .with_circuit(CircuitPolicy {
                failure_threshold: client.failure_threshold.max(1),
                failure_window: Duration::from_secs(client.failure_window_secs),
                open_for: Duration::from_secs(client.circuit_open_secs),
            })
    }

    pub fn to_engine_params(&self) -> EngineParams {
        let engine = &self.engine;
        EngineParams {
            turn_retry_budget: engine.turn_retry_budget,
            negotiate_on_block: engine.negotiate_on_block,
            negotiation_rounds: engine.negotiation_rounds.clamp(1, MAX_ROUNDS),
            marker_fallback: engine.marker_fallback,
            context_budget: engine.context_budget,
            compressed_output_size: engine.compressed_output_size,
            veto_policy: VetoPolicy {
                cooldown: chrono::Duration::seconds(engine.veto_cooldown_secs.max(0)),
                allow_override: engine.allow_veto_override,
            },
        }
    }

    pub fn to_executor_params(&self) -> ExecutorParams {
        let mut params = ExecutorParams::default()
            .with_max_tool_rounds(self.engine.max_tool_rounds)
            .with_memory_timeout(Duration::from_secs(self.engine.memory_timeout_secs))
            .with_memory_scope(self.memory.default_scope.clone());
        params.memory_snippets = self.memory.max_snippets;
        params
    }

    pub fn to_exploration_params(&self) -> ExplorationParams {
        ExplorationParams {
            max_iterations: self.exploration.max_iterations.clamp(1, MAX_ITERATIONS),
            max_queries: self.exploration.max_queries.clamp(1, MAX_QUERIES),
            findings_cap: self.exploration.findings_cap,
        }
    }

    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            session_capacity: self.bus.session_capacity,
            dead_letter_cap: self.bus.dead_letter_cap,
            global_capacity: self.bus.global_capacity,
        }
    }
}
