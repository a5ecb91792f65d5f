//! Provider chain configuration.

use crate::core::id::ProviderId;
use std::time::Duration;

/// Limits applied to one provider in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLimits {
    pub id: ProviderId,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ProviderLimits {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            max_tokens: 4_096,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cooldown windows applied after a rate-limit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Window used when the provider sent no retry hint.
    pub default_window: Duration,
    pub min_hint: Duration,
    pub max_hint: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            default_window: Duration::from_secs(90),
            min_hint: Duration::from_secs(10),
            max_hint: Duration::from_secs(90),
        }
    }
}

impl CooldownPolicy {
    /// Window for a rate-limit signal with an optional retry hint.
    pub fn window(&self, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.clamp(self.min_hint, self.max_hint),
            None => self.default_window,
        }
    }
}

/// Circuit breaker thresholds for repeated non-rate-limit failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    pub failure_threshold: usize,
    pub failure_window: Duration,
    pub open_for: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            open_for: Duration::from_secs(120),
        }
    }
}

/// Ordered fallback chain plus the policies shared by all providers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderConfig {
    pub chain: Vec<ProviderLimits>,
    pub cooldown: CooldownPolicy,
    pub circuit: CircuitPolicy,
}

impl ProviderConfig {
    pub fn new(chain: Vec<ProviderLimits>) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    pub fn with_cooldown(mut self, cooldown: CooldownPolicy) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_circuit(mut self, circuit: CircuitPolicy) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn limits(&self, id: &ProviderId) -> Option<&ProviderLimits> {
        self.chain.iter().find(|l| &l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_is_clamped() {
        let policy = CooldownPolicy::default();
        assert_eq!(policy.window(None), Duration::from_secs(90));
        assert_eq!(policy.window(Some(Duration::from_secs(2))), Duration::from_secs(10));
        assert_eq!(policy.window(Some(Duration::from_secs(30))), Duration::from_secs(30));
        assert_eq!(policy.window(Some(Duration::from_secs(600))), Duration::from_secs(90));
    }

    #[test]
    fn test_limits_lookup() {
        let config = ProviderConfig::new(vec![
            ProviderLimits::new("a"),
            ProviderLimits::new("b").with_max_tokens(512),
        ]);
        assert_eq!(config.limits(&"b".into()).unwrap().max_tokens, 512);
        assert!(config.limits(&"c".into()).is_none());
    }
}
