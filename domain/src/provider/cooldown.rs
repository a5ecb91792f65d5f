//! Per-provider cooldown and circuit-breaker bookkeeping.
//!
//! Pure state: callers pass the current instant in, which keeps the table
//! deterministic under test. The application layer owns the single shared
//! instance behind a mutex.

use super::config::{CircuitPolicy, CooldownPolicy};
use crate::core::id::ProviderId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Whether a provider may be tried right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Half-open probe after the circuit's open window elapsed.
    Probe,
    CoolingDown { until: Instant },
    CircuitOpen { until: Instant },
}

impl Availability {
    pub fn is_usable(&self) -> bool {
        matches!(self, Availability::Ready | Availability::Probe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Circuit {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug, Clone)]
struct ProviderHealth {
    cooldown_until: Option<Instant>,
    failures: VecDeque<Instant>,
    circuit: Circuit,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            cooldown_until: None,
            failures: VecDeque::new(),
            circuit: Circuit::Closed,
        }
    }
}

/// Cooldown-until timestamps and circuit state for every provider.
#[derive(Debug, Clone, Default)]
pub struct CooldownTable {
    cooldown: CooldownPolicy,
    circuit: CircuitPolicy,
    entries: HashMap<ProviderId, ProviderHealth>,
}

impl CooldownTable {
    pub fn new(cooldown: CooldownPolicy, circuit: CircuitPolicy) -> Self {
        Self {
            cooldown,
            circuit,
            entries: HashMap::new(),
        }
    }

    /// Check a provider, moving an expired open circuit to half-open.
    pub fn availability(&mut self, id: &ProviderId, now: Instant) -> Availability {
        let Some(health) = self.entries.get_mut(id) else {
            return Availability::Ready;
        };

        if let Some(until) = health.cooldown_until {
            if until > now {
                return Availability::CoolingDown { until };
            }
            health.cooldown_until = None;
        }

        match health.circuit {
            Circuit::Open { until } if until > now => Availability::CircuitOpen { until },
            Circuit::Open { .. } | Circuit::HalfOpen => {
                health.circuit = Circuit::HalfOpen;
                Availability::Probe
            }
            Circuit::Closed => Availability::Ready,
        }
    }

    /// Put a provider into cooldown. Returns the applied window.
    pub fn record_rate_limit(
        &mut self,
        id: &ProviderId,
        hint: Option<Duration>,
        now: Instant,
    ) -> Duration {
        let window = self.cooldown.window(hint);
        let health = self.entries.entry(id.clone()).or_default();
        let until = now + window;
        health.cooldown_until = Some(health.cooldown_until.map_or(until, |u| u.max(until)));
        window
    }

    /// Count a failure. Returns `true` when this failure opened the circuit.
    pub fn record_failure(&mut self, id: &ProviderId, now: Instant) -> bool {
        let policy = self.circuit;
        let health = self.entries.entry(id.clone()).or_default();

        if health.circuit == Circuit::HalfOpen {
            health.circuit = Circuit::Open {
                until: now + policy.open_for,
            };
            return true;
        }

        health.failures.push_back(now);
        while health
            .failures
            .front()
            .is_some_and(|t| now.duration_since(*t) > policy.failure_window)
        {
            health.failures.pop_front();
        }

        if health.failures.len() >= policy.failure_threshold {
            health.failures.clear();
            health.circuit = Circuit::Open {
                until: now + policy.open_for,
            };
            return true;
        }
        false
    }

    pub fn record_success(&mut self, id: &ProviderId) {
        if let Some(health) = self.entries.get_mut(id) {
            health.failures.clear();
            health.circuit = Circuit::Closed;
        }
    }

    pub fn cooldown_until(&self, id: &ProviderId) -> Option<Instant> {
        self.entries.get(id).and_then(|h| h.cooldown_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CooldownTable {
        CooldownTable::new(CooldownPolicy::default(), CircuitPolicy::default())
    }

    #[test]
    fn test_rate_limit_window_and_expiry() {
        let mut t = table();
        let a = ProviderId::from("a");
        let now = Instant::now();

        assert_eq!(t.availability(&a, now), Availability::Ready);
        let window = t.record_rate_limit(&a, None, now);
        assert_eq!(window, Duration::from_secs(90));
        assert!(!t.availability(&a, now + Duration::from_secs(89)).is_usable());
        assert_eq!(
            t.availability(&a, now + Duration::from_secs(90)),
            Availability::Ready
        );
        assert!(t.cooldown_until(&a).is_none());
    }

    #[test]
    fn test_longer_cooldown_is_not_shortened() {
        let mut t = table();
        let a = ProviderId::from("a");
        let now = Instant::now();
        t.record_rate_limit(&a, Some(Duration::from_secs(90)), now);
        t.record_rate_limit(&a, Some(Duration::from_secs(10)), now);
        assert_eq!(t.cooldown_until(&a), Some(now + Duration::from_secs(90)));
    }

    #[test]
    fn test_circuit_opens_after_threshold_then_probes() {
        let mut t = table();
        let a = ProviderId::from("a");
        let now = Instant::now();

        for i in 0..4 {
            assert!(!t.record_failure(&a, now + Duration::from_secs(i)));
        }
        assert!(t.record_failure(&a, now + Duration::from_secs(4)));
        assert!(matches!(
            t.availability(&a, now + Duration::from_secs(10)),
            Availability::CircuitOpen { .. }
        ));

        let later = now + Duration::from_secs(4 + 120);
        assert_eq!(t.availability(&a, later), Availability::Probe);
        // failed probe reopens immediately
        assert!(t.record_failure(&a, later));
        assert!(!t.availability(&a, later).is_usable());
    }

    #[test]
    fn test_successful_probe_closes_circuit() {
        let mut t = table();
        let a = ProviderId::from("a");
        let now = Instant::now();
        for i in 0..5 {
            t.record_failure(&a, now + Duration::from_millis(i));
        }
        let later = now + Duration::from_secs(200);
        assert_eq!(t.availability(&a, later), Availability::Probe);
        t.record_success(&a);
        assert_eq!(t.availability(&a, later), Availability::Ready);
    }

    #[test]
    fn test_failures_outside_window_do_not_count() {
        let mut t = table();
        let a = ProviderId::from("a");
        let now = Instant::now();
        for i in 0..10 {
            assert!(!t.record_failure(&a, now + Duration::from_secs(i * 30)));
        }
    }
}
