//! Provider client: one logical chat call over an ordered fallback chain.
//!
//! ```text
//! chat(request)
//!   for provider in chain:
//!     cooling down / circuit open ──▶ skip
//!     Ok(response)                 ──▶ return
//!     RateLimited(hint)            ──▶ cooldown(hint or default), next
//!     other error / timeout        ──▶ count failure (circuit), next
//!   ──▶ Err(Exhausted { attempts })
//! ```
//!
//! The cooldown table is shared by every session using this client, so a
//! rate limit seen by one session is honored by all of them. Token usage
//! reported by the providers is summed per provider.

use crate::ports::chat_provider::{ChatProvider, ProviderError};
use conclave_domain::{
    Availability, ChatRequest, ChatResponse, CooldownTable, ProviderConfig, ProviderId,
    ProviderLimits, TokenUsage,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// What happened to one provider during a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    SkippedCoolingDown,
    SkippedCircuitOpen,
    RateLimited { cooldown: Duration },
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub outcome: AttemptOutcome,
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::SkippedCoolingDown => write!(f, "{}: cooling down", self.provider),
            AttemptOutcome::SkippedCircuitOpen => write!(f, "{}: circuit open", self.provider),
            AttemptOutcome::RateLimited { cooldown } => write!(
                f,
                "{}: rate limited, cooling down {}s",
                self.provider,
                cooldown.as_secs()
            ),
            AttemptOutcome::Failed(e) => write!(f, "{}: {}", self.provider, e),
            AttemptOutcome::TimedOut => write!(f, "{}: timed out", self.provider),
        }
    }
}

/// Errors surfaced by [`ProviderClient::chat`].
///
/// Rate limits on individual providers are absorbed by the fallback chain;
/// only exhaustion of the whole chain reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("All providers exhausted: {}", describe(.attempts))]
    Exhausted { attempts: Vec<ProviderAttempt> },
}

fn describe(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cooldown state shared between clients and sessions.
pub type SharedCooldownTable = Arc<Mutex<CooldownTable>>;

/// Multi-provider chat client with ordered fallback.
pub struct ProviderClient {
    providers: Vec<Arc<dyn ChatProvider>>,
    config: ProviderConfig,
    table: SharedCooldownTable,
    usage: Mutex<BTreeMap<ProviderId, TokenUsage>>,
}

impl ProviderClient {
    /// Providers are tried in the given order.
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, config: ProviderConfig) -> Self {
        let table = Arc::new(Mutex::new(CooldownTable::new(
            config.cooldown,
            config.circuit,
        )));
        Self {
            providers,
            config,
            table,
            usage: Mutex::new(BTreeMap::new()),
        }
    }

    /// Use an existing cooldown table instead of a private one.
    pub fn with_shared_table(mut self, table: SharedCooldownTable) -> Self {
        self.table = table;
        self
    }

    pub fn cooldown_table(&self) -> SharedCooldownTable {
        Arc::clone(&self.table)
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id().clone()).collect()
    }

    /// Tokens used so far, per provider that reported any.
    pub fn usage(&self) -> BTreeMap<ProviderId, TokenUsage> {
        self.lock_usage().clone()
    }

    pub fn total_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for usage in self.lock_usage().values() {
            total += *usage;
        }
        total
    }

    /// Perform one logical chat call.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            let id = provider.id();
            let availability = self.lock_table().availability(id, now());

            match availability {
                Availability::CoolingDown { .. } => {
                    debug!("Skipping provider {} (cooling down)", id);
                    attempts.push(attempt(id, AttemptOutcome::SkippedCoolingDown));
                    continue;
                }
                Availability::CircuitOpen { .. } => {
                    debug!("Skipping provider {} (circuit open)", id);
                    attempts.push(attempt(id, AttemptOutcome::SkippedCircuitOpen));
                    continue;
                }
                Availability::Probe => debug!("Probing provider {} after open circuit", id),
                Availability::Ready => {}
            }

            let limits = self
                .config
                .limits(id)
                .cloned()
                .unwrap_or_else(|| ProviderLimits::new(id.clone()));
            let mut call = request.clone();
            call.max_tokens = Some(
                call.max_tokens
                    .map_or(limits.max_tokens, |m| m.min(limits.max_tokens)),
            );

            debug!("Calling provider {} ({} messages)", id, call.messages.len());
            let result = tokio::time::timeout(limits.timeout, provider.chat(&call)).await;

            match result {
                Ok(Ok(mut response)) => {
                    self.lock_table().record_success(id);
                    if let Some(usage) = response.usage {
                        debug!(
                            "Provider {} used {} input / {} output tokens",
                            id, usage.input_tokens, usage.output_tokens
                        );
                        *self.lock_usage().entry(id.clone()).or_default() += usage;
                    }
                    response.provider = Some(id.clone());
                    return Ok(response);
                }
                Ok(Err(ProviderError::RateLimited { retry_after })) => {
                    let cooldown = self.lock_table().record_rate_limit(id, retry_after, now());
                    warn!(
                        "Provider {} rate limited, cooling down for {}s",
                        id,
                        cooldown.as_secs()
                    );
                    attempts.push(attempt(id, AttemptOutcome::RateLimited { cooldown }));
                }
                Ok(Err(e)) => {
                    warn!("Provider {} failed: {}", id, e);
                    self.record_failure(id);
                    attempts.push(attempt(id, AttemptOutcome::Failed(e.to_string())));
                }
                Err(_) => {
                    warn!(
                        "Provider {} timed out after {}s",
                        id,
                        limits.timeout.as_secs()
                    );
                    self.record_failure(id);
                    attempts.push(attempt(id, AttemptOutcome::TimedOut));
                }
            }
        }

        Err(ChatError::Exhausted { attempts })
    }

    fn record_failure(&self, id: &ProviderId) {
        if self.lock_table().record_failure(id, now()) {
            warn!("Circuit opened for provider {}", id);
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, CooldownTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_usage(&self) -> MutexGuard<'_, BTreeMap<ProviderId, TokenUsage>> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn attempt(id: &ProviderId, outcome: AttemptOutcome) -> ProviderAttempt {
    ProviderAttempt {
        provider: id.clone(),
        outcome,
    }
}

/// Current instant on the tokio clock, so paused-time tests control it.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
