//! Deterministic exploration sub-agents.
//!
//! Each sub-query of the exploration loop is answered without any model
//! call: content grep, file reads, structure listings. Failures are rendered
//! into the returned text so the orchestrator can adapt.

use async_trait::async_trait;
use conclave_domain::SubQuery;

#[async_trait]
pub trait ExplorationBackend: Send + Sync {
    async fn run(&self, query: &SubQuery) -> String;
}
