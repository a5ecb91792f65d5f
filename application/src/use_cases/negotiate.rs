//! Negotiate use case.
//!
//! Runs propose → counter → vote rounds over a blocked gate until a proposal
//! wins a strict majority, a majority rejects, or the round cap escalates.
//! Proposals within a round are gathered concurrently, then ballots.

use crate::use_cases::provider_client::{ChatError, ProviderClient};
use async_trait::async_trait;
use conclave_domain::core::json::extract_json_object;
use conclave_domain::negotiation::MAX_ROUNDS;
use conclave_domain::prompt::NegotiationPromptTemplate;
use conclave_domain::{AgentDefinition, AgentId, Ballot, ChatMessage, ChatRequest, Negotiation};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces proposals and ballots on behalf of agents.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn propose(
        &self,
        agent: &AgentDefinition,
        topic: &str,
        round: usize,
        previous: &[(String, String)],
    ) -> Result<String, ChatError>;

    async fn vote(
        &self,
        agent: &AgentDefinition,
        topic: &str,
        round: usize,
        proposals: &[(String, String)],
    ) -> Result<Option<Ballot>, ChatError>;
}

/// Negotiator that asks each agent through the provider chain.
pub struct LlmNegotiator {
    client: Arc<ProviderClient>,
}

impl LlmNegotiator {
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }

    async fn ask(&self, agent: &AgentDefinition, prompt: String) -> Result<String, ChatError> {
        let system = if agent.persona.trim().is_empty() {
            format!("You are {}, acting as {}.", agent.id, agent.role)
        } else {
            agent.persona.clone()
        };
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_system_prompt(system)
            .with_model(agent.model.clone());
        Ok(self.client.chat(request).await?.text)
    }
}

#[async_trait]
impl Negotiator for LlmNegotiator {
    async fn propose(
        &self,
        agent: &AgentDefinition,
        topic: &str,
        round: usize,
        previous: &[(String, String)],
    ) -> Result<String, ChatError> {
        let prompt = NegotiationPromptTemplate::propose(topic, round, previous);
        Ok(self.ask(agent, prompt).await?.trim().to_string())
    }

    async fn vote(
        &self,
        agent: &AgentDefinition,
        topic: &str,
        round: usize,
        proposals: &[(String, String)],
    ) -> Result<Option<Ballot>, ChatError> {
        let prompt = NegotiationPromptTemplate::vote(topic, round, proposals);
        let reply = self.ask(agent, prompt).await?;
        let ballot = parse_ballot(&reply, proposals);
        if ballot.is_none() {
            warn!("Unreadable ballot from {}, counting as abstention", agent.id);
        }
        Ok(ballot)
    }
}

/// Read a ballot from a vote reply.
///
/// JSON `{"vote":"accept","proposal":id}` / `{"vote":"reject"}` first; then a
/// bare "reject", or a reply naming exactly one proposal author.
pub fn parse_ballot(reply: &str, proposals: &[(String, String)]) -> Option<Ballot> {
    if let Some(value) = extract_json_object(reply) {
        let vote = value
            .get("vote")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_lowercase());
        match vote.as_deref() {
            Some("reject") => return Some(Ballot::Reject),
            Some("accept") => {
                return value
                    .get("proposal")
                    .and_then(|v| v.as_str())
                    .map(|p| Ballot::Accept {
                        proposal: AgentId::from(p.trim()),
                    });
            }
            _ => {}
        }
    }

    let lower = reply.to_lowercase();
    let named: Vec<&String> = proposals
        .iter()
        .map(|(author, _)| author)
        .filter(|author| lower.contains(&author.to_lowercase()))
        .collect();
    if let [author] = named.as_slice() {
        return Some(Ballot::Accept {
            proposal: AgentId::from(author.as_str()),
        });
    }
    if lower.contains("reject") {
        return Some(Ballot::Reject);
    }
    None
}

/// Drives a [`Negotiation`] to its outcome.
pub struct NegotiationRunner {
    negotiator: Arc<dyn Negotiator>,
    max_rounds: usize,
}

impl NegotiationRunner {
    pub fn new(negotiator: Arc<dyn Negotiator>, max_rounds: usize) -> Self {
        Self {
            negotiator,
            max_rounds: max_rounds.clamp(1, MAX_ROUNDS),
        }
    }

    /// Negotiate `topic`. `proposers` are the disagreeing agents; `voters`
    /// are every participant of the blocked phase.
    ///
    /// Always returns a finished negotiation. A round where nobody could
    /// propose counts as no majority.
    pub async fn run(
        &self,
        topic: &str,
        proposers: &[AgentDefinition],
        voters: &[AgentDefinition],
    ) -> Negotiation {
        let mut negotiation = Negotiation::new(topic, self.max_rounds);
        info!(
            "Negotiating ({} proposers, {} voters): {}",
            proposers.len(),
            voters.len(),
            topic
        );

        while !negotiation.is_finished() {
            let round = match negotiation.open_round() {
                Ok(n) => n,
                Err(e) => {
                    warn!("Negotiation stopped: {}", e);
                    break;
                }
            };
            let previous = labelled(negotiation.previous_proposals());

            let proposals = join_all(proposers.iter().map(|agent| {
                self.negotiator
                    .propose(agent, topic, round, &previous)
            }))
            .await;
            for (agent, proposal) in proposers.iter().zip(proposals) {
                match proposal {
                    Ok(text) if !text.trim().is_empty() => {
                        record(negotiation.propose(agent.id.clone(), text));
                    }
                    Ok(_) => debug!("{} made no proposal in round {}", agent.id, round),
                    Err(e) => warn!("{} could not propose: {}", agent.id, e),
                }
            }

            let on_table = negotiation
                .rounds
                .last()
                .map(|r| {
                    r.proposals
                        .iter()
                        .map(|(a, p)| (a.to_string(), p.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            if !on_table.is_empty() {
                let ballots = join_all(
                    voters
                        .iter()
                        .map(|agent| self.negotiator.vote(agent, topic, round, &on_table)),
                )
                .await;
                for (agent, ballot) in voters.iter().zip(ballots) {
                    match ballot {
                        Ok(Some(ballot)) => record(negotiation.vote(agent.id.clone(), ballot)),
                        Ok(None) => {}
                        Err(e) => warn!("{} could not vote: {}", agent.id, e),
                    }
                }
            }

            match negotiation.close_round() {
                Ok(Some(outcome)) => info!("Negotiation {} in round {}", outcome, round),
                Ok(None) => debug!("Round {} had no majority, countering", round),
                Err(e) => {
                    warn!("Negotiation stopped: {}", e);
                    break;
                }
            }
        }

        negotiation
    }
}

fn labelled(proposals: Vec<(AgentId, String)>) -> Vec<(String, String)> {
    proposals
        .into_iter()
        .map(|(a, p)| (a.to_string(), p))
        .collect()
}

fn record(result: Result<(), conclave_domain::DomainError>) {
    if let Err(e) = result {
        warn!("Negotiation update rejected: {}", e);
    }
}
