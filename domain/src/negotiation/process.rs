//! Negotiation state machine: propose → counter → vote, capped in rounds.

use super::round::{Ballot, MAX_ROUNDS, NegotiationOutcome, NegotiationRound, RoundVerdict};
use crate::core::error::DomainError;
use crate::core::id::AgentId;
use serde::{Deserialize, Serialize};

/// One negotiation over a blocked gate.
///
/// Each round opens, collects one proposal per disagreeing agent (from round
/// two onwards these are counter-proposals), then one ballot per voter.
/// Closing a round without a majority allows the next one until `max_rounds`;
/// reaching the cap without a majority resolves to
/// [`NegotiationOutcome::Escalated`].
///
/// # Example
///
/// ```
/// use conclave_domain::negotiation::{Ballot, Negotiation, NegotiationOutcome};
///
/// let mut n = Negotiation::new("schema change", 3);
/// n.open_round().unwrap();
/// n.propose("a".into(), "keep v1").unwrap();
/// n.propose("b".into(), "migrate to v2").unwrap();
/// n.vote("a".into(), Ballot::Accept { proposal: "b".into() }).unwrap();
/// n.vote("b".into(), Ballot::Accept { proposal: "b".into() }).unwrap();
/// n.vote("c".into(), Ballot::Accept { proposal: "a".into() }).unwrap();
///
/// assert_eq!(n.close_round().unwrap(), Some(NegotiationOutcome::Accepted));
/// assert_eq!(n.resolution.as_deref(), Some("migrate to v2"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub topic: String,
    pub max_rounds: usize,
    pub rounds: Vec<NegotiationRound>,
    pub outcome: Option<NegotiationOutcome>,
    /// Text of the accepted proposal.
    pub resolution: Option<String>,
    round_open: bool,
}

impl Negotiation {
    pub fn new(topic: impl Into<String>, max_rounds: usize) -> Self {
        Self {
            topic: topic.into(),
            max_rounds: max_rounds.clamp(1, MAX_ROUNDS),
            rounds: Vec::new(),
            outcome: None,
            resolution: None,
            round_open: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Proposals of the last closed round, used as context for counters.
    pub fn previous_proposals(&self) -> Vec<(AgentId, String)> {
        let closed = if self.round_open {
            self.rounds.len().checked_sub(2)
        } else {
            self.rounds.len().checked_sub(1)
        };
        closed
            .and_then(|idx| self.rounds.get(idx))
            .map(|r| {
                r.proposals
                    .iter()
                    .map(|(a, p)| (a.clone(), p.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Open the next round. Returns its 1-based number.
    pub fn open_round(&mut self) -> Result<usize, DomainError> {
        self.ensure_active()?;
        if self.round_open {
            return Err(invalid("previous negotiation round still open"));
        }
        if self.rounds.len() >= self.max_rounds {
            return Err(invalid("negotiation round cap reached"));
        }
        let number = self.rounds.len() + 1;
        self.rounds.push(NegotiationRound::new(number));
        self.round_open = true;
        Ok(number)
    }

    pub fn propose(
        &mut self,
        agent: AgentId,
        proposal: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.open_round_mut()?
            .proposals
            .insert(agent, proposal.into());
        Ok(())
    }

    pub fn vote(&mut self, agent: AgentId, ballot: Ballot) -> Result<(), DomainError> {
        self.open_round_mut()?.votes.insert(agent, ballot);
        Ok(())
    }

    /// Tally the open round.
    ///
    /// Returns the final outcome when the negotiation finished, `None` when
    /// another round is needed.
    pub fn close_round(&mut self) -> Result<Option<NegotiationOutcome>, DomainError> {
        let max_rounds = self.max_rounds;
        let round = self.open_round_mut()?;
        let is_last = round.number >= max_rounds;

        let (outcome, resolution) = match round.tally() {
            RoundVerdict::Accepted(author) => (
                Some(NegotiationOutcome::Accepted),
                round.proposals.get(&author).cloned(),
            ),
            RoundVerdict::Rejected => (Some(NegotiationOutcome::Rejected), None),
            RoundVerdict::NoMajority if is_last => (Some(NegotiationOutcome::Escalated), None),
            RoundVerdict::NoMajority => (None, None),
        };

        round.outcome = outcome;
        self.round_open = false;
        if let Some(outcome) = outcome {
            self.outcome = Some(outcome);
            self.resolution = resolution;
        }
        Ok(outcome)
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_finished() {
            return Err(invalid("negotiation already finished"));
        }
        Ok(())
    }

    fn open_round_mut(&mut self) -> Result<&mut NegotiationRound, DomainError> {
        self.ensure_active()?;
        if !self.round_open {
            return Err(invalid("no open negotiation round"));
        }
        self.rounds
            .last_mut()
            .ok_or_else(|| invalid("no open negotiation round"))
    }
}

fn invalid(message: &str) -> DomainError {
    DomainError::InvalidDefinition(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_round(n: &mut Negotiation) -> Option<NegotiationOutcome> {
        n.open_round().unwrap();
        for agent in ["a", "b", "c"] {
            n.propose(agent.into(), format!("{} way", agent)).unwrap();
        }
        for agent in ["a", "b", "c"] {
            n.vote(
                agent.into(),
                Ballot::Accept {
                    proposal: agent.into(),
                },
            )
            .unwrap();
        }
        n.close_round().unwrap()
    }

    #[test]
    fn test_persistent_split_escalates_at_cap() {
        let mut n = Negotiation::new("split", 3);
        assert_eq!(split_round(&mut n), None);
        assert_eq!(split_round(&mut n), None);
        assert_eq!(split_round(&mut n), Some(NegotiationOutcome::Escalated));
        assert_eq!(n.rounds.len(), 3);
        assert!(n.is_finished());
        assert!(n.open_round().is_err());
    }

    #[test]
    fn test_rejected_in_first_round() {
        let mut n = Negotiation::new("t", 3);
        n.open_round().unwrap();
        n.propose("a".into(), "x").unwrap();
        n.vote("a".into(), Ballot::Accept { proposal: "a".into() })
            .unwrap();
        n.vote("b".into(), Ballot::Reject).unwrap();
        n.vote("c".into(), Ballot::Reject).unwrap();
        assert_eq!(n.close_round().unwrap(), Some(NegotiationOutcome::Rejected));
        assert!(n.resolution.is_none());
    }

    #[test]
    fn test_previous_proposals_visible_for_counters() {
        let mut n = Negotiation::new("t", 3);
        split_round(&mut n);
        n.open_round().unwrap();
        let prev = n.previous_proposals();
        assert_eq!(prev.len(), 3);
        assert_eq!(prev[0].1, "a way");
    }

    #[test]
    fn test_cannot_vote_without_open_round() {
        let mut n = Negotiation::new("t", 3);
        assert!(n.vote("a".into(), Ballot::Reject).is_err());
        n.open_round().unwrap();
        assert!(n.open_round().is_err());
    }

    #[test]
    fn test_zero_cap_is_clamped_to_one() {
        let n = Negotiation::new("t", 0);
        assert_eq!(n.max_rounds, 1);
        let n = Negotiation::new("t", 10);
        assert_eq!(n.max_rounds, MAX_ROUNDS);
    }
}
