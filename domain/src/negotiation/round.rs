//! Negotiation rounds: proposals, ballots and tallies.

use crate::core::id::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard cap on negotiation rounds, also the default.
pub const MAX_ROUNDS: usize = 3;

/// A voter's choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "vote", rename_all = "snake_case")]
pub enum Ballot {
    /// Accept the proposal authored by this agent.
    Accept { proposal: AgentId },
    /// Reject every proposal on the table.
    Reject,
}

/// Final result of a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationOutcome {
    Accepted,
    Rejected,
    Escalated,
}

impl NegotiationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationOutcome::Accepted => "accepted",
            NegotiationOutcome::Rejected => "rejected",
            NegotiationOutcome::Escalated => "escalated",
        }
    }
}

impl std::fmt::Display for NegotiationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tally of one round's ballots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundVerdict {
    /// More than half of the ballots accept this agent's proposal.
    Accepted(AgentId),
    /// More than half of the ballots reject.
    Rejected,
    /// Nothing reached a strict majority.
    NoMajority,
}

/// One propose→vote round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRound {
    /// 1-based round number.
    pub number: usize,
    pub proposals: BTreeMap<AgentId, String>,
    pub votes: BTreeMap<AgentId, Ballot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<NegotiationOutcome>,
}

impl NegotiationRound {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            proposals: BTreeMap::new(),
            votes: BTreeMap::new(),
            outcome: None,
        }
    }

    /// Majority is computed over ballots cast. Ballots for a proposal that is
    /// not on the table count as abstentions.
    pub fn tally(&self) -> RoundVerdict {
        let mut accepts: BTreeMap<&AgentId, usize> = BTreeMap::new();
        let mut rejects = 0usize;
        let mut cast = 0usize;

        for ballot in self.votes.values() {
            match ballot {
                Ballot::Accept { proposal } if self.proposals.contains_key(proposal) => {
                    *accepts.entry(proposal).or_default() += 1;
                    cast += 1;
                }
                Ballot::Accept { .. } => {}
                Ballot::Reject => {
                    rejects += 1;
                    cast += 1;
                }
            }
        }

        if cast == 0 {
            return RoundVerdict::NoMajority;
        }
        if let Some((author, _)) = accepts.iter().find(|(_, n)| **n * 2 > cast) {
            return RoundVerdict::Accepted((*author).clone());
        }
        if rejects * 2 > cast {
            return RoundVerdict::Rejected;
        }
        RoundVerdict::NoMajority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_with(proposals: &[&str], votes: &[(&str, Option<&str>)]) -> NegotiationRound {
        let mut round = NegotiationRound::new(1);
        for p in proposals {
            round.proposals.insert((*p).into(), format!("plan from {}", p));
        }
        for (voter, choice) in votes {
            let ballot = match choice {
                Some(p) => Ballot::Accept {
                    proposal: (*p).into(),
                },
                None => Ballot::Reject,
            };
            round.votes.insert((*voter).into(), ballot);
        }
        round
    }

    #[test]
    fn test_two_vs_one_accepts() {
        let round = round_with(
            &["a", "b"],
            &[("a", Some("a")), ("b", Some("b")), ("c", Some("a"))],
        );
        assert_eq!(round.tally(), RoundVerdict::Accepted("a".into()));
    }

    #[test]
    fn test_three_way_split_has_no_majority() {
        let round = round_with(
            &["a", "b", "c"],
            &[("a", Some("a")), ("b", Some("b")), ("c", Some("c"))],
        );
        assert_eq!(round.tally(), RoundVerdict::NoMajority);
    }

    #[test]
    fn test_majority_reject() {
        let round = round_with(&["a"], &[("a", Some("a")), ("b", None), ("c", None)]);
        assert_eq!(round.tally(), RoundVerdict::Rejected);
    }

    #[test]
    fn test_exact_half_is_not_majority() {
        let round = round_with(&["a"], &[("a", Some("a")), ("b", None)]);
        assert_eq!(round.tally(), RoundVerdict::NoMajority);
    }

    #[test]
    fn test_vote_for_unknown_proposal_abstains() {
        let round = round_with(&["a"], &[("a", Some("a")), ("b", Some("ghost"))]);
        assert_eq!(round.tally(), RoundVerdict::Accepted("a".into()));
    }
}
