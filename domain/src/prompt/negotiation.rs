//! Prompt templates for negotiation rounds.

/// Templates for proposal and ballot calls.
pub struct NegotiationPromptTemplate;

impl NegotiationPromptTemplate {
    pub fn propose(topic: &str, round: usize, previous: &[(String, String)]) -> String {
        let mut prompt = format!(
            "# Negotiation round {}\n\nThe team is blocked on:\n{}\n\n",
            round, topic
        );
        if previous.is_empty() {
            prompt.push_str("Propose one concrete resolution that addresses the objection.\n");
        } else {
            prompt.push_str("No proposal won a majority last round:\n");
            for (agent, proposal) in previous {
                prompt.push_str(&format!("\n## {}\n{}\n", agent, proposal));
            }
            prompt.push_str("\nWrite a counter-proposal that could win a majority.\n");
        }
        prompt.push_str("Reply with the proposal text only.");
        prompt
    }

    pub fn vote(topic: &str, round: usize, proposals: &[(String, String)]) -> String {
        let mut prompt = format!(
            "# Negotiation vote, round {}\n\nBlocked on:\n{}\n\nProposals:\n",
            round, topic
        );
        for (agent, proposal) in proposals {
            prompt.push_str(&format!("\n## proposal by {}\n{}\n", agent, proposal));
        }
        prompt.push_str(
            "\nVote for exactly one proposal or reject them all. Reply with JSON only:\n\
             {\"vote\": \"accept\", \"proposal\": \"<author id>\"} or {\"vote\": \"reject\"}",
        );
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_proposal_prompt_lists_previous() {
        let prompt = NegotiationPromptTemplate::propose(
            "schema",
            2,
            &[("a".to_string(), "keep".to_string())],
        );
        assert!(prompt.contains("counter-proposal"));
        assert!(prompt.contains("## a\nkeep"));
    }
}
