//! Prompt templates for the exploration orchestrator.

/// Templates for the orchestrating call of each exploration iteration.
pub struct ExplorationPromptTemplate;

impl ExplorationPromptTemplate {
    pub fn system(max_queries: usize) -> String {
        format!(
            r#"You direct a search over a code workspace. You cannot read files yourself;
deterministic helpers run your queries and report back.

Each reply must be one JSON object, either:
{{"action": "explore", "queries": [
  {{"tool": "grep|read|structure|auto", "query": "what this finds out",
    "pattern": "regex for grep", "glob": "*.rs", "files": ["path for read"], "reason": "why"}}
]}}
with at most {max_queries} queries, or, once the findings answer the question:
{{"action": "final", "answer": "the answer, citing files"}}"#
        )
    }

    pub fn iteration(
        query: &str,
        iteration: usize,
        max_iterations: usize,
        findings: &str,
    ) -> String {
        let mut prompt = format!(
            "# Question\n{}\n\n# Iteration {} of {}\n",
            query, iteration, max_iterations
        );
        if findings.is_empty() {
            prompt.push_str("\nNo findings yet.\n");
        } else {
            prompt.push_str("\n# Findings so far\n");
            prompt.push_str(findings);
            prompt.push('\n');
        }
        if iteration >= max_iterations {
            prompt.push_str(
                "\nThis is the last iteration. Reply with {\"action\": \"final\", ...} now.\n",
            );
        } else if iteration + 1 == max_iterations {
            prompt.push_str(
                "\nOnly one more iteration remains after this one. Prefer concluding.\n",
            );
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_on_last_iterations() {
        let last = ExplorationPromptTemplate::iteration("q", 10, 10, "");
        assert!(last.contains("last iteration"));
        let penultimate = ExplorationPromptTemplate::iteration("q", 9, 10, "x");
        assert!(penultimate.contains("one more iteration"));
        let early = ExplorationPromptTemplate::iteration("q", 2, 10, "x");
        assert!(!early.contains("iteration remains"));
    }
}
