//! Prompt templates for agent turns.

use crate::agent::AgentDefinition;
use crate::pattern::Phase;

/// Templates for the system and task prompts of one agent turn.
pub struct AgentPromptTemplate;

impl AgentPromptTemplate {
    /// System prompt: persona, role, rights and the decision protocol.
    pub fn system(agent: &AgentDefinition, memory: &[String]) -> String {
        let mut prompt = String::new();
        if agent.persona.trim().is_empty() {
            prompt.push_str(&format!(
                "You are {}, acting as {} on a team of collaborating agents.\n",
                agent.id, agent.role
            ));
        } else {
            prompt.push_str(agent.persona.trim());
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "\nRole: {} (rank {}, lower is more senior)\n",
            agent.role, agent.rank
        ));
        if agent.can_veto() {
            prompt.push_str(&format!(
                "You hold {} veto rights. Veto only for concrete, blocking problems.\n",
                agent.veto_level
            ));
        }

        prompt.push_str(
            r#"
## Decision protocol

Before your final answer, call `submit_decision` exactly once with:
- `decision`: "approve", "veto", "negotiate" or "inform"
- `reason`: a short justification
Use "inform" when you are contributing work rather than judging it.
Then reply with your final answer as plain text, without further tool calls.
"#,
        );

        if !memory.is_empty() {
            prompt.push_str("\n## Project memory\n\n");
            for snippet in memory {
                prompt.push_str("- ");
                prompt.push_str(snippet.trim());
                prompt.push('\n');
            }
        }
        prompt
    }

    /// Task prompt for one phase turn.
    pub fn phase_task(task: &str, phase: &Phase, prior_context: &str, extra: &str) -> String {
        let mut prompt = format!("# Task\n\n{}\n", task);
        prompt.push_str(&format!(
            "\n# Phase: {} ({})\n",
            phase.id, phase.topology
        ));
        if !phase.instruction.trim().is_empty() {
            prompt.push_str(&format!("\n{}\n", phase.instruction.trim()));
        }
        if !prior_context.trim().is_empty() {
            prompt.push_str("\n# Context from previous work\n\n");
            prompt.push_str(prior_context);
            prompt.push('\n');
        }
        if !extra.trim().is_empty() {
            prompt.push('\n');
            prompt.push_str(extra.trim());
            prompt.push('\n');
        }
        prompt
    }

    /// Instruction for a debate rebuttal turn.
    pub fn rebuttal(opponent_outputs: &[(String, String)]) -> String {
        let mut prompt = String::from(
            "# Rebuttal\n\nAddress the strongest points made by the other participants. \
             State where you agree, where you disagree and why, then give your revised position.\n",
        );
        for (agent, output) in opponent_outputs {
            prompt.push_str(&format!("\n## {} said\n{}\n", agent, output));
        }
        prompt
    }

    /// Instruction for a network exchange round.
    pub fn network_round(round: usize, peer_outputs: &[(String, String)]) -> String {
        let mut prompt = format!(
            "# Exchange round {}\n\nRefine your contribution using what your peers wrote.\n",
            round
        );
        for (agent, output) in peer_outputs {
            prompt.push_str(&format!("\n## {}\n{}\n", agent, output));
        }
        prompt
    }

    /// Instruction for the manager of a hierarchical phase.
    pub fn manager_plan(workers: &[&AgentDefinition]) -> String {
        let roster = workers
            .iter()
            .map(|w| format!("- {} ({})", w.id, w.role))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            r#"# Delegation

You manage this phase. Split the work into subtasks for your team:
{roster}

Write one line per subtask in the form:
[SUBTASK 1] description of the first subtask
[SUBTASK 2] description of the second subtask
Subtasks are assigned to team members in order."#
        )
    }

    /// Instruction for a worker in a hierarchical phase.
    pub fn worker_subtask(manager: &str, subtask: &str) -> String {
        format!(
            "# Assigned subtask\n\n{} assigned you this subtask:\n{}\n\n\
             Complete it and report the result.",
            manager, subtask
        )
    }

    /// Follow-up for a participant whose approval an `all_approved` gate
    /// still needs.
    pub fn approval_request(turn: usize, budget: usize, deliverable: &str) -> String {
        format!(
            "# Approval needed (turn {} of {})\n\n\
             This phase cannot pass without your verdict. Review the result below, \
             then call `submit_decision` with \"approve\" or \"veto\".\n\n{}\n",
            turn, budget, deliverable
        )
    }

    /// Instruction for the manager aggregating worker results.
    pub fn manager_aggregate(results: &[(String, String)]) -> String {
        let mut prompt = String::from(
            "# Aggregate\n\nCombine the results of your team into one coherent deliverable.\n",
        );
        for (agent, output) in results {
            prompt.push_str(&format!("\n## From {}\n{}\n", agent, output));
        }
        prompt
    }
}

/// Parse `[SUBTASK n] description` lines from a manager's plan.
pub fn parse_subtasks(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("[SUBTASK")?;
            let close = rest.find(']')?;
            let number = rest[..close].trim();
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let description = rest[close + 1..].trim();
            (!description.is_empty()).then(|| description.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::VetoLevel;
    use crate::pattern::Topology;

    #[test]
    fn test_system_prompt_mentions_rights_and_memory() {
        let agent = AgentDefinition::new("sec", "security", 30)
            .with_veto_level(VetoLevel::Absolute)
            .with_persona("You are a paranoid security reviewer.");
        let prompt = AgentPromptTemplate::system(&agent, &["Never log secrets".to_string()]);
        assert!(prompt.starts_with("You are a paranoid security reviewer."));
        assert!(prompt.contains("absolute veto rights"));
        assert!(prompt.contains("submit_decision"));
        assert!(prompt.contains("- Never log secrets"));
    }

    #[test]
    fn test_phase_task_includes_context() {
        let phase = Phase::new("design", Topology::Solo).with_instruction("Draft the API.");
        let prompt = AgentPromptTemplate::phase_task("Build a cache", &phase, "earlier notes", "");
        assert!(prompt.contains("# Phase: design (solo)"));
        assert!(prompt.contains("Draft the API."));
        assert!(prompt.contains("earlier notes"));
    }

    #[test]
    fn test_approval_request() {
        let prompt = AgentPromptTemplate::approval_request(2, 3, "the limiter design");
        assert!(prompt.starts_with("# Approval needed (turn 2 of 3)"));
        assert!(prompt.contains("\"approve\" or \"veto\""));
        assert!(prompt.ends_with("the limiter design\n"));
    }

    #[test]
    fn test_parse_subtasks() {
        let plan = "Plan:\n[SUBTASK 1] write the parser\n  [SUBTASK 2]   add tests \n\
                    [SUBTASK x] bad\n[SUBTASK 3]";
        assert_eq!(parse_subtasks(plan), vec!["write the parser", "add tests"]);
    }
}
