//! Console output formatter for finished sessions

use colored::{ColoredString, Colorize};
use conclave_domain::{GateDecision, PhaseOutcome, PhaseStatus, Session, SessionStatus};

/// Formats sessions for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Every phase with every agent turn
    pub fn format(session: &Session) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(&format!("Session {}", session.id)));
        output.push('\n');
        output.push_str(&Self::overview(session));

        for outcome in &session.outcomes {
            output.push_str(&Self::section_header(&Self::phase_title(outcome)));
            for turn in &outcome.turns {
                let mut label = format!("── {} [{}] ──", turn.agent, turn.decision.as_str());
                if !turn.complete {
                    label.push_str(" (incomplete)");
                }
                let label = if turn.complete {
                    label.yellow().bold()
                } else {
                    label.red().bold()
                };
                output.push_str(&format!("\n{}\n{}\n", label, turn.output.trim_end()));
            }
            output.push_str(&Self::gate_line(outcome));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Status line plus one summary per phase
    pub fn format_summary(session: &Session) -> String {
        let mut output = String::new();
        output.push_str(&Self::overview(session));

        for outcome in &session.outcomes {
            output.push_str(&format!("\n{}\n", Self::phase_title(outcome).cyan().bold()));
            output.push_str(&Self::indent(outcome.summary.trim_end(), "  "));
            output.push('\n');
            output.push_str(&Self::gate_line(outcome));
        }
        output
    }

    /// Format as JSON
    pub fn format_json(session: &Session) -> String {
        serde_json::to_string_pretty(session).unwrap_or_else(|_| "{}".to_string())
    }

    fn overview(session: &Session) -> String {
        let mut output = format!(
            "{} {}\n{} {}\n{} {}\n",
            "Task:".cyan().bold(),
            session.task,
            "Pattern:".cyan().bold(),
            session.pattern_id,
            "Status:".cyan().bold(),
            Self::status(session.status)
        );
        if let Some(cause) = &session.cause {
            output.push_str(&format!("{} {}\n", "Cause:".cyan().bold(), cause));
        }
        output
    }

    fn phase_title(outcome: &PhaseOutcome) -> String {
        format!(
            "Phase {}: {} ({}, gate {}) {}",
            outcome.index + 1,
            outcome.phase_id,
            outcome.topology,
            outcome.gate,
            outcome.status.as_str()
        )
    }

    fn gate_line(outcome: &PhaseOutcome) -> String {
        let gate = match &outcome.gate_decision {
            GateDecision::Pass => "passed".green(),
            GateDecision::Blocked { reason } => format!("blocked: {}", reason).red(),
        };
        let mut line = format!("  {} {}", "gate".dimmed(), gate);
        if let Some(negotiation) = outcome.negotiation {
            line.push_str(&format!(", negotiation {}", negotiation.as_str()));
        }
        if outcome.status == PhaseStatus::Partial {
            line.push_str(&format!(
                " ({} incomplete turns)",
                outcome.incomplete_turns()
            ));
        }
        line.push('\n');
        line
    }

    fn status(status: SessionStatus) -> ColoredString {
        match status {
            SessionStatus::Completed => status.as_str().green().bold(),
            SessionStatus::Blocked => status.as_str().yellow().bold(),
            SessionStatus::Failed => status.as_str().red().bold(),
            _ => status.as_str().normal(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{
        AgentDefinition, Decision, DecisionSource, Gate, SessionCause, Topology, TurnRecord,
    };

    fn finished_session() -> Session {
        let mut session = Session::new(
            "review",
            "Add rate limiting",
            vec![AgentDefinition::new("dev", "developer", 50)],
        );
        session.start().unwrap();
        session.record_phase(PhaseOutcome {
            index: 0,
            phase_id: "design".to_string(),
            topology: Topology::Solo,
            gate: Gate::Always,
            turns: vec![TurnRecord {
                agent: "dev".into(),
                output: "Use a token bucket.".to_string(),
                decision: Decision::Inform,
                decision_source: DecisionSource::Default,
                complete: true,
                rounds: 1,
                attempts: 1,
            }],
            summary: "### dev\nUse a token bucket.".to_string(),
            gate_decision: GateDecision::Pass,
            negotiation: None,
            status: PhaseStatus::Passed,
            vetoes: Vec::new(),
        });
        session
            .fail(SessionCause::PhaseFailed {
                phase: "build".to_string(),
                detail: "every turn ended incomplete".to_string(),
            })
            .unwrap();
        session
    }

    #[test]
    fn test_summary_lists_phases_and_cause() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format_summary(&finished_session());

        assert!(text.contains("Task: Add rate limiting"));
        assert!(text.contains("Status: failed"));
        assert!(text.contains("Cause: "));
        assert!(text.contains("Phase 1: design (solo, gate always) passed"));
        assert!(text.contains("  ### dev\n  Use a token bucket."));
    }

    #[test]
    fn test_full_shows_turns() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format(&finished_session());
        assert!(text.contains("── dev [inform] ──\nUse a token bucket."));
    }

    #[test]
    fn test_json_round_trips_status() {
        let json = ConsoleFormatter::format_json(&finished_session());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["outcomes"][0]["phase_id"], "design");
    }
}
