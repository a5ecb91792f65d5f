//! Topology runners. Each turns a phase and its participants into a
//! [`PhaseRun`] by driving turns through the [`TurnDriver`].

use super::driver::{PhaseError, PhaseRun, TurnDriver, TurnOutcome};
use crate::config::EngineParams;
use conclave_domain::prompt::{AgentPromptTemplate, parse_subtasks};
use conclave_domain::session::compress_outputs;
use conclave_domain::{
    AgentDefinition, Message, Phase, VetoPolicy, VetoRecord, classify_vetoes, evaluate_gate,
};
use tracing::{debug, info};

/// Shared inputs of every topology runner.
pub(super) struct PhaseInput<'a> {
    pub phase: &'a Phase,
    pub participants: &'a [AgentDefinition],
    pub task: &'a str,
    pub prior_context: &'a str,
    pub params: &'a EngineParams,
    /// Vetoes raised in earlier phases of the session.
    pub earlier_vetoes: &'a [VetoRecord],
}

/// `earlier` extended with the vetoes of superseded rounds.
pub(super) fn veto_history(
    earlier: &[VetoRecord],
    superseded: &[Message],
    participants: &[AgentDefinition],
    policy: &VetoPolicy,
) -> Vec<VetoRecord> {
    let mut messages = superseded.to_vec();
    messages.sort_by_key(|m| m.sequence);
    let mut history = earlier.to_vec();
    history.extend(classify_vetoes(&messages, participants, policy, earlier));
    history
}

impl PhaseInput<'_> {
    pub(super) fn prompt(&self, extra: &str) -> String {
        AgentPromptTemplate::phase_task(self.task, self.phase, self.prior_context, extra)
    }

    fn compress(&self, outcomes: &[TurnOutcome]) -> String {
        let labelled: Vec<(String, String)> = outcomes.iter().map(TurnOutcome::labelled).collect();
        compress_outputs(
            &labelled,
            self.params.context_budget,
            self.params.compressed_output_size,
        )
    }

    fn first(&self) -> Result<&AgentDefinition, PhaseError> {
        self.participants.first().ok_or_else(|| {
            PhaseError::Failed(format!("phase '{}' has no participants", self.phase.id))
        })
    }
}

pub(super) async fn solo(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let agent = input.first()?;
    let outcome = driver.turn(agent, input.prompt("")).await?;
    let mut run = PhaseRun {
        summary: outcome.output().to_string(),
        ..PhaseRun::default()
    };
    run.push(outcome);
    Ok(run)
}

/// Ordered chain; each agent sees the previous agent's output.
pub(super) async fn sequential(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let outcomes = chain(input, driver, "").await?;
    let mut run = PhaseRun {
        summary: outcomes.last().map(|o| o.output().to_string()).unwrap_or_default(),
        ..PhaseRun::default()
    };
    for outcome in outcomes {
        run.push(outcome);
    }
    Ok(run)
}

async fn chain(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
    preamble: &str,
) -> Result<Vec<TurnOutcome>, PhaseError> {
    let mut outcomes: Vec<TurnOutcome> = Vec::with_capacity(input.participants.len());
    for agent in input.participants {
        let mut extra = preamble.to_string();
        if let Some(previous) = outcomes.last() {
            extra.push_str(&format!(
                "\n# Output of the previous step ({})\n\n{}\n",
                previous.record.agent,
                previous.output()
            ));
        }
        outcomes.push(driver.turn(agent, input.prompt(&extra)).await?);
    }
    Ok(outcomes)
}

pub(super) async fn parallel(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let prompt = input.prompt("");
    let jobs = input
        .participants
        .iter()
        .map(|a| (a.clone(), prompt.clone()))
        .collect();
    let outcomes = driver.parallel(jobs).await?;

    let mut run = PhaseRun {
        summary: input.compress(&outcomes),
        ..PhaseRun::default()
    };
    for outcome in outcomes {
        run.push(outcome);
    }
    Ok(run)
}

/// Repeat the chain until an iteration passes the phase gate or the
/// iteration cap is reached. The gate scope is the last iteration.
pub(super) async fn repeat(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let max = input.phase.options.max_iterations.max(1);
    let mut run = PhaseRun::default();

    for iteration in 1..=max {
        let preamble = if iteration == 1 {
            String::new()
        } else {
            format!(
                "# Iteration {} of {}\n\n\
                 The previous iteration did not pass the {} gate. Its result:\n\n{}\n",
                iteration, max, input.phase.gate, run.summary
            )
        };
        let outcomes = chain(input, driver, &preamble).await?;
        run.replace_round(&outcomes);
        run.summary = outcomes
            .last()
            .map(|o| o.output().to_string())
            .unwrap_or_default();

        let history = veto_history(
            input.earlier_vetoes,
            &run.superseded,
            input.participants,
            &input.params.veto_policy,
        );
        let decision = evaluate_gate(
            input.phase.gate,
            &run.messages,
            input.participants,
            &input.params.veto_policy,
            &history,
        );
        if decision.is_pass() {
            debug!("Loop phase '{}' passed at iteration {}", input.phase.id, iteration);
            break;
        }
        info!(
            "Loop phase '{}' iteration {} did not pass, {}",
            input.phase.id,
            iteration,
            if iteration < max { "repeating" } else { "giving up" }
        );
    }
    Ok(run)
}

/// Manager plans subtasks, workers run them in parallel, the manager
/// aggregates and QA agents review the aggregate.
pub(super) async fn hierarchical(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let Some(manager) = input.participants.iter().min_by_key(|a| a.rank) else {
        return Err(PhaseError::Failed(format!(
            "phase '{}' has no participants",
            input.phase.id
        )));
    };
    let others: Vec<&AgentDefinition> = input
        .participants
        .iter()
        .filter(|a| a.id != manager.id)
        .collect();
    let (qa, mut workers): (Vec<&AgentDefinition>, Vec<&AgentDefinition>) =
        others.into_iter().partition(|a| a.is_qa());
    if workers.is_empty() {
        // QA agents work when nobody else can.
        workers = qa.clone();
    }

    let mut run = PhaseRun::default();
    if workers.is_empty() {
        let outcome = driver.turn(manager, input.prompt("")).await?;
        run.summary = outcome.output().to_string();
        run.push(outcome);
        return Ok(run);
    }

    let plan = driver
        .turn(manager, input.prompt(&AgentPromptTemplate::manager_plan(&workers)))
        .await?;
    let subtasks = parse_subtasks(plan.output());
    debug!(
        "Manager {} planned {} subtasks for {} workers",
        manager.id,
        subtasks.len(),
        workers.len()
    );
    let manager_id = manager.id.to_string();
    let assignments = assign(&subtasks, workers.len(), plan.output());
    run.push(plan);

    let jobs = workers
        .iter()
        .zip(assignments)
        .filter(|(_, subtask)| !subtask.is_empty())
        .map(|(worker, subtask)| {
            let extra = AgentPromptTemplate::worker_subtask(&manager_id, &subtask);
            ((*worker).clone(), input.prompt(&extra))
        })
        .collect();
    let results = driver.parallel(jobs).await?;
    let labelled: Vec<(String, String)> = results.iter().map(TurnOutcome::labelled).collect();
    for outcome in results {
        run.push(outcome);
    }

    let aggregate = driver
        .turn(
            manager,
            input.prompt(&AgentPromptTemplate::manager_aggregate(&labelled)),
        )
        .await?;
    run.summary = aggregate.output().to_string();
    run.push(aggregate);

    let reviewers: Vec<&AgentDefinition> = qa
        .into_iter()
        .filter(|r| !workers.iter().any(|w| w.id == r.id))
        .collect();
    if !reviewers.is_empty() {
        let review = format!(
            "# Review\n\nReview this deliverable from {} and submit your decision.\n\n{}\n",
            manager_id, run.summary
        );
        let jobs = reviewers
            .iter()
            .map(|r| ((*r).clone(), input.prompt(&review)))
            .collect();
        for outcome in driver.parallel(jobs).await? {
            run.push(outcome);
        }
    }
    Ok(run)
}

/// Subtask `j` goes to worker `j % workers`. Without parsed subtasks every
/// worker gets the whole plan.
fn assign(subtasks: &[String], workers: usize, plan: &str) -> Vec<String> {
    if subtasks.is_empty() {
        return vec![plan.to_string(); workers];
    }
    let mut assigned = vec![Vec::new(); workers];
    for (j, subtask) in subtasks.iter().enumerate() {
        assigned[j % workers].push(subtask.as_str());
    }
    assigned.into_iter().map(|s| s.join("\n")).collect()
}

/// All-to-all exchange: every round runs in parallel and each agent sees
/// its peers' previous-round outputs.
pub(super) async fn network(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let rounds = input.phase.options.network_rounds.max(1);
    let mut run = PhaseRun::default();
    let mut previous: Vec<TurnOutcome> = Vec::new();

    for round in 1..=rounds {
        let jobs = input
            .participants
            .iter()
            .map(|agent| {
                let extra = if round == 1 {
                    String::new()
                } else {
                    let peers: Vec<(String, String)> = previous
                        .iter()
                        .filter(|o| o.record.agent != agent.id)
                        .map(TurnOutcome::labelled)
                        .collect();
                    AgentPromptTemplate::network_round(round, &peers)
                };
                (agent.clone(), input.prompt(&extra))
            })
            .collect();
        previous = driver.parallel(jobs).await?;
        run.replace_round(&previous);
    }
    run.summary = input.compress(&previous);
    Ok(run)
}

/// Opening statements, then rebuttal rounds, taken in turn.
pub(super) async fn debate(
    input: &PhaseInput<'_>,
    driver: &TurnDriver,
) -> Result<PhaseRun, PhaseError> {
    let rounds = input.phase.options.debate_rounds.max(1);
    let mut run = PhaseRun::default();
    let mut latest: Vec<TurnOutcome> = Vec::new();

    for round in 1..=rounds {
        let mut this_round: Vec<TurnOutcome> = Vec::new();
        for agent in input.participants {
            let extra = if round == 1 && this_round.is_empty() {
                String::new()
            } else {
                // Opponents' most recent statements, this round first.
                let mut opponents: Vec<(String, String)> = this_round
                    .iter()
                    .filter(|o| o.record.agent != agent.id)
                    .map(TurnOutcome::labelled)
                    .collect();
                opponents.extend(
                    latest
                        .iter()
                        .filter(|o| o.record.agent != agent.id)
                        .filter(|o| !this_round.iter().any(|t| t.record.agent == o.record.agent))
                        .map(TurnOutcome::labelled),
                );
                AgentPromptTemplate::rebuttal(&opponents)
            };
            this_round.push(driver.turn(agent, input.prompt(&extra)).await?);
        }
        run.replace_round(&this_round);
        latest = this_round;
    }
    run.summary = input.compress(&latest);
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_round_robin() {
        let subtasks: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(assign(&subtasks, 2, "plan"), vec!["a\nc", "b"]);
        assert_eq!(assign(&subtasks, 4, "plan"), vec!["a", "b", "c", ""]);
        assert_eq!(assign(&[], 2, "plan"), vec!["plan", "plan"]);
    }
}
