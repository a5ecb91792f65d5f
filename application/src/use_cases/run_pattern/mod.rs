//! Run Pattern use case.
//!
//! Drives a [`Session`] through the phases of a [`PatternDef`]:
//!
//! ```text
//! pending ──▶ running ──┬──▶ completed   every gate passed
//!                       ├──▶ blocked     gate blocked, negotiation did not accept
//!                       └──▶ failed      providers exhausted, cancelled, invalid
//! ```
//!
//! Each phase runs its topology through a [`TurnDriver`], publishes one
//! message per turn on the bus, then evaluates the phase gate. Veto holders
//! an `all_approved` gate is still waiting on get further turns up to the
//! phase's turn budget. A blocked gate starts a negotiation among the
//! disagreeing agents unless the block comes from an absolute veto.

mod driver;
mod topology;

pub use driver::{
    CustomPhaseHandler, PhaseError, PhaseRequest, PhaseRun, TurnDriver, TurnOutcome,
};

use crate::bus::MessageBus;
use crate::config::EngineParams;
use crate::ports::agent_registry::{AgentRegistry, RegistryError};
use crate::ports::event_recorder::{EventRecorder, NoEventRecorder, event_types};
use crate::ports::live_events::{LiveEventPublisher, NoLiveEvents};
use crate::use_cases::execute_turn::TurnRunner;
use crate::use_cases::negotiate::{NegotiationRunner, Negotiator};
use conclave_domain::core::string::truncate;
use conclave_domain::prompt::AgentPromptTemplate;
use conclave_domain::session::compress_outputs;
use conclave_domain::{
    AgentDefinition, AgentId, BlockReason, DomainError, GateDecision, Message,
    NegotiationOutcome, PatternDef, Phase, PhaseOutcome, PhaseStatus, Session, SessionCause,
    Topology, VetoLevel, VetoRecord, classify_vetoes, evaluate_gate,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use topology::PhaseInput;
use tracing::{info, warn};

/// Errors raised before a session can start.
#[derive(Error, Debug)]
pub enum RunPatternError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// The pattern execution state machine.
pub struct PatternEngine {
    runner: Arc<dyn TurnRunner>,
    bus: Arc<MessageBus>,
    recorder: Arc<dyn EventRecorder>,
    live: Arc<dyn LiveEventPublisher>,
    negotiator: Option<Arc<dyn Negotiator>>,
    handlers: HashMap<String, Arc<dyn CustomPhaseHandler>>,
    params: EngineParams,
}

impl PatternEngine {
    pub fn new(runner: Arc<dyn TurnRunner>, bus: Arc<MessageBus>) -> Self {
        Self {
            runner,
            bus,
            recorder: Arc::new(NoEventRecorder),
            live: Arc::new(NoLiveEvents),
            negotiator: None,
            handlers: HashMap::new(),
            params: EngineParams::default(),
        }
    }

    pub fn with_event_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_live_events(mut self, live: Arc<dyn LiveEventPublisher>) -> Self {
        self.live = live;
        self
    }

    pub fn with_negotiator(mut self, negotiator: Arc<dyn Negotiator>) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    /// Register a handler for `custom` phases naming `name`.
    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn CustomPhaseHandler>,
    ) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn with_params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Resolve participants from the registry and create a pending session.
    pub fn prepare_session(
        &self,
        registry: &dyn AgentRegistry,
        pattern: &PatternDef,
        agent_ids: &[AgentId],
        task: impl Into<String>,
    ) -> Result<Session, RunPatternError> {
        pattern.validate()?;
        let participants = registry.get_agents(agent_ids)?;
        if participants.is_empty() {
            return Err(DomainError::NoParticipants(pattern.id.to_string()).into());
        }
        Ok(Session::new(pattern.id.clone(), task, participants))
    }

    /// Run `session` to a terminal state.
    ///
    /// Never returns an error: failures become the session's status and
    /// cause. `cancel` is checked at every phase boundary; turns already
    /// running finish.
    pub async fn run(
        &self,
        pattern: &PatternDef,
        mut session: Session,
        cancel: &CancellationToken,
    ) -> Session {
        if let Err(e) = pattern.validate() {
            self.terminate(&mut session, Terminal::Fail(invalid(e)));
            return session;
        }
        if session.participants.is_empty() {
            let cause = invalid(DomainError::NoParticipants(pattern.id.to_string()));
            self.terminate(&mut session, Terminal::Fail(cause));
            return session;
        }
        if let Err(e) = session.start() {
            warn!("Session {} cannot start: {}", session.id, e);
            return session;
        }

        info!(
            "Session {} started: pattern '{}', {} participants",
            session.id,
            pattern.id,
            session.participants.len()
        );
        self.emit(
            &session,
            event_types::SESSION_STARTED,
            json!({
                "pattern": pattern.id,
                "task": session.task,
                "participants": session.participants.iter().map(|a| &a.id).collect::<Vec<_>>(),
            }),
        );

        for (index, phase) in pattern.phases.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Session {} cancelled before phase {}", session.id, index);
                self.terminate(
                    &mut session,
                    Terminal::Fail(SessionCause::Cancelled { phase_index: index }),
                );
                return session;
            }

            match self.run_phase(index, phase, &session, cancel).await {
                PhaseResult::Recorded(outcome) => {
                    let blocked = outcome.status == PhaseStatus::Blocked;
                    let cause = blocked.then(|| SessionCause::GateBlocked {
                        phase: phase.id.clone(),
                        reason: match &outcome.gate_decision {
                            GateDecision::Blocked { reason } => reason.to_string(),
                            GateDecision::Pass => String::new(),
                        },
                        negotiation: outcome.negotiation,
                    });
                    session.record_phase(outcome);
                    if let Some(cause) = cause {
                        self.terminate(&mut session, Terminal::Block(cause));
                        return session;
                    }
                }
                PhaseResult::Failed(outcome, cause) => {
                    if let Some(outcome) = outcome {
                        session.record_phase(*outcome);
                    }
                    self.terminate(&mut session, Terminal::Fail(cause));
                    return session;
                }
            }
        }

        self.terminate(&mut session, Terminal::Complete);
        session
    }

    async fn run_phase(
        &self,
        index: usize,
        phase: &Phase,
        session: &Session,
        cancel: &CancellationToken,
    ) -> PhaseResult {
        let participants = phase.participants.select(&session.participants);
        if participants.is_empty() {
            return PhaseResult::Failed(
                None,
                invalid(DomainError::NoParticipants(phase.id.clone())),
            );
        }

        let prior: Vec<(String, String)> = session
            .outcomes
            .iter()
            .map(|o| (o.phase_id.clone(), o.summary.clone()))
            .collect();
        let prior_context = compress_outputs(
            &prior,
            self.params.context_budget,
            self.params.compressed_output_size,
        );
        let earlier_vetoes = session.veto_history();

        info!(
            "Phase {} '{}' ({}, gate {}) with {} participants",
            index,
            phase.id,
            phase.topology,
            phase.gate,
            participants.len()
        );
        let driver = TurnDriver::new(
            Arc::clone(&self.runner),
            Arc::clone(&self.bus),
            Arc::clone(&self.recorder),
            Arc::clone(&self.live),
            self.params.clone(),
            session.id,
            index,
            cancel.clone(),
        );
        driver.emit(
            event_types::PHASE_STARTED,
            json!({
                "phase_index": index,
                "phase": phase.id,
                "topology": phase.topology.as_str(),
                "gate": phase.gate.as_str(),
                "participants": participants.iter().map(|a| &a.id).collect::<Vec<_>>(),
            }),
        );

        let input = PhaseInput {
            phase,
            participants: &participants,
            task: &session.task,
            prior_context: &prior_context,
            params: &self.params,
            earlier_vetoes: &earlier_vetoes,
        };
        let mut run = match self.run_topology(&input, &driver).await {
            Ok(run) => run,
            Err(e) => return PhaseResult::Failed(None, phase_failure(phase, index, e)),
        };

        let history = topology::veto_history(
            &earlier_vetoes,
            &run.superseded,
            &participants,
            &self.params.veto_policy,
        );
        let mut gate_decision = self.evaluate(phase, &run, &participants, &history);

        // Silent veto holders get further turns within the phase's budget.
        for turn in 2..=phase.turn_budget {
            let GateDecision::Blocked {
                reason: BlockReason::MissingApprovals { missing },
            } = &gate_decision
            else {
                break;
            };
            info!(
                "Phase '{}' waiting on {} approvals, turn {} of {}",
                phase.id,
                missing.len(),
                turn,
                phase.turn_budget
            );
            let prompt = input.prompt(&AgentPromptTemplate::approval_request(
                turn,
                phase.turn_budget,
                &run.summary,
            ));
            let jobs = participants
                .iter()
                .filter(|a| missing.contains(&a.id))
                .map(|a| (a.clone(), prompt.clone()))
                .collect();
            match driver.parallel(jobs).await {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        run.push(outcome);
                    }
                }
                Err(e) => return PhaseResult::Failed(None, phase_failure(phase, index, e)),
            }
            gate_decision = self.evaluate(phase, &run, &participants, &history);
        }

        driver.emit(
            event_types::GATE_DECISION,
            json!({
                "phase_index": index,
                "phase": phase.id,
                "gate": phase.gate.as_str(),
                "decision": gate_decision,
            }),
        );

        let mut vetoes = history[earlier_vetoes.len()..].to_vec();
        vetoes.extend(classify_vetoes(
            &by_sequence(&run),
            &participants,
            &self.params.veto_policy,
            &history,
        ));

        let incomplete = run.turns.iter().filter(|t| !t.complete).count();
        let mut summary = run.summary;
        let mut negotiation = None;
        let mut status = if incomplete > 0 {
            PhaseStatus::Partial
        } else {
            PhaseStatus::Passed
        };

        if let GateDecision::Blocked { reason } = &gate_decision {
            info!("Phase '{}' gate blocked: {}", phase.id, reason);
            match self
                .negotiate(phase, &session.task, reason, &participants, &driver)
                .await
            {
                Some((NegotiationOutcome::Accepted, resolution)) => {
                    negotiation = Some(NegotiationOutcome::Accepted);
                    if let Some(resolution) = resolution {
                        summary.push_str("\n\n### Negotiated resolution\n");
                        summary.push_str(&resolution);
                    }
                }
                Some((outcome, _)) => {
                    negotiation = Some(outcome);
                    status = PhaseStatus::Blocked;
                }
                None => status = PhaseStatus::Blocked,
            }
        }

        let outcome = PhaseOutcome {
            index,
            phase_id: phase.id.clone(),
            topology: phase.topology,
            gate: phase.gate,
            turns: run.turns,
            summary,
            gate_decision,
            negotiation,
            status,
            vetoes,
        };
        driver.emit(
            event_types::PHASE_COMPLETED,
            json!({
                "phase_index": index,
                "phase": phase.id,
                "status": outcome.status,
                "turns": outcome.turns.len(),
                "incomplete_turns": incomplete,
                "negotiation": outcome.negotiation,
            }),
        );
        info!(
            "Phase '{}' finished: {:?} ({} turns, {} incomplete)",
            phase.id,
            outcome.status,
            outcome.turns.len(),
            incomplete
        );

        if !outcome.turns.is_empty() && incomplete == outcome.turns.len() {
            let cause = SessionCause::PhaseFailed {
                phase: phase.id.clone(),
                detail: "every turn ended incomplete".to_string(),
            };
            return PhaseResult::Failed(Some(Box::new(outcome)), cause);
        }
        PhaseResult::Recorded(outcome)
    }

    fn evaluate(
        &self,
        phase: &Phase,
        run: &PhaseRun,
        participants: &[AgentDefinition],
        history: &[VetoRecord],
    ) -> GateDecision {
        evaluate_gate(
            phase.gate,
            &by_sequence(run),
            participants,
            &self.params.veto_policy,
            history,
        )
    }

    async fn run_topology(
        &self,
        input: &PhaseInput<'_>,
        driver: &TurnDriver,
    ) -> Result<PhaseRun, PhaseError> {
        match input.phase.topology {
            Topology::Solo => topology::solo(input, driver).await,
            Topology::Sequential => topology::sequential(input, driver).await,
            Topology::Parallel => topology::parallel(input, driver).await,
            Topology::Loop => topology::repeat(input, driver).await,
            Topology::Hierarchical => topology::hierarchical(input, driver).await,
            Topology::Network => topology::network(input, driver).await,
            Topology::Debate => topology::debate(input, driver).await,
            Topology::Custom => {
                let name = input.phase.options.handler.as_deref().unwrap_or_default();
                let Some(handler) = self.handlers.get(name) else {
                    return Err(PhaseError::Failed(format!(
                        "no custom phase handler named '{}'",
                        name
                    )));
                };
                let request = PhaseRequest {
                    phase: input.phase,
                    participants: input.participants,
                    task: input.task,
                    prior_context: input.prior_context,
                };
                handler.run(request, driver).await
            }
        }
    }

    /// Negotiate a blocked gate. `None` when no negotiation was held.
    async fn negotiate(
        &self,
        phase: &Phase,
        task: &str,
        reason: &BlockReason,
        participants: &[AgentDefinition],
        driver: &TurnDriver,
    ) -> Option<(NegotiationOutcome, Option<String>)> {
        if !self.params.negotiate_on_block {
            return None;
        }
        let negotiator = self.negotiator.as_ref()?;

        let disagreeing: Vec<AgentId> = match reason {
            BlockReason::Veto { record } if record.level == VetoLevel::Absolute => {
                info!("Absolute veto by {} is not negotiable", record.agent_id);
                return None;
            }
            BlockReason::Veto { record } => vec![record.agent_id.clone()],
            BlockReason::MissingApprovals { missing } => missing.clone(),
        };
        let proposers: Vec<AgentDefinition> = participants
            .iter()
            .filter(|a| disagreeing.contains(&a.id))
            .cloned()
            .collect();
        if proposers.is_empty() {
            return None;
        }

        let topic = format!(
            "Phase '{}' of the task \"{}\" is blocked: {}",
            phase.id,
            truncate(task, 200),
            reason
        );
        let runner =
            NegotiationRunner::new(Arc::clone(negotiator), self.params.negotiation_rounds);
        let negotiation = runner.run(&topic, &proposers, participants).await;

        driver.emit(
            event_types::NEGOTIATION,
            json!({
                "phase": phase.id,
                "topic": negotiation.topic,
                "rounds": negotiation.rounds,
                "outcome": negotiation.outcome,
                "resolution": negotiation.resolution,
            }),
        );
        let outcome = negotiation.outcome.unwrap_or(NegotiationOutcome::Escalated);
        Some((outcome, negotiation.resolution))
    }

    fn terminate(&self, session: &mut Session, terminal: Terminal) {
        let result = match terminal {
            Terminal::Complete => session.complete(),
            Terminal::Block(cause) => session.block(cause),
            Terminal::Fail(cause) => session.fail(cause),
        };
        if let Err(e) = result {
            warn!("Session {} transition rejected: {}", session.id, e);
        }

        match &session.cause {
            Some(cause) => info!("Session {} {}: {}", session.id, session.status, cause),
            None => info!("Session {} {}", session.id, session.status),
        }
        self.emit(
            session,
            event_types::SESSION_FINISHED,
            json!({
                "status": session.status,
                "cause": session.cause,
                "phases": session.outcomes.len(),
            }),
        );
        self.bus.close_session(&session.id);
    }

    fn emit(&self, session: &Session, event_type: &'static str, payload: Value) {
        driver::emit(
            self.recorder.as_ref(),
            self.live.as_ref(),
            session.id,
            event_type,
            payload,
        );
    }
}

enum Terminal {
    Complete,
    Block(SessionCause),
    Fail(SessionCause),
}

enum PhaseResult {
    Recorded(PhaseOutcome),
    Failed(Option<Box<PhaseOutcome>>, SessionCause),
}

fn invalid(e: DomainError) -> SessionCause {
    SessionCause::Invalid {
        detail: e.to_string(),
    }
}

fn phase_failure(phase: &Phase, index: usize, e: PhaseError) -> SessionCause {
    warn!("Phase '{}' failed: {}", phase.id, e);
    match e {
        PhaseError::ProviderExhausted(e) => SessionCause::ProviderExhausted {
            phase: phase.id.clone(),
            detail: e.to_string(),
        },
        PhaseError::Cancelled => SessionCause::Cancelled { phase_index: index },
        PhaseError::Failed(detail) => SessionCause::PhaseFailed {
            phase: phase.id.clone(),
            detail,
        },
    }
}

/// The gate-scope messages in publish order.
fn by_sequence(run: &PhaseRun) -> Vec<Message> {
    let mut messages = run.messages.clone();
    messages.sort_by_key(|m| m.sequence);
    messages
}
