//! Turn driver: runs one agent turn inside a phase and publishes its message.

use crate::bus::MessageBus;
use crate::config::EngineParams;
use crate::ports::event_recorder::{EventRecorder, SessionEvent, event_types};
use crate::ports::live_events::LiveEventPublisher;
use crate::use_cases::execute_turn::{TurnContext, TurnError, TurnRunner};
use crate::use_cases::provider_client::ChatError;
use async_trait::async_trait;
use conclave_domain::message::classify_markers;
use conclave_domain::{
    AgentDefinition, Decision, DecisionSource, Message, MessagePayload, Phase, SessionId,
    StructuredDecision, TurnRecord,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Failures that end a phase early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error(transparent)]
    ProviderExhausted(#[from] ChatError),

    #[error("Phase cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// A finished turn and the message it published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub record: TurnRecord,
    pub message: Message,
}

impl TurnOutcome {
    pub fn output(&self) -> &str {
        &self.record.output
    }

    pub fn labelled(&self) -> (String, String) {
        (self.record.agent.to_string(), self.record.output.clone())
    }
}

/// What a topology produced.
///
/// `turns` and `messages` cover the same scope: the turns the gate is
/// evaluated on. Multi-round topologies keep only the last round there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseRun {
    pub turns: Vec<TurnRecord>,
    /// Messages the gate is evaluated on, in publish order.
    pub messages: Vec<Message>,
    /// Messages of earlier rounds. Their vetoes still count toward the
    /// session's veto history.
    pub superseded: Vec<Message>,
    /// Output carried forward to the next phase.
    pub summary: String,
}

impl PhaseRun {
    pub fn push(&mut self, outcome: TurnOutcome) {
        self.turns.push(outcome.record);
        self.messages.push(outcome.message);
    }

    /// Start a new round: its turns and messages replace the gate scope.
    pub fn replace_round(&mut self, outcomes: &[TurnOutcome]) {
        self.superseded.append(&mut self.messages);
        self.turns = outcomes.iter().map(|o| o.record.clone()).collect();
        self.messages = outcomes.iter().map(|o| o.message.clone()).collect();
    }
}

/// Inputs of a phase handed to custom handlers.
pub struct PhaseRequest<'a> {
    pub phase: &'a Phase,
    pub participants: &'a [AgentDefinition],
    pub task: &'a str,
    pub prior_context: &'a str,
}

/// Externally supplied phase logic for `custom` topologies.
#[async_trait]
pub trait CustomPhaseHandler: Send + Sync {
    async fn run(
        &self,
        request: PhaseRequest<'_>,
        driver: &TurnDriver,
    ) -> Result<PhaseRun, PhaseError>;
}

/// Runs turns for one phase of one session.
#[derive(Clone)]
pub struct TurnDriver {
    runner: Arc<dyn TurnRunner>,
    bus: Arc<MessageBus>,
    recorder: Arc<dyn EventRecorder>,
    live: Arc<dyn LiveEventPublisher>,
    params: EngineParams,
    session_id: SessionId,
    phase_index: usize,
    cancel: CancellationToken,
}

impl TurnDriver {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        runner: Arc<dyn TurnRunner>,
        bus: Arc<MessageBus>,
        recorder: Arc<dyn EventRecorder>,
        live: Arc<dyn LiveEventPublisher>,
        params: EngineParams,
        session_id: SessionId,
        phase_index: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner,
            bus,
            recorder,
            live,
            params,
            session_id,
            phase_index,
            cancel,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Run one turn, retrying an incomplete one within the retry budget.
    ///
    /// A turn still incomplete after the budget is kept as a partial result.
    pub async fn turn(
        &self,
        agent: &AgentDefinition,
        prompt: String,
    ) -> Result<TurnOutcome, PhaseError> {
        let mut attempts = 0;
        let (text, structured, rounds, complete) = loop {
            attempts += 1;
            let context = TurnContext::new(prompt.clone()).with_cancellation(self.cancel.clone());
            match self.runner.run_turn(agent, context).await {
                Ok(output) => break (output.text, output.decision, output.rounds, true),
                Err(TurnError::Incomplete { partial, rounds }) => {
                    if attempts <= self.params.turn_retry_budget {
                        warn!(
                            "Turn for {} incomplete after {} rounds, retrying ({}/{})",
                            agent.id, rounds, attempts, self.params.turn_retry_budget
                        );
                        continue;
                    }
                    warn!(
                        "Turn for {} incomplete after {} attempts, keeping partial result",
                        agent.id, attempts
                    );
                    break (partial, None, rounds, false);
                }
                Err(TurnError::ProviderExhausted(e)) => return Err(e.into()),
                Err(TurnError::Cancelled) => return Err(PhaseError::Cancelled),
            }
        };

        let (decision, source) = self.resolve_decision(agent, structured.as_ref(), &text);
        let mut payload = MessagePayload::text(&text);
        if let Some(structured) = &structured {
            payload.veto_level = structured.veto_level;
            if !structured.reason.is_empty() {
                payload.reason = Some(structured.reason.clone());
            }
        }

        let message = Message::new(
            self.session_id,
            agent.id.clone(),
            decision.message_type(),
            payload,
        )
        .with_phase(self.phase_index);
        let message = self.bus.publish(message);
        self.emit(
            event_types::MESSAGE,
            serde_json::to_value(&message).unwrap_or(Value::Null),
        );
        debug!("{} published {} ({:?})", agent.id, message.message_type, source);

        Ok(TurnOutcome {
            record: TurnRecord {
                agent: agent.id.clone(),
                output: text,
                decision,
                decision_source: source,
                complete,
                rounds,
                attempts,
            },
            message,
        })
    }

    /// Run independent turns concurrently. Results keep the input order.
    ///
    /// Every spawned turn is awaited before an error is returned.
    pub async fn parallel(
        &self,
        jobs: Vec<(AgentDefinition, String)>,
    ) -> Result<Vec<TurnOutcome>, PhaseError> {
        let count = jobs.len();
        let mut set = JoinSet::new();
        for (index, (agent, prompt)) in jobs.into_iter().enumerate() {
            let driver = self.clone();
            set.spawn(async move { (index, driver.turn(&agent, prompt).await) });
        }

        let mut slots: Vec<Option<TurnOutcome>> = vec![None; count];
        let mut first_error: Option<PhaseError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error
                        .get_or_insert(PhaseError::Failed(format!("turn task failed: {}", e)));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    fn resolve_decision(
        &self,
        agent: &AgentDefinition,
        structured: Option<&StructuredDecision>,
        text: &str,
    ) -> (Decision, DecisionSource) {
        if let Some(structured) = structured {
            return (structured.decision, DecisionSource::Structured);
        }
        if self.params.marker_fallback
            && let Some(decision) = classify_markers(text)
        {
            warn!(
                "{} submitted no decision, using text marker ({})",
                agent.id,
                decision.as_str()
            );
            return (decision, DecisionSource::TextMarker);
        }
        (Decision::Inform, DecisionSource::Default)
    }

    pub(super) fn emit(&self, event_type: &'static str, payload: Value) {
        emit(
            self.recorder.as_ref(),
            self.live.as_ref(),
            self.session_id,
            event_type,
            payload,
        );
    }
}

/// Record an event and mirror it to live observers.
pub(super) fn emit(
    recorder: &dyn EventRecorder,
    live: &dyn LiveEventPublisher,
    session_id: SessionId,
    event_type: &'static str,
    payload: Value,
) {
    live.publish_event(session_id, event_type, &payload);
    recorder.record_event(session_id, SessionEvent::new(event_type, payload));
}
