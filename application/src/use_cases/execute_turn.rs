//! Execute Turn use case.
//!
//! Runs one agent turn as a bounded tool-calling loop:
//!
//! ```text
//! memory snippets ──▶ system prompt
//!                          │
//!   ┌──────────────────────▼─────────────────────┐
//!   │ round r: chat(messages, offered tools)     │
//!   │   text only             ──▶ TurnOutput     │
//!   │   tool calls            ──▶ run each call  │
//!   │                             sequentially,  │
//!   │                             append results │
//!   └──────────────────────┬─────────────────────┘
//!                          │ r == max_tool_rounds
//!                          ▼
//!                 TurnError::Incomplete
//! ```
//!
//! Tool failures never end a turn: they are rendered as `ERROR [CODE] ...`
//! observations and the agent decides how to continue.

use crate::config::ExecutorParams;
use crate::ports::memory_search::MemorySearch;
use crate::ports::tool_executor::ToolExecutorPort;
use crate::use_cases::explore::Explorer;
use crate::use_cases::provider_client::{ChatError, ProviderClient};
use async_trait::async_trait;
use conclave_domain::core::string::truncate;
use conclave_domain::prompt::AgentPromptTemplate;
use conclave_domain::tool::catalog;
use conclave_domain::{
    AgentDefinition, ChatMessage, ChatRequest, ChatResponse, Decision, StructuredDecision,
    ToolCall, ToolError, ToolResult, ToolSpec, VetoLevel,
};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a turn without a final answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// Round cap reached while the agent was still calling tools.
    #[error("Turn incomplete after {rounds} rounds")]
    Incomplete { partial: String, rounds: usize },

    #[error(transparent)]
    ProviderExhausted(#[from] ChatError),

    #[error("Turn cancelled")]
    Cancelled,
}

/// Everything a turn needs besides the agent itself.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    /// Task prompt for this turn.
    pub prompt: String,
    /// Earlier conversation, placed before the prompt.
    pub history: Vec<ChatMessage>,
    /// Memory scope; the executor default is used when absent.
    pub memory_scope: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl TurnContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_memory_scope(mut self, scope: impl Into<String>) -> Self {
        self.memory_scope = Some(scope.into());
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Final result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub text: String,
    /// Decision submitted through `submit_decision`, if any.
    pub decision: Option<StructuredDecision>,
    /// Provider round trips used.
    pub rounds: usize,
    /// Tool calls executed, `submit_decision` included.
    pub tool_calls: usize,
}

/// Runs agent turns. The pattern engine depends on this seam so phases can
/// be exercised with scripted turns.
#[async_trait]
pub trait TurnRunner: Send + Sync {
    async fn run_turn(
        &self,
        agent: &AgentDefinition,
        context: TurnContext,
    ) -> Result<TurnOutput, TurnError>;
}

/// Loop state of one turn.
struct TurnState {
    round: usize,
    last_response: Option<ChatResponse>,
    pending_calls: VecDeque<ToolCall>,
    messages: Vec<ChatMessage>,
    /// Set after `deep_search`: the next round may only submit a decision.
    force_synthesis: bool,
    decision: Option<StructuredDecision>,
    tool_calls: usize,
}

impl TurnState {
    fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            round: 0,
            last_response: None,
            pending_calls: VecDeque::new(),
            messages,
            force_synthesis: false,
            decision: None,
            tool_calls: 0,
        }
    }

    fn partial_text(&self) -> String {
        self.last_response
            .as_ref()
            .map(|r| r.text.clone())
            .unwrap_or_default()
    }

    fn finish(self, text: String) -> TurnOutput {
        TurnOutput {
            text,
            decision: self.decision,
            rounds: self.round,
            tool_calls: self.tool_calls,
        }
    }
}

/// Tool-calling executor backed by the provider chain.
pub struct TurnExecutor {
    client: Arc<ProviderClient>,
    tools: Arc<dyn ToolExecutorPort>,
    explorer: Arc<Explorer>,
    memory: Arc<dyn MemorySearch>,
    params: ExecutorParams,
}

impl TurnExecutor {
    pub fn new(
        client: Arc<ProviderClient>,
        tools: Arc<dyn ToolExecutorPort>,
        explorer: Arc<Explorer>,
        memory: Arc<dyn MemorySearch>,
        params: ExecutorParams,
    ) -> Self {
        Self {
            client,
            tools,
            explorer,
            memory,
            params,
        }
    }

    /// Tools offered to `agent`: workspace tools it holds a capability for,
    /// engine tools it holds a capability for, and always `submit_decision`.
    pub fn offered_tools(&self, agent: &AgentDefinition) -> ToolSpec {
        let mut spec = self
            .tools
            .tool_spec()
            .filtered(|t| agent.has_capability(&t.name))
            .register(catalog::submit_decision());
        if agent.has_capability(catalog::DEEP_SEARCH) {
            spec = spec.register(catalog::deep_search());
        }
        if agent.has_capability(catalog::SEARCH_MEMORY) {
            spec = spec.register(catalog::search_memory());
        }
        spec
    }

    async fn memory_snippets(&self, scope: &str, query: &str) -> Vec<String> {
        match tokio::time::timeout(self.params.memory_timeout, self.memory.search(scope, query))
            .await
        {
            Ok(Ok(mut snippets)) => {
                snippets.truncate(self.params.memory_snippets);
                snippets
            }
            Ok(Err(e)) => {
                warn!("Memory search failed, continuing without snippets: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Memory search timed out after {}ms, continuing without snippets",
                    self.params.memory_timeout.as_millis()
                );
                Vec::new()
            }
        }
    }

    /// Execute one tool call and render its observation.
    async fn dispatch(
        &self,
        call: &ToolCall,
        offered: &ToolSpec,
        state: &mut TurnState,
        context: &TurnContext,
        scope: &str,
    ) -> String {
        if !offered.contains(&call.tool_name) {
            warn!("Agent called tool not offered to it: {}", call.tool_name);
            return ToolResult::failure(
                &call.tool_name,
                ToolError::permission_denied(&call.tool_name),
            )
            .to_observation();
        }

        match call.tool_name.as_str() {
            catalog::SUBMIT_DECISION => match parse_decision(call) {
                Ok(decision) => {
                    let ack = format!("Decision recorded: {}", decision.decision.as_str());
                    state.decision = Some(decision);
                    ack
                }
                Err(e) => ToolResult::failure(&call.tool_name, e).to_observation(),
            },
            catalog::DEEP_SEARCH => match call.require_string("query") {
                Ok(query) => {
                    let findings = self
                        .explorer
                        .explore(query, None, context.cancel.as_ref())
                        .await;
                    state.force_synthesis = true;
                    findings.to_tool_output()
                }
                Err(e) => ToolResult::failure(&call.tool_name, ToolError::invalid_argument(e))
                    .to_observation(),
            },
            catalog::SEARCH_MEMORY => match call.require_string("query") {
                Ok(query) => {
                    let scope = call.get_string("scope").unwrap_or(scope);
                    let snippets = self.memory_snippets(scope, query).await;
                    if snippets.is_empty() {
                        "No memory snippets found.".to_string()
                    } else {
                        snippets.join("\n---\n")
                    }
                }
                Err(e) => ToolResult::failure(&call.tool_name, ToolError::invalid_argument(e))
                    .to_observation(),
            },
            _ => self.tools.execute(call).await.to_observation(),
        }
    }
}

#[async_trait]
impl TurnRunner for TurnExecutor {
    async fn run_turn(
        &self,
        agent: &AgentDefinition,
        context: TurnContext,
    ) -> Result<TurnOutput, TurnError> {
        let scope = context
            .memory_scope
            .clone()
            .unwrap_or_else(|| self.params.memory_scope.clone());
        let memory = self.memory_snippets(&scope, &context.prompt).await;
        let system = AgentPromptTemplate::system(agent, &memory);

        let offered = self.offered_tools(agent);
        let synthesis_only = ToolSpec::new().register(catalog::submit_decision());

        let mut messages = context.history.clone();
        messages.push(ChatMessage::user(&context.prompt));
        let mut state = TurnState::new(messages);

        info!(
            "Turn for {} ({} tools offered, {} memory snippets)",
            agent.id,
            offered.len(),
            memory.len()
        );

        while state.round < self.params.max_tool_rounds {
            if context.is_cancelled() {
                return Err(TurnError::Cancelled);
            }
            state.round += 1;

            let tools = if state.force_synthesis {
                state.force_synthesis = false;
                synthesis_only.to_vec()
            } else {
                offered.to_vec()
            };
            let request = ChatRequest::new(state.messages.clone())
                .with_system_prompt(&system)
                .with_tools(tools)
                .with_model(agent.model.clone());

            let response = self.client.chat(request).await?;
            debug!(
                "{} round {}: {} tool calls, {} chars",
                agent.id,
                state.round,
                response.tool_calls.len(),
                response.text.len()
            );

            if is_final(&response) {
                for call in &response.tool_calls {
                    state.tool_calls += 1;
                    match parse_decision(call) {
                        Ok(decision) => state.decision = Some(decision),
                        Err(e) => warn!("Ignoring malformed decision from {}: {}", agent.id, e),
                    }
                }
                let text = response.text.clone();
                return Ok(state.finish(text));
            }

            state.messages.push(ChatMessage::assistant_with_calls(
                &response.text,
                response.tool_calls.clone(),
            ));
            state.pending_calls = response.tool_calls.iter().cloned().collect();
            state.last_response = Some(response);

            while let Some(call) = state.pending_calls.pop_front() {
                state.tool_calls += 1;
                debug!(
                    "{} calling {} ({})",
                    agent.id,
                    call.tool_name,
                    truncate(&serde_json::to_string(&call.arguments).unwrap_or_default(), 80)
                );
                let observation = self
                    .dispatch(&call, &offered, &mut state, &context, &scope)
                    .await;
                state
                    .messages
                    .push(ChatMessage::tool_result(&call.id, observation));
            }
        }

        warn!(
            "Turn for {} hit the round cap ({})",
            agent.id, self.params.max_tool_rounds
        );
        Err(TurnError::Incomplete {
            partial: state.partial_text(),
            rounds: state.round,
        })
    }
}

/// A response is final when it has no tool calls, or only `submit_decision`
/// calls alongside a non-empty answer.
fn is_final(response: &ChatResponse) -> bool {
    !response.has_tool_calls()
        || (!response.text.trim().is_empty()
            && response
                .tool_calls
                .iter()
                .all(|c| c.tool_name == catalog::SUBMIT_DECISION))
}

fn parse_decision(call: &ToolCall) -> Result<StructuredDecision, ToolError> {
    let decision: Decision = call
        .require_string("decision")
        .map_err(ToolError::invalid_argument)?
        .parse()
        .map_err(ToolError::invalid_argument)?;
    let veto_level = match call.get_string("veto_level") {
        Some(level) => Some(
            level
                .parse::<VetoLevel>()
                .map_err(ToolError::invalid_argument)?,
        ),
        None => None,
    };
    Ok(StructuredDecision {
        decision,
        reason: call.get_string("reason").unwrap_or_default().to_string(),
        veto_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorationParams;
    use crate::ports::chat_provider::{ChatProvider, ProviderError};
    use crate::ports::exploration_backend::ExplorationBackend;
    use crate::ports::memory_search::{MemoryError, NoMemory};
    use crate::use_cases::provider_client::tests::ScriptedProvider;
    use conclave_domain::{ChatRole, ProviderConfig, SubQuery, ToolDefinition};
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoTools {
        spec: ToolSpec,
        executed: Mutex<Vec<String>>,
    }

    impl EchoTools {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spec: ToolSpec::new()
                    .register(ToolDefinition::new("read_file", "Read a file"))
                    .register(ToolDefinition::new("run_command", "Run a command")),
                executed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolExecutorPort for EchoTools {
        fn tool_spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, call: &ToolCall) -> ToolResult {
            self.executed.lock().unwrap().push(call.tool_name.clone());
            match call.get_string("path") {
                Some(path) => ToolResult::success(&call.tool_name, format!("contents of {}", path)),
                None => ToolResult::failure(
                    &call.tool_name,
                    ToolError::invalid_argument("Missing required argument: path"),
                ),
            }
        }
    }

    struct NullBackend;

    #[async_trait]
    impl ExplorationBackend for NullBackend {
        async fn run(&self, query: &SubQuery) -> String {
            format!("nothing for {}", query.query)
        }
    }

    struct SlowMemory;

    #[async_trait]
    impl MemorySearch for SlowMemory {
        async fn search(&self, _scope: &str, _query: &str) -> Result<Vec<String>, MemoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec!["too late".to_string()])
        }
    }

    struct FixedMemory;

    #[async_trait]
    impl MemorySearch for FixedMemory {
        async fn search(&self, scope: &str, _query: &str) -> Result<Vec<String>, MemoryError> {
            Ok(vec![format!("{} convention: no unwrap", scope)])
        }
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        tools: Arc<EchoTools>,
        executor: TurnExecutor,
    }

    fn harness(
        script: Vec<Result<ChatResponse, ProviderError>>,
        memory: Arc<dyn MemorySearch>,
        params: ExecutorParams,
    ) -> Harness {
        let provider = ScriptedProvider::new("p", script);
        let client = Arc::new(ProviderClient::new(
            vec![provider.clone() as Arc<dyn ChatProvider>],
            ProviderConfig::default(),
        ));
        let explorer = Arc::new(Explorer::new(
            client.clone(),
            Arc::new(NullBackend),
            ExplorationParams::default(),
        ));
        let tools = EchoTools::new();
        let executor = TurnExecutor::new(client, tools.clone(), explorer, memory, params);
        Harness {
            provider,
            tools,
            executor,
        }
    }

    fn calls(calls: Vec<ToolCall>) -> Result<ChatResponse, ProviderError> {
        Ok(ChatResponse::text("").with_tool_calls(calls))
    }

    fn reader() -> AgentDefinition {
        AgentDefinition::new("dev", "developer", 50).with_capability("read_file")
    }

    #[tokio::test]
    async fn test_plain_text_is_final() {
        let h = harness(
            vec![Ok(ChatResponse::text("done"))],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let output = h
            .executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap();
        assert_eq!(output.text, "done");
        assert_eq!(output.rounds, 1);
        assert!(output.decision.is_none());
    }

    #[tokio::test]
    async fn test_tool_results_feed_back_sequentially() {
        let h = harness(
            vec![
                calls(vec![
                    ToolCall::new("read_file").with_id("c1").with_arg("path", "a.rs"),
                    ToolCall::new("read_file").with_id("c2"),
                ]),
                Ok(ChatResponse::text("summary")),
            ],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let output = h
            .executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap();
        assert_eq!(output.text, "summary");
        assert_eq!(output.rounds, 2);
        assert_eq!(output.tool_calls, 2);

        let requests = h.provider.requests();
        let second = &requests[1];
        let tool_msgs: Vec<_> = second
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 2);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_msgs[0].content, "contents of a.rs");
        assert!(tool_msgs[1].content.starts_with("ERROR [INVALID_ARGUMENT]"));
    }

    #[tokio::test]
    async fn test_tools_filtered_by_capability() {
        let h = harness(
            vec![
                calls(vec![ToolCall::new("run_command").with_id("c1")]),
                Ok(ChatResponse::text("ok")),
            ],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        h.executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap();

        let requests = h.provider.requests();
        let first = &requests[0];
        let names: Vec<_> = first.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "submit_decision"]);

        assert!(h.tools.executed.lock().unwrap().is_empty());
        let denied = &requests[1].messages.last().unwrap().content;
        assert!(denied.starts_with("ERROR [PERMISSION_DENIED]"));
    }

    #[tokio::test]
    async fn test_round_cap_yields_incomplete_with_partial_text() {
        let script = (0..5)
            .map(|i| {
                Ok(ChatResponse::text(format!("still reading {}", i)).with_tool_calls(vec![
                    ToolCall::new("read_file").with_arg("path", "x"),
                ]))
            })
            .collect();
        let h = harness(
            script,
            Arc::new(NoMemory),
            ExecutorParams::default().with_max_tool_rounds(3),
        );
        let err = h
            .executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TurnError::Incomplete {
                partial: "still reading 2".to_string(),
                rounds: 3
            }
        );
        assert_eq!(h.provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_structured_decision_is_captured() {
        let decision = ToolCall::new("submit_decision")
            .with_id("d1")
            .with_arg("decision", "veto")
            .with_arg("reason", "no tests")
            .with_arg("veto_level", "strong");
        let h = harness(
            vec![calls(vec![decision]), Ok(ChatResponse::text("Blocked on tests."))],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let output = h
            .executor
            .run_turn(&reader(), TurnContext::new("review"))
            .await
            .unwrap();
        let decision = output.decision.unwrap();
        assert_eq!(decision.decision, Decision::Veto);
        assert_eq!(decision.veto_level, Some(VetoLevel::Strong));
        assert_eq!(decision.reason, "no tests");
    }

    #[tokio::test]
    async fn test_decision_with_text_is_final() {
        let decision = ToolCall::new("submit_decision")
            .with_arg("decision", "approve")
            .with_arg("reason", "fine");
        let h = harness(
            vec![Ok(ChatResponse::text("Looks good.").with_tool_calls(vec![decision]))],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let output = h
            .executor
            .run_turn(&reader(), TurnContext::new("review"))
            .await
            .unwrap();
        assert_eq!(output.rounds, 1);
        assert_eq!(output.text, "Looks good.");
        assert_eq!(output.decision.unwrap().decision, Decision::Approve);
    }

    #[tokio::test]
    async fn test_deep_search_forces_synthesis_round() {
        let agent = reader().with_capability("deep_search");
        let h = harness(
            vec![
                calls(vec![
                    ToolCall::new("deep_search")
                        .with_id("s1")
                        .with_arg("query", "where is the bus"),
                ]),
                // consumed by the exploration loop
                Ok(ChatResponse::text(
                    r#"{"action":"final","answer":"application/src/bus"}"#,
                )),
                Ok(ChatResponse::text("The bus lives in application/src/bus.")),
            ],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let output = h
            .executor
            .run_turn(&agent, TurnContext::new("task"))
            .await
            .unwrap();
        assert_eq!(output.text, "The bus lives in application/src/bus.");

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 3);
        let observation = &requests[2].messages.last().unwrap().content;
        assert!(observation.starts_with("## Answer\napplication/src/bus"));
        let names: Vec<_> = requests[2].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["submit_decision"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_memory_is_skipped() {
        let h = harness(
            vec![Ok(ChatResponse::text("done"))],
            Arc::new(SlowMemory),
            ExecutorParams::default().with_memory_timeout(Duration::from_secs(1)),
        );
        let output = h
            .executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap();
        assert_eq!(output.text, "done");
        let system = h.provider.requests()[0].system_prompt.clone().unwrap();
        assert!(!system.contains("too late"));
    }

    #[tokio::test]
    async fn test_memory_snippets_reach_system_prompt() {
        let h = harness(
            vec![Ok(ChatResponse::text("done"))],
            Arc::new(FixedMemory),
            ExecutorParams::default(),
        );
        h.executor
            .run_turn(&reader(), TurnContext::new("task").with_memory_scope("team"))
            .await
            .unwrap();
        let system = h.provider.requests()[0].system_prompt.clone().unwrap();
        assert!(system.contains("- team convention: no unwrap"));
    }

    #[tokio::test]
    async fn test_provider_exhaustion_surfaces() {
        let h = harness(
            vec![Err(ProviderError::RateLimited { retry_after: None })],
            Arc::new(NoMemory),
            ExecutorParams::default(),
        );
        let err = h
            .executor
            .run_turn(&reader(), TurnContext::new("task"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ProviderExhausted(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let h = harness(vec![], Arc::new(NoMemory), ExecutorParams::default());
        let token = CancellationToken::new();
        token.cancel();
        let err = h
            .executor
            .run_turn(&reader(), TurnContext::new("task").with_cancellation(token))
            .await
            .unwrap_err();
        assert_eq!(err, TurnError::Cancelled);
        assert_eq!(h.provider.calls(), 0);
    }
}
