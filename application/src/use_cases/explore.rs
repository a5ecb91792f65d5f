//! Explore use case.
//!
//! Bounded iterative exploration behind the `deep_search` tool. Each
//! iteration makes one orchestrating chat call that either asks for up to
//! `max_queries` sub-queries or returns a final answer. Sub-queries run
//! concurrently on the [`ExplorationBackend`]; results are appended to a
//! size-capped [`FindingsBuffer`](conclave_domain::FindingsBuffer).
//!
//! The loop always returns [`Findings`]: cancellation and provider failure
//! become termination reasons instead of errors.

use crate::config::ExplorationParams;
use crate::ports::exploration_backend::ExplorationBackend;
use crate::use_cases::provider_client::ProviderClient;
use conclave_domain::core::string::truncate;
use conclave_domain::prompt::ExplorationPromptTemplate;
use conclave_domain::{
    ChatMessage, ChatRequest, ExplorationDecision, ExplorationState, Findings, TerminationReason,
    exploration::parse_exploration_decision,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Explorer {
    client: Arc<ProviderClient>,
    backend: Arc<dyn ExplorationBackend>,
    params: ExplorationParams,
}

impl Explorer {
    pub fn new(
        client: Arc<ProviderClient>,
        backend: Arc<dyn ExplorationBackend>,
        params: ExplorationParams,
    ) -> Self {
        Self {
            client,
            backend,
            params,
        }
    }

    pub fn params(&self) -> ExplorationParams {
        self.params
    }

    /// Run the exploration loop for `query`.
    ///
    /// `max_iterations` overrides the configured bound when given.
    pub async fn explore(
        &self,
        query: &str,
        max_iterations: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> Findings {
        let max_iterations = max_iterations
            .map(|m| m.clamp(1, self.params.max_iterations))
            .unwrap_or(self.params.max_iterations);
        let mut state = ExplorationState::new(query, max_iterations)
            .with_max_queries(self.params.max_queries)
            .with_findings_cap(self.params.findings_cap);

        info!(
            "Exploring (max {} iterations): {}",
            max_iterations,
            truncate(query, 100)
        );
        let system = ExplorationPromptTemplate::system(state.max_queries);

        while state.begin_iteration() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                state.finish(TerminationReason::Cancelled);
                break;
            }

            let prompt = ExplorationPromptTemplate::iteration(
                &state.query,
                state.iteration,
                state.max_iterations,
                &state.findings.render(),
            );
            let request =
                ChatRequest::new(vec![ChatMessage::user(prompt)]).with_system_prompt(&system);

            let response = match self.client.chat(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Exploration stopped at iteration {}: {}", state.iteration, e);
                    state.finish(TerminationReason::ProviderFailed);
                    break;
                }
            };

            let queries = match parse_exploration_decision(&response.text) {
                ExplorationDecision::Final(answer) => {
                    debug!("Exploration concluded at iteration {}", state.iteration);
                    state.finish_with_answer(answer);
                    break;
                }
                ExplorationDecision::Explore(queries) => state.issue(queries).to_vec(),
            };

            debug!(
                "Iteration {}: running {} sub-queries",
                state.iteration,
                queries.len()
            );
            let results = join_all(queries.iter().map(|q| self.backend.run(q))).await;
            for (query, result) in queries.iter().zip(results) {
                state.record(query, &result);
            }
        }

        let findings = state.into_findings();
        info!(
            "Exploration finished after {} iterations ({})",
            findings.iterations,
            findings.termination.as_str()
        );
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat_provider::{ChatProvider, ProviderError};
    use crate::use_cases::provider_client::tests::ScriptedProvider;
    use async_trait::async_trait;
    use conclave_domain::{ChatResponse, ProviderConfig, SubQuery};
    use std::sync::Mutex;

    /// Backend that echoes a large blob tagged with the query.
    struct BlobBackend {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExplorationBackend for BlobBackend {
        async fn run(&self, query: &SubQuery) -> String {
            self.seen.lock().unwrap().push(query.query.clone());
            format!("{} {}", query.query, "x".repeat(1_500))
        }
    }

    fn explorer(
        script: Vec<Result<ChatResponse, ProviderError>>,
        params: ExplorationParams,
    ) -> (Explorer, Arc<BlobBackend>) {
        let provider = ScriptedProvider::new("p", script);
        let client = Arc::new(ProviderClient::new(
            vec![provider as Arc<dyn ChatProvider>],
            ProviderConfig::default(),
        ));
        let backend = Arc::new(BlobBackend {
            seen: Mutex::new(Vec::new()),
        });
        (
            Explorer::new(client, backend.clone(), params),
            backend,
        )
    }

    fn explore_reply(iteration: usize, count: usize) -> Result<ChatResponse, ProviderError> {
        let queries: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"tool":"grep","query":"it{}q{}","pattern":"foo"}}"#,
                    iteration, i
                )
            })
            .collect();
        Ok(ChatResponse::text(format!(
            r#"{{"action":"explore","queries":[{}]}}"#,
            queries.join(",")
        )))
    }

    #[tokio::test]
    async fn test_never_final_stops_at_iteration_cap() {
        // five queries requested every time, only three accepted
        let script = (1..=10).map(|i| explore_reply(i, 5)).collect();
        let (explorer, backend) = explorer(script, ExplorationParams::default());

        let findings = explorer.explore("where is the retry budget", None, None).await;

        assert_eq!(findings.termination, TerminationReason::IterationCap);
        assert_eq!(findings.iterations, 10);
        assert_eq!(backend.seen.lock().unwrap().len(), 30);
        assert!(findings.text.len() <= 8_000);
        // newest finding retained
        assert!(findings.text.contains("it10q2"));
        assert!(!findings.text.contains("it1q0 "));
    }

    #[tokio::test]
    async fn test_final_answer_ends_early() {
        let script = vec![
            explore_reply(1, 1),
            Ok(ChatResponse::text(
                r#"{"action":"final","answer":"budget lives in engine.rs"}"#,
            )),
        ];
        let (explorer, _) = explorer(script, ExplorationParams::default());

        let findings = explorer.explore("q", None, None).await;
        assert_eq!(findings.termination, TerminationReason::Sufficient);
        assert_eq!(findings.iterations, 2);
        assert_eq!(findings.answer.as_deref(), Some("budget lives in engine.rs"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let (explorer, backend) = explorer(vec![], ExplorationParams::default());
        let token = CancellationToken::new();
        token.cancel();

        let findings = explorer.explore("q", None, Some(&token)).await;
        assert_eq!(findings.termination, TerminationReason::Cancelled);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_returns_findings() {
        let script = vec![
            explore_reply(1, 2),
            Err(ProviderError::Http {
                status: 400,
                message: "bad".to_string(),
            }),
        ];
        let (explorer, _) = explorer(script, ExplorationParams::default());

        let findings = explorer.explore("q", None, None).await;
        assert_eq!(findings.termination, TerminationReason::ProviderFailed);
        assert!(findings.text.contains("it1q1"));
    }

    #[tokio::test]
    async fn test_iteration_override_is_bounded_by_config() {
        let script = (1..=10).map(|i| explore_reply(i, 1)).collect();
        let params = ExplorationParams::default().with_max_iterations(4);
        let (explorer, _) = explorer(script, params);

        let findings = explorer.explore("q", Some(50), None).await;
        assert_eq!(findings.iterations, 4);
    }
}
