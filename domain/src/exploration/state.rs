//! Exploration loop state and the findings buffer.

use super::query::SubQuery;
use crate::core::string::{prefix, truncate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Hard caps on the exploration loop, also the defaults.
pub const MAX_ITERATIONS: usize = 10;
pub const MAX_QUERIES: usize = 3;
pub const DEFAULT_FINDINGS_CAP: usize = 8_000;
/// Per-result cap before a finding enters the buffer.
pub const FINDING_RESULT_CAP: usize = 2_000;

const SEPARATOR: &str = "\n\n";

/// Why an exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The orchestrating call returned a final answer.
    Sufficient,
    IterationCap,
    Cancelled,
    /// The orchestrating call could not be made.
    ProviderFailed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Sufficient => "sufficient",
            TerminationReason::IterationCap => "iteration_cap",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::ProviderFailed => "provider_failed",
        }
    }
}

/// Size-capped accumulation of findings; oldest entries are evicted first.
///
/// The newest entry is always retained. An entry larger than the whole cap
/// is cut down to fit.
///
/// ```
/// use conclave_domain::exploration::FindingsBuffer;
///
/// let mut buf = FindingsBuffer::new(20);
/// buf.push("first entry");
/// buf.push("second entry");
/// assert_eq!(buf.render(), "second entry");
/// assert!(buf.len() <= 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsBuffer {
    cap: usize,
    entries: VecDeque<String>,
    evicted: usize,
}

impl FindingsBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: VecDeque::new(),
            evicted: 0,
        }
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        let mut entry: String = entry.into();
        if entry.len() > self.cap {
            entry = prefix(&entry, self.cap).to_string();
        }
        self.entries.push_back(entry);
        while self.len() > self.cap && self.entries.len() > 1 {
            self.entries.pop_front();
            self.evicted += 1;
        }
    }

    /// Rendered length in bytes, separators included.
    pub fn len(&self) -> usize {
        let content: usize = self.entries.iter().map(String::len).sum();
        content + SEPARATOR.len() * self.entries.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of entries dropped to stay under the cap.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

/// Format one sub-query result as a findings entry.
pub fn format_finding(iteration: usize, query: &str, result: &str) -> String {
    format!(
        "[iter {}] Q: {}\nA: {}",
        iteration,
        query,
        truncate(result, FINDING_RESULT_CAP)
    )
}

/// Mutable state of one exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationState {
    pub query: String,
    pub iteration: usize,
    pub max_iterations: usize,
    pub max_queries: usize,
    /// Sub-queries issued in the current iteration.
    pub queries: Vec<SubQuery>,
    pub findings: FindingsBuffer,
    pub termination: Option<TerminationReason>,
    pub answer: Option<String>,
}

impl ExplorationState {
    /// `max_iterations` is clamped to `1..=MAX_ITERATIONS`.
    pub fn new(query: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            query: query.into(),
            iteration: 0,
            max_iterations: max_iterations.clamp(1, MAX_ITERATIONS),
            max_queries: MAX_QUERIES,
            queries: Vec::new(),
            findings: FindingsBuffer::new(DEFAULT_FINDINGS_CAP),
            termination: None,
            answer: None,
        }
    }

    pub fn with_max_queries(mut self, max: usize) -> Self {
        self.max_queries = max.clamp(1, MAX_QUERIES);
        self
    }

    pub fn with_findings_cap(mut self, cap: usize) -> Self {
        self.findings = FindingsBuffer::new(cap);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    pub fn is_last_iteration(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// Advance to the next iteration. Finishes with
    /// [`TerminationReason::IterationCap`] and returns `false` at the cap.
    pub fn begin_iteration(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        if self.iteration >= self.max_iterations {
            self.finish(TerminationReason::IterationCap);
            return false;
        }
        self.iteration += 1;
        self.queries.clear();
        true
    }

    /// Accept sub-queries for this iteration, dropping any beyond the limit.
    /// Returns the accepted queries.
    pub fn issue(&mut self, mut queries: Vec<SubQuery>) -> &[SubQuery] {
        queries.truncate(self.max_queries);
        self.queries = queries;
        &self.queries
    }

    pub fn record(&mut self, query: &SubQuery, result: &str) {
        let entry = format_finding(self.iteration, &query.query, result);
        self.findings.push(entry);
    }

    pub fn finish(&mut self, reason: TerminationReason) {
        if self.termination.is_none() {
            self.termination = Some(reason);
        }
    }

    pub fn finish_with_answer(&mut self, answer: impl Into<String>) {
        self.answer = Some(answer.into());
        self.finish(TerminationReason::Sufficient);
    }

    pub fn into_findings(self) -> Findings {
        Findings {
            query: self.query,
            text: self.findings.render(),
            answer: self.answer,
            iterations: self.iteration,
            termination: self.termination.unwrap_or(TerminationReason::IterationCap),
        }
    }
}

/// Output of an exploration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    pub query: String,
    /// Rendered findings buffer.
    pub text: String,
    /// Final answer from the orchestrating call, when it produced one.
    pub answer: Option<String>,
    pub iterations: usize,
    pub termination: TerminationReason,
}

impl Findings {
    /// Text handed back to the calling agent as the `deep_search` tool result.
    pub fn to_tool_output(&self) -> String {
        let mut out = String::new();
        if let Some(answer) = &self.answer {
            out.push_str("## Answer\n");
            out.push_str(answer);
            out.push_str("\n\n");
        }
        out.push_str(&format!(
            "## Findings ({} iterations, {})\n",
            self.iterations,
            self.termination.as_str()
        ));
        if self.text.is_empty() {
            out.push_str("(no findings)");
        } else {
            out.push_str(&self.text);
        }
        out
    }
}
