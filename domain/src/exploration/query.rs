//! Sub-queries issued by the exploration orchestrator and their parsing.

use crate::core::json::extract_json_object;
use crate::core::string::prefix;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deterministic sub-agent that answers a sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubQueryTool {
    /// Case-insensitive content search.
    Grep,
    /// Read named files.
    Read,
    /// Directory structure listing.
    Structure,
    /// Keyword search derived from the query text.
    #[default]
    Auto,
}

impl SubQueryTool {
    fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "grep" | "search" => SubQueryTool::Grep,
            "read" | "read_file" => SubQueryTool::Read,
            "structure" | "tree" | "list" => SubQueryTool::Structure,
            _ => SubQueryTool::Auto,
        }
    }
}

/// One concrete exploration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    pub tool: SubQueryTool,
    pub query: String,
    /// Regex for `grep`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// File glob restricting `grep`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    /// Paths for `read`, or the root for `structure`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SubQuery {
    pub fn new(tool: SubQueryTool, query: impl Into<String>) -> Self {
        Self {
            tool,
            query: query.into(),
            pattern: None,
            glob: None,
            files: Vec::new(),
            reason: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let query = text("query").or_else(|| text("pattern"))?;
        let files = obj
            .get("files")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            tool: text("tool")
                .map(|t| SubQueryTool::parse_lenient(&t))
                .unwrap_or_default(),
            query,
            pattern: text("pattern"),
            glob: text("glob"),
            files,
            reason: text("reason"),
        })
    }
}

/// What the orchestrating call asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorationDecision {
    Explore(Vec<SubQuery>),
    Final(String),
}

/// Parse an orchestrator reply.
///
/// Accepts `{"action":"explore","queries":[...]}` or
/// `{"action":"final","answer":"..."}`, possibly fenced or wrapped in prose.
/// Anything else becomes a single `auto` query built from the first 200
/// characters of the reply, so the loop keeps making progress.
pub fn parse_exploration_decision(text: &str) -> ExplorationDecision {
    if let Some(value) = extract_json_object(text) {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("explore")
            .to_lowercase();

        if action == "final" || action == "answer" {
            let answer = value
                .get("answer")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return ExplorationDecision::Final(answer);
        }

        let queries: Vec<SubQuery> = value
            .get("queries")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(SubQuery::from_value).collect())
            .unwrap_or_default();
        if !queries.is_empty() {
            return ExplorationDecision::Explore(queries);
        }
    }

    let fallback = prefix(text.trim(), 200).to_string();
    ExplorationDecision::Explore(vec![SubQuery::new(SubQueryTool::Auto, fallback)])
}

/// Keywords longer than three characters, joined as a regex alternation.
///
/// Non-alphanumeric characters split words, so the result never contains
/// regex metacharacters other than `|`.
pub fn auto_pattern(query: &str) -> Option<String> {
    let mut words: Vec<String> = Vec::new();
    for word in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if word.chars().count() > 3 && !words.iter().any(|w| w.eq_ignore_ascii_case(word)) {
            words.push(word.to_string());
        }
    }
    if words.is_empty() {
        None
    } else {
        Some(words.join("|"))
    }
}
