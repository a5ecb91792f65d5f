//! Names and definitions of the tools the engine itself provides.
//!
//! Workspace tools (`read_file`, `grep_search`, ...) are defined by the tool
//! executor adapter. The engine adds the three below to every agent that has
//! the matching capability (`submit_decision` is always offered).

use super::entities::{ToolDefinition, ToolParameter};

pub const DEEP_SEARCH: &str = "deep_search";
pub const SUBMIT_DECISION: &str = "submit_decision";
pub const SEARCH_MEMORY: &str = "search_memory";

pub fn deep_search() -> ToolDefinition {
    ToolDefinition::new(
        DEEP_SEARCH,
        "Run a multi-step exploration of the workspace and return accumulated findings. \
         Use for questions that need several searches to answer.",
    )
    .with_parameter(ToolParameter::new(
        "query",
        "What to find out, stated as a question",
        true,
    ))
}

pub fn submit_decision() -> ToolDefinition {
    ToolDefinition::new(
        SUBMIT_DECISION,
        "Record your decision for this phase. Call once, before your final answer.",
    )
    .with_parameter(
        ToolParameter::new("decision", "Your verdict", true).with_allowed(&[
            "approve",
            "veto",
            "negotiate",
            "inform",
        ]),
    )
    .with_parameter(ToolParameter::new(
        "reason",
        "One or two sentences justifying the verdict",
        true,
    ))
    .with_parameter(
        ToolParameter::new("veto_level", "Severity when vetoing", false).with_allowed(&[
            "advisory",
            "strong",
            "absolute",
        ]),
    )
}

pub fn search_memory() -> ToolDefinition {
    ToolDefinition::new(
        SEARCH_MEMORY,
        "Search project memory (notes, decisions, conventions) for relevant snippets.",
    )
    .with_parameter(ToolParameter::new("query", "Keywords to look for", true))
    .with_parameter(ToolParameter::new(
        "scope",
        "Memory scope, defaults to the project",
        false,
    ))
}
