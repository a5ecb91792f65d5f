//! OpenAI-compatible Chat Completions adapter.
//!
//! Works against OpenAI itself and the many servers that mimic its API
//! (Ollama, vLLM, LM Studio, OpenRouter, Azure with a deployment URL).

use super::{api_key, http_client, send_error, status_error, visible_text};
use crate::config::FileProviderConfig;
use async_trait::async_trait;
use conclave_application::ports::chat_provider::{ChatProvider, ProviderError};
use conclave_domain::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, ProviderId, TokenUsage, ToolCall,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

/// Models that reject `max_tokens` and want `max_completion_tokens`.
const COMPLETION_TOKEN_PREFIXES: &[&str] = &["gpt-5", "o1", "o3", "o4"];

pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: impl Into<ProviderId>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(config: &FileProviderConfig) -> Result<Self, super::ProviderBuildError> {
        let mut provider = Self::new(
            config.name.trim(),
            config.base_url(),
            api_key(config)?,
            config.model.clone(),
        );
        provider.client = http_client(config)?;
        Ok(provider)
    }

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &ChatRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().map(wire_message));

        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(max_tokens) = request.max_tokens {
            body[token_param(model)] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters_schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }

    /// Parse a Chat Completions response.
    pub fn parse_response(body: &Value) -> Result<ChatResponse, ProviderError> {
        let choice = body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| ProviderError::InvalidResponse("missing choices".to_string()))?;
        let message = choice.get("message").ok_or_else(|| {
            ProviderError::InvalidResponse("missing message in choice".to_string())
        })?;

        let raw = message.get("content").and_then(|c| c.as_str()).unwrap_or("");
        let tool_calls: Vec<ToolCall> = message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
            .unwrap_or_default();

        let mut response = ChatResponse::text(visible_text(raw)).with_tool_calls(tool_calls);
        response.model = body.get("model").and_then(|m| m.as_str()).map(String::from);
        response.usage = body.get("usage").map(|u| {
            TokenUsage::new(
                count(u, "prompt_tokens"),
                count(u, "completion_tokens"),
            )
        });
        Ok(response)
    }
}

fn count(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn token_param(model: &str) -> &'static str {
    if COMPLETION_TOKEN_PREFIXES.iter().any(|p| model.starts_with(p)) {
        "max_completion_tokens"
    } else {
        "max_tokens"
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        ChatRole::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    let arguments = serde_json::to_string(&call.arguments)
                        .unwrap_or_else(|_| "{}".to_string());
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.tool_name,
                            "arguments": arguments,
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        ChatRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

/// Malformed argument strings become an empty argument map; the tool
/// reports the missing arguments back to the agent.
fn parse_tool_call(value: &Value) -> Option<ToolCall> {
    let function = value.get("function")?;
    let name = function.get("name")?.as_str()?;
    let arguments: HashMap<String, Value> = function
        .get("arguments")
        .and_then(|a| a.as_str())
        .and_then(|a| serde_json::from_str(a).ok())
        .unwrap_or_default();

    let mut call = ToolCall::new(name);
    if let Some(id) = value.get("id").and_then(|i| i.as_str()) {
        call = call.with_id(id);
    }
    call.arguments = arguments;
    Some(call)
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} ({} messages)", url, request.messages.len());

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &headers, &text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;
        Self::parse_response(&body)
    }
}
