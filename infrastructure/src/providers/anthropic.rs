//! Anthropic Messages API adapter.

use super::{api_key, http_client, send_error, status_error, visible_text};
use crate::config::FileProviderConfig;
use async_trait::async_trait;
use conclave_application::ports::chat_provider::{ChatProvider, ProviderError};
use conclave_domain::{ChatRequest, ChatResponse, ChatRole, ProviderId, TokenUsage, ToolCall};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: ProviderId,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    /// Sent when the request sets no limit; the API requires one.
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(
        id: impl Into<ProviderId>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(config: &FileProviderConfig) -> Result<Self, super::ProviderBuildError> {
        let mut provider = Self::new(
            config.name.trim(),
            config.base_url(),
            api_key(config)?,
            config.model.clone(),
            config.max_tokens,
        );
        provider.client = http_client(config)?;
        Ok(provider)
    }

    /// Build the JSON request body for the Messages API.
    ///
    /// System messages inside the conversation are folded into the
    /// top-level `system` field; consecutive tool results are merged into
    /// one user turn, as the API expects.
    pub fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut system: Vec<&str> = request.system_prompt.iter().map(String::as_str).collect();
        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role {
                ChatRole::System => system.push(&message.content),
                ChatRole::User => {
                    messages.push(json!({ "role": "user", "content": message.content }));
                }
                ChatRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({ "type": "text", "text": message.content }));
                    }
                    for call in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.tool_name,
                            "input": call.arguments,
                        }));
                    }
                    messages.push(json!({ "role": "assistant", "content": blocks }));
                }
                ChatRole::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.as_deref().unwrap_or_default(),
                        "content": message.content,
                    });
                    let merged = messages.last_mut().and_then(|last| {
                        let content = last.get_mut("content")?.as_array_mut()?;
                        let is_results = content
                            .first()
                            .is_some_and(|b| b["type"] == "tool_result");
                        is_results.then_some(content)
                    });
                    match merged {
                        Some(content) => content.push(block),
                        None => messages.push(json!({ "role": "user", "content": [block] })),
                    }
                }
            }
        }

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters_schema(),
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        body
    }

    /// Parse a Messages API response: text blocks are concatenated,
    /// `tool_use` blocks become tool calls.
    pub fn parse_response(body: &Value) -> Result<ChatResponse, ProviderError> {
        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("missing content array".to_string()))?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    let Some(name) = block.get("name").and_then(|n| n.as_str()) else {
                        continue;
                    };
                    let mut call = ToolCall::new(name);
                    if let Some(id) = block.get("id").and_then(|i| i.as_str()) {
                        call = call.with_id(id);
                    }
                    call.arguments = block
                        .get("input")
                        .cloned()
                        .and_then(|input| {
                            serde_json::from_value::<HashMap<String, Value>>(input).ok()
                        })
                        .unwrap_or_default();
                    calls.push(call);
                }
                _ => {}
            }
        }

        let mut response = ChatResponse::text(visible_text(&text)).with_tool_calls(calls);
        response.model = body.get("model").and_then(|m| m.as_str()).map(String::from);
        response.usage = body.get("usage").map(|u| {
            let count = |key: &str| u.get(key).and_then(Value::as_u64).unwrap_or(0);
            TokenUsage::new(count("input_tokens"), count("output_tokens"))
        });
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/messages", self.base_url);
        debug!("POST {} ({} messages)", url, request.messages.len());

        let mut builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
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
