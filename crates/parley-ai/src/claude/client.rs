//! Claude API client struct, request building, and response parsing.

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

use crate::backend::{ModelRequest, ModelResponse, StopReason};
use crate::conversation::{Fragment, Role, ToolResultStatus, Turn};
use crate::provider::ToolDescriptor;
use crate::{AiError, TokenUsage};

use super::config::{ClaudeConfig, Credential};

pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API client.
pub struct ClaudeClient {
    pub(crate) config: ClaudeConfig,
    pub(crate) http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| AiError::NetworkError(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    /// Build auth headers for the configured credential.
    pub(crate) fn auth_headers(&self) -> Result<HeaderMap, AiError> {
        let invalid = |_: reqwest::header::InvalidHeaderValue| {
            AiError::ApiError("credential is not a valid header value".into())
        };

        let mut headers = HeaderMap::new();
        match &self.config.credential {
            Credential::ApiKey(key) => {
                headers.insert("x-api-key", HeaderValue::from_str(key).map_err(invalid)?);
            }
            Credential::OAuth(token) => {
                headers.insert(
                    "Authorization",
                    HeaderValue::from_str(&format!("Bearer {token}")).map_err(invalid)?,
                );
            }
        }
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        Ok(headers)
    }

    /// Build the JSON request body for the Messages API.
    pub(crate) fn build_request_body(&self, request: &ModelRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": to_claude_messages(&request.turns),
        });

        if let Some(ref system) = request.system {
            body["system"] = json!(system);
        }

        if !request.catalog.is_empty() {
            let tool_defs: Vec<_> = request.catalog.iter().map(to_claude_tool).collect();
            body["tools"] = json!(tool_defs);
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    /// Parse a non-streaming response.
    pub(crate) fn parse_response(&self, json: Value) -> Result<ModelResponse, AiError> {
        let blocks = json["content"]
            .as_array()
            .ok_or_else(|| AiError::ParseError("response has no content array".into()))?;

        let mut content = Vec::new();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    let text = block["text"].as_str().unwrap_or_default();
                    if !text.is_empty() {
                        content.push(Fragment::text(text));
                    }
                }
                Some("tool_use") => content.push(Fragment::ToolUse {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    input: block["input"].clone(),
                }),
                _ => {}
            }
        }

        let stop_reason = json["stop_reason"]
            .as_str()
            .map(StopReason::from_api)
            .unwrap_or_default();

        let usage = TokenUsage {
            input_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0),
        };

        Ok(ModelResponse {
            content,
            stop_reason,
            usage,
        })
    }
}

pub(crate) fn to_claude_tool(tool: &ToolDescriptor) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Map turns to API messages. Tool results travel in `user` messages, and
/// adjacent messages with the same role are merged.
fn to_claude_messages(turns: &[Turn]) -> Vec<Value> {
    let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for turn in turns {
        let role = match turn.role {
            Role::User | Role::ToolResult => "user",
            Role::Assistant => "assistant",
        };
        let blocks: Vec<Value> = turn.content.iter().map(to_claude_block).collect();

        match messages.last_mut() {
            Some((last_role, content)) if *last_role == role => content.extend(blocks),
            _ => messages.push((role, blocks)),
        }
    }

    messages
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect()
}

fn to_claude_block(fragment: &Fragment) -> Value {
    match fragment {
        Fragment::Text { text } => json!({ "type": "text", "text": text }),
        Fragment::ToolUse { id, name, input } => {
            // The API only accepts objects; malformed input was already
            // answered with an error result.
            let input = if input.is_object() {
                input.clone()
            } else {
                json!({})
            };
            json!({ "type": "tool_use", "id": id, "name": name, "input": input })
        }
        Fragment::ToolResult {
            tool_use_id,
            content,
            status,
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": *status == ToolResultStatus::Error,
        }),
    }
}
