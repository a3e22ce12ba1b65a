//! Decoding Messages API SSE payloads into stream events.

use serde_json::Value;
use tracing::debug;

use crate::assembler::{BlockDelta, BlockKind, StreamEvent};
use crate::backend::StopReason;
use crate::streaming::SseEvent;
use crate::AiError;

/// Decode one SSE record. `Ok(None)` means the record carries nothing the
/// engine acts on (pings, unknown types).
pub(crate) fn decode_event(event: &SseEvent) -> Result<Option<StreamEvent>, AiError> {
    let data: Value = serde_json::from_str(&event.data)
        .map_err(|e| AiError::ParseError(format!("invalid SSE payload: {e}")))?;

    let event_type = event
        .event
        .as_deref()
        .or_else(|| data["type"].as_str())
        .unwrap_or("");

    let decoded = match event_type {
        "message_start" => StreamEvent::MessageStart {
            input_tokens: data["message"]["usage"]["input_tokens"]
                .as_u64()
                .unwrap_or(0),
        },
        "content_block_start" => {
            let block = &data["content_block"];
            let kind = match block["type"].as_str().unwrap_or("") {
                "text" => BlockKind::Text,
                "tool_use" => BlockKind::ToolUse {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                },
                other => BlockKind::Other(other.to_string()),
            };
            StreamEvent::BlockStart {
                index: index(&data)?,
                block: kind,
            }
        }
        "content_block_delta" => {
            let delta = &data["delta"];
            let delta = match delta["type"].as_str().unwrap_or("") {
                "text_delta" => BlockDelta::Text(delta["text"].as_str().unwrap_or_default().to_string()),
                "input_json_delta" => BlockDelta::InputJson(
                    delta["partial_json"].as_str().unwrap_or_default().to_string(),
                ),
                other => BlockDelta::Other(other.to_string()),
            };
            StreamEvent::BlockDelta {
                index: index(&data)?,
                delta,
            }
        }
        "content_block_stop" => StreamEvent::BlockStop {
            index: index(&data)?,
        },
        "message_delta" => StreamEvent::MessageDelta {
            stop_reason: data["delta"]["stop_reason"]
                .as_str()
                .map(StopReason::from_api),
            output_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0),
        },
        "message_stop" => StreamEvent::MessageStop,
        "error" => {
            let message = data["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error");
            return Err(match data["error"]["type"].as_str() {
                Some("rate_limit_error") => AiError::RateLimited,
                _ => AiError::ApiError(message.to_string()),
            });
        }
        "ping" => return Ok(None),
        other => {
            debug!(event = %other, "Ignoring unknown SSE event");
            return Ok(None);
        }
    };

    Ok(Some(decoded))
}

fn index(data: &Value) -> Result<usize, AiError> {
    data["index"]
        .as_u64()
        .map(|i| i as usize)
        .ok_or_else(|| AiError::ParseError("content block event without index".into()))
}
