//! Server-Sent Events (SSE) parser.
//!
//! The Messages API streams responses as SSE. This module splits a byte
//! stream into `event:`/`data:` records; decoding the JSON payloads is the
//! backend's job.

use std::ops::ControlFlow;

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;

use crate::AiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (e.g., "message_start", "content_block_delta").
    pub event: Option<String>,
    /// The event data (JSON string).
    pub data: String,
}

/// Parse an SSE stream from a reqwest response, calling `on_event` for each
/// event until the stream ends or the callback breaks.
pub async fn parse_sse_stream(
    response: reqwest::Response,
    on_event: impl FnMut(SseEvent) -> ControlFlow<()>,
) -> Result<(), AiError> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    parse_sse_lines(reader, on_event).await
}

/// Parse SSE records from any buffered reader.
pub async fn parse_sse_lines<R>(
    reader: R,
    mut on_event: impl FnMut(SseEvent) -> ControlFlow<()>,
) -> Result<(), AiError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    let mut current_event: Option<String> = None;
    let mut current_data = String::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AiError::NetworkError(e.to_string()))?
    {
        if line.is_empty() {
            // Empty line = end of event
            if !current_data.is_empty() {
                let event = SseEvent {
                    event: current_event.take(),
                    data: std::mem::take(&mut current_data),
                };
                if on_event(event).is_break() {
                    return Ok(());
                }
            }
            current_event = None;
            continue;
        }

        if let Some(event_type) = field(&line, "event") {
            current_event = Some(event_type.to_string());
        } else if let Some(data) = field(&line, "data") {
            if !current_data.is_empty() {
                current_data.push('\n');
            }
            current_data.push_str(data);
        }
        // Ignore other fields (id:, retry:, comments)
    }

    // Flush any remaining event
    if !current_data.is_empty() {
        let _ = on_event(SseEvent {
            event: current_event,
            data: current_data,
        });
    }

    Ok(())
}

/// `name: value` or `name:value`.
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
