//! Live output sink for streamed replies.

use serde_json::Value;

/// Receives output as it is produced during a streamed reply.
pub trait DisplaySink: Send {
    /// A text delta, in arrival order.
    fn on_text(&mut self, chunk: &str);

    /// A tool call whose arguments have fully arrived.
    fn on_tool_call(&mut self, tool_name: &str, formatted_args: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn on_text(&mut self, _chunk: &str) {}

    fn on_tool_call(&mut self, _tool_name: &str, _formatted_args: &str) {}
}

/// Pretty-print tool arguments. Arguments that failed to parse are carried
/// as a raw string and shown as-is.
pub fn format_tool_args(input: &Value) -> String {
    match input {
        Value::String(raw) => raw.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
