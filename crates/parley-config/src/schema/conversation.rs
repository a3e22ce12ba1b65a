//! Conversation loop configuration types.

use serde::{Deserialize, Serialize};

/// Tool-calling loop and input handling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum model/tool round trips per user input (valid range: 1-100).
    pub max_tool_rounds: u32,
    /// Render model output incrementally as it arrives.
    pub streaming: bool,
    /// Run the tool calls of one assistant turn concurrently across
    /// sessions. Calls on the same session always run in order.
    pub parallel_tools: bool,
    /// Per tool call timeout in seconds (valid range: 1-3600).
    pub tool_timeout_secs: u64,
    /// Argument name a bare `/command value` binds to when the prompt
    /// declares no arguments of its own.
    pub default_prompt_argument: String,
    /// Expand `@document` mentions from the resource session.
    pub resource_mentions: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 10,
            streaming: true,
            parallel_tools: true,
            tool_timeout_secs: 60,
            default_prompt_argument: "doc_id".into(),
            resource_mentions: true,
        }
    }
}
