//! Error types for the conversation engine.
//!
//! - `SessionError`: a tool-provider session failed an operation
//! - `ToolError`: a single tool invocation failed; always recovered into
//!   an error result inside the conversation
//! - `ConversationError`: a turn was structurally invalid
//! - `OrchestratorError`: a user request could not be completed

use std::time::Duration;

use crate::conversation::Role;
use crate::AiError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session unreachable: {0}")]
    Unreachable(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Tool(String),
    #[error("{0} not supported by this session")]
    Unsupported(&'static str),
}

/// Why a tool invocation produced an error result. The `Display` text is
/// what the model sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("Error executing tool '{tool}': {message}")]
    ExecutionFault { tool: String, message: String },
    #[error("malformed input for tool '{tool}': {message}")]
    MalformedInput { tool: String, message: String },
    #[error("Error executing tool '{tool}': timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },
    #[error("cancelled")]
    Cancelled,
    #[error("tool round limit reached ({0})")]
    RoundLimit(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("{role:?} turn has no content")]
    EmptyTurn { role: Role },
    #[error("{role:?} turn cannot contain a {fragment} fragment")]
    UnexpectedFragment { role: Role, fragment: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] AiError),
    #[error("tool round limit of {limit} reached")]
    MaxToolRounds { limit: u32 },
    #[error("cancelled")]
    Cancelled,
    #[error("prompt request failed: {0}")]
    Prompt(#[source] SessionError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}
