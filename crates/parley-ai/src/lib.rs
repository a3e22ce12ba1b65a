//! Conversation engine for Parley.
//!
//! Drives a model through multi-turn conversations in which it may call
//! tools hosted by any number of independent tool-provider sessions:
//! - Append-only conversation log with typed fragments
//! - Tool catalog aggregation across sessions with deterministic tie-breaks
//! - Tool invocation with failures folded back into the conversation
//! - Streaming reassembly of text and tool-call argument deltas
//! - A Claude (Anthropic Messages API) backend with SSE streaming

pub mod assembler;
pub mod backend;
pub mod claude;
pub mod conversation;
pub mod display;
pub mod error;
pub mod invoker;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod streaming;
pub mod token_tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use assembler::{AssemblerOutput, BlockDelta, BlockKind, StreamAssembler, StreamEvent};
pub use backend::{EventStream, ModelBackend, ModelRequest, ModelResponse, StopReason};
pub use claude::{ClaudeClient, ClaudeConfig, Credential};
pub use conversation::{
    ConversationStore, Fragment, PendingInvocation, Role, ToolResultStatus, Turn,
};
pub use display::{format_tool_args, DisplaySink, NullSink};
pub use error::{ConversationError, OrchestratorError, SessionError, ToolError};
pub use invoker::ToolInvoker;
pub use orchestrator::{ChatOutcome, Orchestrator, OrchestratorState};
pub use provider::{
    ContentItem, PromptArgument, PromptInfo, PromptMessage, PromptRole, ResourceContent,
    ToolDescriptor, ToolOutput, ToolSession,
};
pub use registry::{RefreshReport, ToolCollision, ToolRegistry, UnreachableSession};
pub use token_tracker::TokenTracker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Failures talking to a model backend.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout")]
    Timeout,
}
