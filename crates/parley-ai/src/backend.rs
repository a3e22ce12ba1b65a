//! Model backend contract.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::assembler::StreamEvent;
use crate::conversation::{Fragment, PendingInvocation, Turn};
use crate::provider::ToolDescriptor;
use crate::{AiError, TokenUsage};

/// Everything a backend needs for one round.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub turns: Vec<Turn>,
    pub catalog: Vec<ToolDescriptor>,
    pub system: Option<String>,
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn from_api(s: &str) -> Self {
        match s {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// A complete assistant response, streamed or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Text and tool-use fragments in block order.
    pub content: Vec<Fragment>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl ModelResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Fragment::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> Vec<PendingInvocation> {
        Turn::assistant(self.content.clone()).tool_uses()
    }

    pub fn wants_tools(&self) -> bool {
        self.content
            .iter()
            .any(|f| matches!(f, Fragment::ToolUse { .. }))
    }
}

/// Incremental provider events for one response, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, AiError>> + Send>>;

/// A language model that can be asked for the next assistant turn.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Stable identifier for logs and token accounting.
    fn name(&self) -> &str;

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, AiError>;

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, AiError>;
}
