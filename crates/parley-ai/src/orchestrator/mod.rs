//! Conversation orchestrator: the user-turn / model / tool-round loop.
//!
//! One `Orchestrator` owns one conversation. It is the only writer of the
//! conversation log, and its loop runs strictly sequentially (`&mut self`);
//! only the tool calls inside a single round may overlap.

mod chat;
mod command;
mod mentions;
mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parley_common::ConversationId;
use tracing::debug;

use crate::backend::ModelBackend;
use crate::conversation::ConversationStore;
use crate::error::SessionError;
use crate::invoker::ToolInvoker;
use crate::provider::{PromptInfo, ToolDescriptor, ToolSession};
use crate::registry::{RefreshReport, ToolRegistry};
use crate::token_tracker::TokenTracker;

pub use chat::ChatOutcome;
pub use state::OrchestratorState;

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 10;
const DEFAULT_PROMPT_ARGUMENT: &str = "doc_id";

pub struct Orchestrator {
    id: ConversationId,
    backend: Arc<dyn ModelBackend>,
    /// Tool sessions in registration order.
    sessions: Vec<Arc<dyn ToolSession>>,
    /// Serves `/command` prompts.
    prompt_session: Option<Arc<dyn ToolSession>>,
    /// Serves `@document` mentions.
    resource_session: Option<Arc<dyn ToolSession>>,
    registry: ToolRegistry,
    invoker: ToolInvoker,
    store: ConversationStore,
    tracker: TokenTracker,
    system_prompt: Option<String>,
    max_tool_rounds: u32,
    default_prompt_argument: String,
    resource_mentions: bool,
    state: OrchestratorState,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            id: ConversationId::new(),
            backend,
            sessions: Vec::new(),
            prompt_session: None,
            resource_session: None,
            registry: ToolRegistry::new(),
            invoker: ToolInvoker::new(),
            store: ConversationStore::new(),
            tracker: TokenTracker::new(),
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            default_prompt_argument: DEFAULT_PROMPT_ARGUMENT.to_string(),
            resource_mentions: true,
            state: OrchestratorState::default(),
        }
    }

    /// Register a tool session. Earlier registrations win name collisions.
    pub fn with_session(mut self, session: Arc<dyn ToolSession>) -> Self {
        self.sessions.push(session);
        self
    }

    pub fn with_sessions(mut self, sessions: impl IntoIterator<Item = Arc<dyn ToolSession>>) -> Self {
        self.sessions.extend(sessions);
        self
    }

    pub fn with_prompt_session(mut self, session: Arc<dyn ToolSession>) -> Self {
        self.prompt_session = Some(session);
        self
    }

    pub fn with_resource_session(mut self, session: Arc<dyn ToolSession>) -> Self {
        self.resource_session = Some(session);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn with_invoker(mut self, invoker: ToolInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    /// Argument name a command's first word binds to when its prompt
    /// declares no arguments.
    pub fn with_default_prompt_argument(mut self, name: impl Into<String>) -> Self {
        self.default_prompt_argument = name.into();
        self
    }

    pub fn with_resource_mentions(mut self, enabled: bool) -> Self {
        self.resource_mentions = enabled;
        self
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.store
    }

    pub fn tracker(&self) -> &TokenTracker {
        &self.tracker
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Tools offered to the model as of the last refresh.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.registry.catalog()
    }

    /// Re-read every session's catalog now.
    pub async fn refresh_tools(&mut self) -> RefreshReport {
        let report = self.registry.refresh(&self.sessions).await;
        debug!(
            conversation = %self.id,
            tools = self.registry.len(),
            collisions = report.collisions.len(),
            unreachable = report.unreachable.len(),
            "Tools refreshed"
        );
        report
    }

    /// Prompts available as `/commands`.
    pub async fn list_prompts(&self) -> Result<Vec<PromptInfo>, SessionError> {
        match &self.prompt_session {
            Some(session) => session.list_prompts().await,
            None => Ok(Vec::new()),
        }
    }
}
