//! The turn loop: user input, model requests, tool rounds.

use std::sync::Arc;

use futures_util::StreamExt;
use parley_common::new_correlation_id;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::assembler::{AssemblerOutput, StreamAssembler};
use crate::backend::{ModelRequest, ModelResponse};
use crate::conversation::Turn;
use crate::display::{format_tool_args, DisplaySink, NullSink};
use crate::error::{OrchestratorError, ToolError};
use crate::invoker::error_fragment;
use crate::provider::ToolSession;
use crate::AiError;

use super::command::{bind_arguments, parse_command, prompt_messages_to_turns, SlashCommand};
use super::mentions::{document_uri, extract_mentions, wrap_with_context, DOCUMENT_INDEX_URI};
use super::{Orchestrator, OrchestratorState};

/// How a user request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The model produced a final answer.
    Answer { text: String, tool_rounds: u32 },
    /// A `/command` loaded prompt turns into the conversation; the model
    /// was not called.
    PromptLoaded { command: String, turns: usize },
}

impl ChatOutcome {
    /// The answer text, empty for loaded prompts.
    pub fn text(&self) -> &str {
        match self {
            ChatOutcome::Answer { text, .. } => text,
            ChatOutcome::PromptLoaded { .. } => "",
        }
    }
}

impl Orchestrator {
    /// Handle one user input and wait for the complete answer.
    pub async fn chat(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        self.handle(input, false, &mut NullSink, cancel).await
    }

    /// Like [`chat`](Self::chat), but streams the model's output into
    /// `sink` as it arrives.
    pub async fn chat_streaming(
        &mut self,
        input: &str,
        sink: &mut dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        self.handle(input, true, sink, cancel).await
    }

    async fn handle(
        &mut self,
        input: &str,
        streaming: bool,
        sink: &mut dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let span = info_span!("chat", conversation = %self.id, request = %new_correlation_id());
        let result = self
            .dispatch(input, streaming, sink, cancel)
            .instrument(span)
            .await;

        self.state = match &result {
            Ok(ChatOutcome::Answer { .. }) => OrchestratorState::Final,
            _ => OrchestratorState::AwaitingUserInput,
        };
        result
    }

    async fn dispatch(
        &mut self,
        input: &str,
        streaming: bool,
        sink: &mut dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        if input.trim().is_empty() {
            return Ok(ChatOutcome::Answer {
                text: String::new(),
                tool_rounds: 0,
            });
        }

        if let Some(session) = self.prompt_session.clone() {
            if let Some(command) = parse_command(input) {
                return self.load_prompt(session, command).await;
            }
        }

        let text = self.expand_mentions(input).await;
        self.store.append(Turn::user(text))?;
        self.run_loop(streaming, sink, cancel).await
    }

    /// SENDING / TOOL_ROUND until the model answers without tools.
    async fn run_loop(
        &mut self,
        streaming: bool,
        sink: &mut dyn DisplaySink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let mut rounds: u32 = 0;

        loop {
            self.state = OrchestratorState::Sending;
            self.refresh_tools().await;

            let request = ModelRequest {
                turns: self.store.snapshot(),
                catalog: self.registry.catalog(),
                system: self.system_prompt.clone(),
            };
            debug!(
                turns = request.turns.len(),
                tools = request.catalog.len(),
                streaming,
                "Sending to backend"
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Request cancelled while waiting for the model");
                    return Err(OrchestratorError::Cancelled);
                }
                response = self.receive(&request, streaming, &mut *sink) => response?,
            };
            self.tracker.record(&response.usage);

            if response.content.is_empty() {
                warn!(stop_reason = ?response.stop_reason, "Model returned no content");
                return Ok(ChatOutcome::Answer {
                    text: String::new(),
                    tool_rounds: rounds,
                });
            }

            let calls = response.tool_uses();
            let text = response.text();
            self.store.append(Turn::assistant(response.content))?;

            if calls.is_empty() {
                info!(tool_rounds = rounds, "Final answer");
                return Ok(ChatOutcome::Answer {
                    text,
                    tool_rounds: rounds,
                });
            }

            if rounds >= self.max_tool_rounds {
                warn!(limit = self.max_tool_rounds, "Tool round limit reached");
                let limit_error = ToolError::RoundLimit(self.max_tool_rounds);
                let results = calls
                    .iter()
                    .map(|call| error_fragment(&call.id, &limit_error))
                    .collect();
                self.store.append(Turn::tool_results(results))?;
                return Err(OrchestratorError::MaxToolRounds {
                    limit: self.max_tool_rounds,
                });
            }

            rounds += 1;
            self.state = OrchestratorState::ToolRound;
            debug!(round = rounds, calls = calls.len(), "Tool round");

            let results = self
                .invoker
                .invoke_all(&self.registry, &calls, cancel)
                .await;
            self.store.append(Turn::tool_results(results))?;
            info!(round = rounds, calls = calls.len(), "Tool round complete");

            if cancel.is_cancelled() {
                info!(round = rounds, "Request cancelled during tool round");
                return Err(OrchestratorError::Cancelled);
            }
        }
    }

    /// One model response, either in one piece or reassembled from events.
    async fn receive(
        &self,
        request: &ModelRequest,
        streaming: bool,
        sink: &mut dyn DisplaySink,
    ) -> Result<ModelResponse, OrchestratorError> {
        if !streaming {
            return Ok(self.backend.generate(request).await?);
        }

        let mut events = self.backend.stream(request).await?;
        let mut assembler = StreamAssembler::new();

        while let Some(event) = events.next().await {
            match assembler.process(event?) {
                Some(AssemblerOutput::Text(chunk)) => sink.on_text(&chunk),
                Some(AssemblerOutput::ToolCall(call)) => {
                    sink.on_tool_call(&call.name, &format_tool_args(&call.input))
                }
                None => {}
            }
            if assembler.is_finished() {
                break;
            }
        }

        if !assembler.is_finished() {
            return Err(AiError::NetworkError("stream ended before message_stop".into()).into());
        }
        Ok(assembler.finish())
    }

    /// Fetch a prompt template and append its messages as turns.
    async fn load_prompt(
        &mut self,
        session: Arc<dyn ToolSession>,
        command: SlashCommand,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let declared = match session.list_prompts().await {
            Ok(prompts) => prompts.into_iter().find(|p| p.name == command.name),
            Err(e) => {
                warn!(error = %e, "Could not list prompts, binding arguments by default");
                None
            }
        };
        let args = bind_arguments(&command, declared.as_ref(), &self.default_prompt_argument);

        debug!(command = %command.name, ?args, "Loading prompt");
        let messages = session
            .get_prompt(&command.name, &args)
            .await
            .map_err(OrchestratorError::Prompt)?;

        let turns = prompt_messages_to_turns(messages);
        let count = turns.len();
        for turn in turns {
            self.store.append(turn)?;
        }

        info!(command = %command.name, turns = count, "Prompt loaded");
        Ok(ChatOutcome::PromptLoaded {
            command: command.name,
            turns: count,
        })
    }

    /// Inline the content of `@mentioned` documents. Falls back to the
    /// plain input when nothing is mentioned or fetching fails.
    async fn expand_mentions(&self, input: &str) -> String {
        let Some(session) = self.resource_session.as_ref().filter(|_| self.resource_mentions) else {
            return input.to_string();
        };

        let mentions = extract_mentions(input);
        if mentions.is_empty() {
            return input.to_string();
        }

        match fetch_documents(session.as_ref(), &mentions).await {
            Ok(documents) if documents.is_empty() => input.to_string(),
            Ok(documents) => {
                debug!(documents = documents.len(), "Attached mentioned documents");
                wrap_with_context(input, &documents)
            }
            Err(e) => {
                warn!(error = %e, "Could not fetch mentioned documents");
                input.to_string()
            }
        }
    }
}

/// Content of every mentioned document that exists, in index order.
async fn fetch_documents(
    session: &dyn ToolSession,
    mentions: &[String],
) -> Result<Vec<(String, String)>, crate::SessionError> {
    let index = session.read_resource(DOCUMENT_INDEX_URI).await?;
    let ids: Vec<String> = serde_json::from_str(&index.text).map_err(|e| {
        crate::SessionError::Protocol(format!("document index is not a list of ids: {e}"))
    })?;

    let mut documents = Vec::new();
    for id in ids.into_iter().filter(|id| mentions.contains(id)) {
        let content = session.read_resource(&document_uri(&id)).await?;
        documents.push((id, content.text));
    }
    Ok(documents)
}
