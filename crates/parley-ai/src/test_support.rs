//! In-memory tool sessions and a scripted backend for unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;

use crate::assembler::{BlockDelta, BlockKind, StreamAssembler, StreamEvent};
use crate::backend::{EventStream, ModelBackend, ModelRequest, ModelResponse, StopReason};
use crate::conversation::{Fragment, PendingInvocation};
use crate::display::DisplaySink;
use crate::error::SessionError;
use crate::provider::{
    PromptInfo, PromptMessage, ResourceContent, ToolDescriptor, ToolOutput, ToolSession,
};
use crate::{AiError, TokenUsage};

/// What a fake tool does when called.
#[derive(Debug, Clone)]
pub(crate) enum Behaviour {
    Reply(ToolOutput),
    Fail(SessionError),
    Delay(Duration, ToolOutput),
    Hang,
}

pub(crate) struct FakeSession {
    name: String,
    tools: Vec<(ToolDescriptor, Behaviour)>,
    list_delay: Option<Duration>,
    list_fails: bool,
    prompts: Vec<(PromptInfo, Vec<PromptMessage>)>,
    resources: HashMap<String, ResourceContent>,
    calls: Mutex<Vec<(String, Value)>>,
    completed: Mutex<Vec<String>>,
    prompt_requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl FakeSession {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            list_delay: None,
            list_fails: false,
            prompts: Vec::new(),
            resources: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            prompt_requests: Mutex::new(Vec::new()),
        }
    }

    /// A tool that answers `"<name> ok"`.
    pub(crate) fn with_tool(self, name: &str) -> Self {
        let reply = ToolOutput::text(format!("{name} ok"));
        self.with_tool_behaviour(name, Behaviour::Reply(reply))
    }

    pub(crate) fn with_tool_behaviour(mut self, name: &str, behaviour: Behaviour) -> Self {
        self.tools
            .push((ToolDescriptor::new(name, format!("{name} tool")), behaviour));
        self
    }

    pub(crate) fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub(crate) fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub(crate) fn with_prompt(mut self, info: PromptInfo, messages: Vec<PromptMessage>) -> Self {
        self.prompts.push((info, messages));
        self
    }

    pub(crate) fn with_resource(mut self, uri: &str, mime_type: &str, text: &str) -> Self {
        self.resources.insert(
            uri.to_string(),
            ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(mime_type.to_string()),
                text: text.to_string(),
            },
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Tool names in the order their calls finished.
    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn prompt_requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.prompt_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolSession for FakeSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.list_fails {
            return Err(SessionError::Unreachable("connection refused".into()));
        }
        Ok(self.tools.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn call_tool(&self, name: &str, input: &Value) -> Result<ToolOutput, SessionError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), input.clone()));

        let behaviour = self
            .tools
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| SessionError::Protocol(format!("unknown tool {name}")))?;

        let result = match behaviour {
            Behaviour::Reply(output) => Ok(output),
            Behaviour::Fail(err) => Err(err),
            Behaviour::Delay(delay, output) => {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
            Behaviour::Hang => std::future::pending().await,
        };
        self.completed.lock().unwrap().push(name.to_string());
        result
    }

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>, SessionError> {
        Ok(self.prompts.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn get_prompt(
        &self,
        name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<Vec<PromptMessage>, SessionError> {
        self.prompt_requests
            .lock()
            .unwrap()
            .push((name.to_string(), args.clone()));
        self.prompts
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, m)| m.clone())
            .ok_or_else(|| SessionError::Protocol(format!("unknown prompt {name}")))
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContent, SessionError> {
        self.resources
            .get(uri)
            .cloned()
            .ok_or_else(|| SessionError::Protocol(format!("unknown resource {uri}")))
    }
}

/// One scripted backend reply.
pub(crate) enum Scripted {
    Response(ModelResponse),
    /// Raw events; `generate` assembles them.
    Events(Vec<StreamEvent>),
    Fail(AiError),
    Hang,
    /// Streams these events, then never yields again.
    Stall(Vec<StreamEvent>),
}

/// Backend that replays a fixed script and records every request.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ModelRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Fail(AiError::ApiError("script exhausted".into())))
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, AiError> {
        match self.next(request) {
            Scripted::Response(response) => Ok(response),
            Scripted::Events(events) => {
                let mut assembler = StreamAssembler::new();
                for event in events {
                    assembler.process(event);
                }
                Ok(assembler.finish())
            }
            Scripted::Fail(err) => Err(err),
            Scripted::Hang | Scripted::Stall(_) => std::future::pending().await,
        }
    }

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, AiError> {
        let events = match self.next(request) {
            Scripted::Response(response) => response_events(&response),
            Scripted::Events(events) => events,
            Scripted::Fail(err) => return Err(err),
            Scripted::Hang => {
                return Ok(Box::pin(stream::pending::<Result<StreamEvent, AiError>>()))
            }
            Scripted::Stall(events) => {
                return Ok(Box::pin(
                    stream::iter(events.into_iter().map(Ok)).chain(stream::pending()),
                ))
            }
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// Collects everything shown during a streamed reply.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub(crate) texts: Vec<String>,
    pub(crate) tool_calls: Vec<(String, String)>,
}

impl DisplaySink for RecordingSink {
    fn on_text(&mut self, chunk: &str) {
        self.texts.push(chunk.to_string());
    }

    fn on_tool_call(&mut self, tool_name: &str, formatted_args: &str) {
        self.tool_calls
            .push((tool_name.to_string(), formatted_args.to_string()));
    }
}

pub(crate) fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        content: vec![Fragment::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// Response asking for the given `(id, name, input)` tool calls.
pub(crate) fn tool_response(calls: &[(&str, &str, Value)]) -> ModelResponse {
    ModelResponse {
        content: calls
            .iter()
            .map(|(id, name, input)| {
                PendingInvocation {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                }
                .into()
            })
            .collect(),
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// The event sequence a provider would stream for `response`, with text and
/// arguments split across two deltas each.
pub(crate) fn response_events(response: &ModelResponse) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::MessageStart {
        input_tokens: response.usage.input_tokens,
    }];

    for (index, fragment) in response.content.iter().enumerate() {
        match fragment {
            Fragment::Text { text } => {
                events.push(StreamEvent::BlockStart {
                    index,
                    block: BlockKind::Text,
                });
                let (a, b) = split_half(text);
                for part in [a, b].into_iter().filter(|p| !p.is_empty()) {
                    events.push(StreamEvent::BlockDelta {
                        index,
                        delta: BlockDelta::Text(part.to_string()),
                    });
                }
            }
            Fragment::ToolUse { id, name, input } => {
                events.push(StreamEvent::BlockStart {
                    index,
                    block: BlockKind::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                    },
                });
                let json = input.to_string();
                let (a, b) = split_half(&json);
                for part in [a, b] {
                    events.push(StreamEvent::BlockDelta {
                        index,
                        delta: BlockDelta::InputJson(part.to_string()),
                    });
                }
            }
            Fragment::ToolResult { .. } => continue,
        }
        events.push(StreamEvent::BlockStop { index });
    }

    events.push(StreamEvent::MessageDelta {
        stop_reason: Some(response.stop_reason.clone()),
        output_tokens: response.usage.output_tokens,
    });
    events.push(StreamEvent::MessageStop);
    events
}

fn split_half(s: &str) -> (&str, &str) {
    let mut mid = s.len() / 2;
    while !s.is_char_boundary(mid) {
        mid += 1;
    }
    s.split_at(mid)
}
