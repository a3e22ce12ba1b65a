//! Reassembly of incremental provider events into a complete response.
//!
//! The assembler is a plain synchronous state machine: feed it events in
//! arrival order through [`StreamAssembler::process`] and it hands back
//! text to show right away and tool calls once their argument stream has
//! closed. Nothing here knows about HTTP or SSE.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{ModelResponse, StopReason};
use crate::conversation::{Fragment, PendingInvocation};
use crate::TokenUsage;

/// One incremental provider event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        input_tokens: u64,
    },
    BlockStart {
        index: usize,
        block: BlockKind,
    },
    BlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    BlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: Option<StopReason>,
        output_tokens: u64,
    },
    MessageStop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
    /// Block types the engine does not act on (thinking, citations...).
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    Text(String),
    InputJson(String),
    Other(String),
}

/// Something the caller should act on now.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerOutput {
    Text(String),
    ToolCall(PendingInvocation),
}

#[derive(Debug)]
enum OpenBlock {
    Text(String),
    Tool {
        id: String,
        name: String,
        buffer: String,
    },
    Ignored,
}

/// Per-response stream state. Create one per streamed response.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    open: BTreeMap<usize, OpenBlock>,
    completed: BTreeMap<usize, Fragment>,
    /// Block indices in the order their start events arrived.
    started: Vec<usize>,
    text: String,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
    finished: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event.
    pub fn process(&mut self, event: StreamEvent) -> Option<AssemblerOutput> {
        if self.finished {
            warn!(?event, "Event after message stop, ignoring");
            return None;
        }

        match event {
            StreamEvent::MessageStart { input_tokens } => {
                self.usage.input_tokens = input_tokens;
                None
            }
            StreamEvent::BlockStart { index, block } => {
                self.start_block(index, block);
                None
            }
            StreamEvent::BlockDelta { index, delta } => self.apply_delta(index, delta),
            StreamEvent::BlockStop { index } => self.stop_block(index),
            StreamEvent::MessageDelta {
                stop_reason,
                output_tokens,
            } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason;
                }
                self.usage.output_tokens = output_tokens;
                None
            }
            StreamEvent::MessageStop => {
                if !self.open.is_empty() {
                    warn!(
                        blocks = self.open.len(),
                        "Message stopped with unclosed blocks, discarding them"
                    );
                    self.open.clear();
                }
                self.finished = true;
                None
            }
        }
    }

    fn start_block(&mut self, index: usize, block: BlockKind) {
        if self.started.contains(&index) {
            warn!(index, "Duplicate block start, ignoring");
            return;
        }
        self.started.push(index);
        let state = match block {
            BlockKind::Text => OpenBlock::Text(String::new()),
            BlockKind::ToolUse { id, name } => {
                debug!(index, tool = %name, "Tool call block started");
                OpenBlock::Tool {
                    id,
                    name,
                    buffer: String::new(),
                }
            }
            BlockKind::Other(kind) => {
                debug!(index, %kind, "Ignoring block");
                OpenBlock::Ignored
            }
        };
        self.open.insert(index, state);
    }

    fn apply_delta(&mut self, index: usize, delta: BlockDelta) -> Option<AssemblerOutput> {
        let Some(block) = self.open.get_mut(&index) else {
            warn!(index, "Delta for unknown block, ignoring");
            return None;
        };

        match (block, delta) {
            (OpenBlock::Text(buf), BlockDelta::Text(chunk)) => {
                buf.push_str(&chunk);
                self.text.push_str(&chunk);
                Some(AssemblerOutput::Text(chunk))
            }
            (OpenBlock::Tool { buffer, .. }, BlockDelta::InputJson(part)) => {
                buffer.push_str(&part);
                None
            }
            (OpenBlock::Ignored, _) | (_, BlockDelta::Other(_)) => None,
            (_, delta) => {
                warn!(index, ?delta, "Delta does not match block type, ignoring");
                None
            }
        }
    }

    fn stop_block(&mut self, index: usize) -> Option<AssemblerOutput> {
        let Some(block) = self.open.remove(&index) else {
            warn!(index, "Stop for unknown block, ignoring");
            return None;
        };

        match block {
            OpenBlock::Text(text) => {
                if !text.is_empty() {
                    self.completed.insert(index, Fragment::Text { text });
                }
                None
            }
            OpenBlock::Tool { id, name, buffer } => {
                let input = parse_arguments(&name, &buffer);
                let call = PendingInvocation { id, name, input };
                self.completed.insert(index, call.clone().into());
                Some(AssemblerOutput::ToolCall(call))
            }
            OpenBlock::Ignored => None,
        }
    }

    /// Whether the terminal event has arrived.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// All text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// The assembled response, content in block start order.
    pub fn finish(mut self) -> ModelResponse {
        let content = self
            .started
            .iter()
            .filter_map(|index| self.completed.remove(index))
            .collect();
        ModelResponse {
            content,
            stop_reason: self.stop_reason.unwrap_or_default(),
            usage: self.usage,
        }
    }
}

/// Empty arguments mean no arguments. Unparsable ones are kept raw so the
/// invoker can report them.
fn parse_arguments(tool: &str, buffer: &str) -> Value {
    if buffer.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(buffer) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = %tool, error = %e, "Malformed tool arguments in stream");
            Value::String(buffer.to_string())
        }
    }
}
