//! Turns and the typed fragments they carry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

/// One typed piece of a turn's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fragment {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        status: ToolResultStatus,
    },
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text { text: text.into() }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        status: ToolResultStatus,
    ) -> Self {
        Fragment::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            status,
        }
    }

    /// Short tag used in logs and validation errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Fragment::Text { .. } => "text",
            Fragment::ToolUse { .. } => "tool_use",
            Fragment::ToolResult { .. } => "tool_result",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Fragment::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A resolved, not yet executed request to call a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl From<PendingInvocation> for Fragment {
    fn from(call: PendingInvocation) -> Self {
        Fragment::ToolUse {
            id: call.id,
            name: call.name,
            input: call.input,
        }
    }
}

/// One sealed unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<Fragment>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Fragment::text(text)],
        }
    }

    pub fn assistant(content: Vec<Fragment>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(content: Vec<Fragment>) -> Self {
        Self {
            role: Role::ToolResult,
            content,
        }
    }

    /// Text fragments joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Fragment::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool-use requests carried by this turn, in order.
    pub fn tool_uses(&self) -> Vec<PendingInvocation> {
        self.content
            .iter()
            .filter_map(|f| match f {
                Fragment::ToolUse { id, name, input } => Some(PendingInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
