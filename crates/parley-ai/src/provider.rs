//! Tool-provider session contract.
//!
//! A session is an external collaborator that hosts callable tools,
//! prompt templates and readable resources. How it is spawned and how it
//! talks to its server is its own business; the engine only sees this
//! trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// A tool as advertised by its owning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name across the whole registry.
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input object.
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// One item of tool output or prompt content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        mime_type: String,
        data: String,
    },
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Raw result of `call_tool`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentItem>,
    /// Set by the tool itself to report a failure it handled.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
        }
    }

    /// Text items only, in order.
    pub fn text_items(&self) -> Vec<&str> {
        self.content.iter().filter_map(ContentItem::as_text).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Assistant,
}

/// One message of a rendered prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: Vec<ContentItem>,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: vec![ContentItem::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: vec![ContentItem::text(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt template a session can render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

/// Contents of a readable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: Option<String>,
    pub text: String,
}

impl ResourceContent {
    /// Parse the body as JSON when the resource says it is JSON.
    pub fn json(&self) -> Option<Value> {
        match self.mime_type.as_deref() {
            Some("application/json") => serde_json::from_str(&self.text).ok(),
            _ => None,
        }
    }
}

/// A connected tool-provider session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Stable name used in logs and collision reports.
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    /// `input` is always a JSON object.
    async fn call_tool(&self, name: &str, input: &Value) -> Result<ToolOutput, SessionError>;

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>, SessionError> {
        Ok(Vec::new())
    }

    async fn get_prompt(
        &self,
        name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<Vec<PromptMessage>, SessionError> {
        let _ = (name, args);
        Err(SessionError::Unsupported("prompts"))
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContent, SessionError> {
        let _ = uri;
        Err(SessionError::Unsupported("resources"))
    }
}
