//! Local document directory exposed as a tool session.
//!
//! Every regular file directly inside the directory is a document whose id
//! is its file name. The session offers tools to list and read documents,
//! prompts that work on one document, and the `docs://documents` resources
//! used for `@mentions`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parley_ai::{
    PromptArgument, PromptInfo, PromptMessage, ResourceContent, SessionError, ToolDescriptor,
    ToolOutput, ToolSession,
};
use serde_json::{json, Value};
use tracing::debug;

const INDEX_URI: &str = "docs://documents";

pub struct DocsSession {
    root: PathBuf,
}

impl DocsSession {
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn doc_ids(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                if !name.starts_with('.') {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read_doc(&self, id: &str) -> Result<String, SessionError> {
        let path = self.doc_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionError::Tool(format!("document not found: {id}")))
            }
            Err(e) => Err(SessionError::Tool(format!("cannot read {id}: {e}"))),
        }
    }

    /// Only plain file names inside the root are documents.
    fn doc_path(&self, id: &str) -> Result<PathBuf, SessionError> {
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(SessionError::Tool(format!("invalid document id: {id}")));
        }
        Ok(self.root.join(id))
    }
}

fn doc_id_argument(input: &Value) -> Result<&str, SessionError> {
    input["doc_id"]
        .as_str()
        .ok_or_else(|| SessionError::Tool("missing string argument 'doc_id'".into()))
}

fn doc_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "doc_id": { "type": "string", "description": description }
        },
        "required": ["doc_id"]
    })
}

fn doc_prompt(name: &str, description: &str) -> PromptInfo {
    PromptInfo {
        name: name.to_string(),
        description: Some(description.to_string()),
        arguments: vec![PromptArgument {
            name: "doc_id".into(),
            description: Some("Id of the document".into()),
            required: true,
        }],
    }
}

#[async_trait]
impl ToolSession for DocsSession {
    fn name(&self) -> &str {
        "docs"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        Ok(vec![
            ToolDescriptor::new("list_docs", "List the ids of all available documents"),
            ToolDescriptor::new(
                "read_doc_contents",
                "Read the contents of a document and return it as a string",
            )
            .with_input_schema(doc_id_schema("Id of the document to read")),
        ])
    }

    async fn call_tool(&self, name: &str, input: &Value) -> Result<ToolOutput, SessionError> {
        debug!(tool = %name, "Docs tool call");
        match name {
            "list_docs" => {
                let ids = self.doc_ids().await?;
                Ok(ToolOutput::text(json!(ids).to_string()))
            }
            "read_doc_contents" => {
                let id = doc_id_argument(input)?;
                Ok(ToolOutput::text(self.read_doc(id).await?))
            }
            other => Err(SessionError::Protocol(format!("unknown tool: {other}"))),
        }
    }

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>, SessionError> {
        Ok(vec![
            doc_prompt("summarize", "Summarize the contents of a document"),
            doc_prompt("format", "Rewrite a document in markdown"),
        ])
    }

    async fn get_prompt(
        &self,
        name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<Vec<PromptMessage>, SessionError> {
        let doc_id = args
            .get("doc_id")
            .ok_or_else(|| SessionError::Tool("missing argument 'doc_id'".into()))?;

        let text = match name {
            "summarize" => format!(
                "Summarize the document with id {doc_id}. Read it with the \
                 read_doc_contents tool, then answer with a short summary."
            ),
            "format" => format!(
                "Rewrite the document with id {doc_id} using markdown. Read it \
                 with the read_doc_contents tool and reply with the rewritten text."
            ),
            other => return Err(SessionError::Protocol(format!("unknown prompt: {other}"))),
        };
        Ok(vec![PromptMessage::user(text)])
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContent, SessionError> {
        if uri == INDEX_URI {
            let ids = self.doc_ids().await?;
            return Ok(ResourceContent {
                uri: uri.to_string(),
                mime_type: Some("application/json".into()),
                text: json!(ids).to_string(),
            });
        }

        let id = uri
            .strip_prefix(INDEX_URI)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| SessionError::Protocol(format!("unknown resource: {uri}")))?;
        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: Some("text/plain".into()),
            text: self.read_doc(id).await?,
        })
    }
}
