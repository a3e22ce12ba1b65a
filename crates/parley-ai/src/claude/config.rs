//! Claude API client configuration.

use std::fmt;
use std::path::Path;

use crate::AiError;

pub(crate) const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// How the client authenticates with the Claude API.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Anthropic API key (`x-api-key` header).
    ApiKey(String),
    /// OAuth Bearer token (`Authorization: Bearer`).
    OAuth(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            Credential::OAuth(_) => f.write_str("OAuth([REDACTED])"),
        }
    }
}

impl Credential {
    /// Resolve credentials from the environment or Claude Code CLI files.
    ///
    /// Resolution order:
    /// 1. `ANTHROPIC_API_KEY` env var (API key auth)
    /// 2. `CLAUDE_CODE_OAUTH_TOKEN` env var (OAuth auth)
    /// 3. `~/.claude/.credentials.json` (OAuth, written by `claude auth login`)
    pub fn from_env() -> Result<Self, AiError> {
        let credentials_file = dirs::home_dir().map(|h| h.join(".claude").join(".credentials.json"));
        resolve(|key| std::env::var(key).ok(), credentials_file.as_deref())
    }
}

fn resolve(
    var: impl Fn(&str) -> Option<String>,
    credentials_file: Option<&Path>,
) -> Result<Credential, AiError> {
    if let Some(key) = var("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
        return Ok(Credential::ApiKey(key));
    }

    if let Some(token) = var("CLAUDE_CODE_OAUTH_TOKEN").filter(|t| !t.is_empty()) {
        return Ok(Credential::OAuth(token));
    }

    if let Some(token) = credentials_file.and_then(read_claude_credentials) {
        return Ok(Credential::OAuth(token));
    }

    Err(AiError::ApiError(
        "Claude API not configured. Set ANTHROPIC_API_KEY, \
         CLAUDE_CODE_OAUTH_TOKEN, or run `claude auth login`."
            .into(),
    ))
}

/// Read the OAuth access token from a Claude Code credentials file.
fn read_claude_credentials(path: &Path) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&data).ok()?;
    json.get("claudeAiOauth")?
        .get("accessToken")?
        .as_str()
        .map(|s| s.to_string())
}

/// Claude API client configuration.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub credential: Credential,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub api_url: String,
}

impl ClaudeConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8000,
            temperature: 1.0,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Config with credentials from [`Credential::from_env`].
    pub fn from_env() -> Result<Self, AiError> {
        Credential::from_env().map(Self::new)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at a different Messages endpoint (proxies, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}
