//! Model backend configuration types.

use serde::{Deserialize, Serialize};

/// Which model to talk to and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    /// Maximum output tokens per response (valid range: 1-64000).
    pub max_tokens: u32,
    /// Sampling temperature (valid range: 0.0-1.0).
    pub temperature: f64,
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 8000,
            temperature: 1.0,
            system_prompt: None,
        }
    }
}
