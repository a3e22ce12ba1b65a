//! Anthropic Claude backend.
//!
//! Implements [`ModelBackend`](crate::ModelBackend) over the Anthropic
//! Messages API (https://api.anthropic.com/v1/messages), both as a single
//! request and as an SSE event stream.

mod api;
mod client;
mod config;
mod events;

pub use client::ClaudeClient;
pub use config::{ClaudeConfig, Credential};
