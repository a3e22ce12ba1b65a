//! Shared types for the Parley workspace: the top-level error taxonomy
//! and identifier helpers.

pub mod errors;
pub mod id;

pub use errors::{ConfigError, ParleyError};
pub use id::{new_correlation_id, new_id, ConversationId};
