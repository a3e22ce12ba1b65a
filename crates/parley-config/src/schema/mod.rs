//! Configuration schema types for Parley.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults below.

mod conversation;
mod logging;
mod model;

pub use conversation::*;
pub use logging::*;
pub use model::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Parley.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub model: ModelConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}
