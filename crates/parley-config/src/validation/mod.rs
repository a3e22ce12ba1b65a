//! Full configuration validation.
//!
//! Each section has its own submodule; `validate` calls them all and
//! collects every error into a single `ConfigError`.

mod conversation;
mod helpers;
mod model;


use crate::schema::ParleyConfig;
use parley_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ParleyConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    model::validate_model(&mut errors, config);
    conversation::validate_conversation(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
