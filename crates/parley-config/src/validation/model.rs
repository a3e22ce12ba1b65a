//! Model section validation (model name, max_tokens, temperature).

use crate::schema::ParleyConfig;

use super::helpers::{validate_range, validate_range_f64};

pub(crate) fn validate_model(errors: &mut Vec<String>, config: &ParleyConfig) {
    if config.model.model.trim().is_empty() {
        errors.push("model.model must not be empty".into());
    }
    validate_range(errors, "model.max_tokens", config.model.max_tokens.into(), 1, 64_000);
    validate_range_f64(
        errors,
        "model.temperature",
        config.model.temperature,
        0.0,
        1.0,
    );
}
