//! Conversation section validation.

use crate::schema::ParleyConfig;

use super::helpers::validate_range;

pub(crate) fn validate_conversation(errors: &mut Vec<String>, config: &ParleyConfig) {
    let conv = &config.conversation;
    validate_range(
        errors,
        "conversation.max_tool_rounds",
        conv.max_tool_rounds.into(),
        1,
        100,
    );
    validate_range(
        errors,
        "conversation.tool_timeout_secs",
        conv.tool_timeout_secs,
        1,
        3600,
    );
    let arg = conv.default_prompt_argument.trim();
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        errors.push(format!(
            "conversation.default_prompt_argument = {:?} must be a single non-empty word",
            conv.default_prompt_argument
        ));
    }
}
