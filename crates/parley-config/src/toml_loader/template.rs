//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Parley Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[model]
# model = "claude-sonnet-4-20250514"
# max_tokens = 8000        # 1-64000
# temperature = 1.0        # 0.0-1.0
# system_prompt = "You are a helpful assistant."

[conversation]
# max_tool_rounds = 10     # 1-100
# streaming = true
# parallel_tools = true
# tool_timeout_secs = 60   # 1-3600
# default_prompt_argument = "doc_id"
# resource_mentions = true

[logging]
# level = "INFO"           # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
