//! `/command arg...` input: parsing, argument binding, and conversion of
//! rendered prompts into turns.

use std::collections::BTreeMap;

use tracing::warn;

use crate::conversation::{Fragment, Role, Turn};
use crate::provider::{ContentItem, PromptInfo, PromptMessage, PromptRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlashCommand {
    pub name: String,
    pub positional: Vec<String>,
    pub named: BTreeMap<String, String>,
}

/// `None` for ordinary text, including a bare `/`.
pub(crate) fn parse_command(input: &str) -> Option<SlashCommand> {
    let mut words = input.trim().split_whitespace();
    let name = words.next()?.strip_prefix('/')?;
    if name.is_empty() {
        return None;
    }

    let mut positional = Vec::new();
    let mut named = BTreeMap::new();
    for word in words {
        match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                named.insert(key.to_string(), value.to_string());
            }
            _ => positional.push(word.to_string()),
        }
    }

    Some(SlashCommand {
        name: name.to_string(),
        positional,
        named,
    })
}

/// Bind positional words to the prompt's declared argument names, in
/// order. Without a declaration the first word binds to `default_arg`.
pub(crate) fn bind_arguments(
    command: &SlashCommand,
    declared: Option<&PromptInfo>,
    default_arg: &str,
) -> BTreeMap<String, String> {
    let mut args = command.named.clone();

    let names: Vec<&str> = match declared {
        Some(info) if !info.arguments.is_empty() => info
            .arguments
            .iter()
            .map(|a| a.name.as_str())
            .filter(|n| !args.contains_key(*n))
            .collect(),
        _ if args.contains_key(default_arg) => Vec::new(),
        _ => vec![default_arg],
    };

    if command.positional.len() > names.len() {
        warn!(
            command = %command.name,
            extra = command.positional.len() - names.len(),
            "Ignoring extra command arguments"
        );
    }

    for (name, value) in names.into_iter().zip(&command.positional) {
        args.insert(name.to_string(), value.clone());
    }

    if let Some(info) = declared {
        for missing in info
            .arguments
            .iter()
            .filter(|a| a.required && !args.contains_key(&a.name))
        {
            warn!(command = %command.name, argument = %missing.name, "Missing required argument");
        }
    }

    args
}

/// Role-for-role conversion keeping text only. Messages without text are
/// dropped.
pub(crate) fn prompt_messages_to_turns(messages: Vec<PromptMessage>) -> Vec<Turn> {
    messages
        .into_iter()
        .filter_map(|message| {
            let fragments: Vec<Fragment> = message
                .content
                .into_iter()
                .filter_map(|item| match item {
                    ContentItem::Text { text } if !text.is_empty() => Some(Fragment::Text { text }),
                    _ => None,
                })
                .collect();
            if fragments.is_empty() {
                return None;
            }
            Some(match message.role {
                PromptRole::User => Turn {
                    role: Role::User,
                    content: fragments,
                },
                PromptRole::Assistant => Turn::assistant(fragments),
            })
        })
        .collect()
}
