//! Append-only conversation log.

use std::collections::HashSet;

use crate::error::ConversationError;

use super::turn::{Fragment, Role, Turn};

/// Ordered log of sealed turns for one conversation.
///
/// Only the orchestrator appends; everything else reads.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal and append a turn. Prior turns are never touched.
    pub(crate) fn append(&mut self, turn: Turn) -> Result<(), ConversationError> {
        check_structure(&turn)?;
        self.turns.push(turn);
        Ok(())
    }

    /// The full ordered sequence of turns, for handing to a backend.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Ids of tool uses in the most recent assistant turn that have no
    /// matching result yet.
    pub fn unanswered_tool_uses(&self) -> Vec<String> {
        let Some(pos) = self.turns.iter().rposition(|t| t.role == Role::Assistant) else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.turns[pos + 1..]
            .iter()
            .flat_map(|t| t.content.iter())
            .filter_map(|f| match f {
                Fragment::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();

        self.turns[pos]
            .content
            .iter()
            .filter_map(|f| match f {
                Fragment::ToolUse { id, .. } if !answered.contains(id.as_str()) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

fn check_structure(turn: &Turn) -> Result<(), ConversationError> {
    if turn.content.is_empty() {
        return Err(ConversationError::EmptyTurn { role: turn.role });
    }

    for fragment in &turn.content {
        let allowed = match (turn.role, fragment) {
            (Role::User, Fragment::Text { .. }) => true,
            (Role::Assistant, Fragment::Text { .. } | Fragment::ToolUse { .. }) => true,
            (Role::ToolResult, Fragment::ToolResult { .. }) => true,
            _ => false,
        };
        if !allowed {
            return Err(ConversationError::UnexpectedFragment {
                role: turn.role,
                fragment: fragment.kind(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolResultStatus;
    use serde_json::json;

    fn tool_use(id: &str) -> Fragment {
        Fragment::ToolUse {
            id: id.into(),
            name: "add".into(),
            input: json!({}),
        }
    }

    #[test]
    fn append_preserves_order() {
        let mut store = ConversationStore::new();
        store.append(Turn::user("hi")).unwrap();
        store
            .append(Turn::assistant(vec![Fragment::text("hello")]))
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].role, Role::User);
        assert_eq!(snapshot[1].text(), "hello");
    }

    #[test]
    fn rejects_empty_turn() {
        let mut store = ConversationStore::new();
        let err = store.append(Turn::assistant(Vec::new())).unwrap_err();
        assert_eq!(err, ConversationError::EmptyTurn { role: Role::Assistant });
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_misplaced_fragments() {
        let mut store = ConversationStore::new();

        let user_with_tool = Turn {
            role: Role::User,
            content: vec![tool_use("x")],
        };
        assert!(store.append(user_with_tool).is_err());

        let results_with_text = Turn::tool_results(vec![Fragment::text("oops")]);
        assert!(store.append(results_with_text).is_err());

        let assistant_with_result = Turn::assistant(vec![Fragment::tool_result(
            "x",
            "[]",
            ToolResultStatus::Success,
        )]);
        assert!(store.append(assistant_with_result).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn tracks_unanswered_tool_uses() {
        let mut store = ConversationStore::new();
        store.append(Turn::user("add things")).unwrap();
        store
            .append(Turn::assistant(vec![tool_use("a"), tool_use("b")]))
            .unwrap();
        assert_eq!(store.unanswered_tool_uses(), vec!["a", "b"]);

        store
            .append(Turn::tool_results(vec![
                Fragment::tool_result("a", "[\"3\"]", ToolResultStatus::Success),
                Fragment::tool_result("b", "[\"7\"]", ToolResultStatus::Success),
            ]))
            .unwrap();
        assert!(store.unanswered_tool_uses().is_empty());
    }
}
