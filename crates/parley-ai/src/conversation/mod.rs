//! Conversation data model and the append-only turn log.

mod store;
mod turn;

pub use store::ConversationStore;
pub use turn::{Fragment, PendingInvocation, Role, ToolResultStatus, Turn};
