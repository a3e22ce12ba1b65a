//! Tool catalog aggregated across tool-provider sessions.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::{SessionError, ToolError};
use crate::provider::{ToolDescriptor, ToolSession};

/// A tool name advertised by more than one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCollision {
    pub tool: String,
    /// Session that owns the tool.
    pub kept: String,
    /// Session whose advertisement was ignored.
    pub shadowed: String,
}

/// A session whose `list_tools` failed during refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreachableSession {
    pub session: String,
    pub error: SessionError,
}

/// What happened during the last refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub collisions: Vec<ToolCollision>,
    pub unreachable: Vec<UnreachableSession>,
}

struct Entry {
    descriptor: ToolDescriptor,
    session: Arc<dyn ToolSession>,
}

/// Maps every advertised tool name to exactly one owning session.
///
/// When two sessions advertise the same name, the one registered first
/// wins. The catalog keeps registration order, then each session's own
/// listing order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the catalog from the given sessions.
    ///
    /// Listings are fetched concurrently but folded in registration order,
    /// so the result is the same no matter which session answers first.
    /// Sessions that fail to list are skipped for this refresh.
    pub async fn refresh(&mut self, sessions: &[Arc<dyn ToolSession>]) -> RefreshReport {
        let listings = join_all(sessions.iter().map(|s| s.list_tools())).await;

        let mut entries: Vec<Entry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut report = RefreshReport::default();

        for (session, listing) in sessions.iter().zip(listings) {
            let tools = match listing {
                Ok(tools) => tools,
                Err(error) => {
                    warn!(session = %session.name(), %error, "Skipping unreachable tool session");
                    report.unreachable.push(UnreachableSession {
                        session: session.name().to_string(),
                        error,
                    });
                    continue;
                }
            };

            for descriptor in tools {
                if let Some(&existing) = index.get(&descriptor.name) {
                    let kept = entries[existing].session.name().to_string();
                    warn!(
                        tool = %descriptor.name,
                        kept = %kept,
                        shadowed = %session.name(),
                        "Duplicate tool name, keeping first registration"
                    );
                    report.collisions.push(ToolCollision {
                        tool: descriptor.name,
                        kept,
                        shadowed: session.name().to_string(),
                    });
                    continue;
                }
                index.insert(descriptor.name.clone(), entries.len());
                entries.push(Entry {
                    descriptor,
                    session: Arc::clone(session),
                });
            }
        }

        debug!(
            tools = entries.len(),
            sessions = sessions.len(),
            "Tool catalog refreshed"
        );
        self.entries = entries;
        self.index = index;
        report
    }

    /// Session that owns `name`.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn ToolSession>, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i].session)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Every available tool, in catalog order.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].session.name())
    }

    /// Tool name to owning session name, in catalog order.
    pub fn mapping(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| (e.descriptor.name.clone(), e.session.name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.mapping())
            .finish()
    }
}
