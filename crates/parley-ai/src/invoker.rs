//! Executes pending tool invocations against their owning sessions.
//!
//! Every failure is folded into an error `ToolResult` fragment so the
//! model can see it and adapt. Nothing here aborts the conversation.

use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{Fragment, PendingInvocation, ToolResultStatus};
use crate::error::ToolError;
use crate::provider::ToolOutput;
use crate::registry::ToolRegistry;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ToolInvoker {
    timeout: Duration,
    parallel: bool,
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvoker {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            parallel: true,
        }
    }

    /// Upper bound on a single `call_tool`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the invocations of one round concurrently across sessions.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Run one invocation and turn the outcome into a result fragment.
    pub async fn invoke(&self, registry: &ToolRegistry, call: &PendingInvocation) -> Fragment {
        match self.execute(registry, call).await {
            Ok(output) => success_fragment(&call.id, &output),
            Err(err) => {
                warn!(tool = %call.name, id = %call.id, error = %err, "Tool invocation failed");
                error_fragment(&call.id, &err)
            }
        }
    }

    /// Run every invocation of a round. Results come back in the order of
    /// `calls`, whatever order they complete in.
    ///
    /// In parallel mode each session gets one lane: calls owned by the same
    /// session run one at a time in request order, distinct sessions run
    /// concurrently. Once `cancel` fires, calls still in flight (and any not
    /// yet started) resolve to a "cancelled" error result.
    pub async fn invoke_all(
        &self,
        registry: &ToolRegistry,
        calls: &[PendingInvocation],
        cancel: &CancellationToken,
    ) -> Vec<Fragment> {
        if !self.parallel {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoke_or_cancel(registry, call, cancel).await);
            }
            return results;
        }

        let lanes = session_lanes(registry, calls);
        debug!(calls = calls.len(), lanes = lanes.len(), "Invoking tool round");

        let finished = join_all(lanes.iter().map(|indices| async move {
            let mut out = Vec::with_capacity(indices.len());
            for &i in indices {
                out.push((i, self.invoke_or_cancel(registry, &calls[i], cancel).await));
            }
            out
        }))
        .await;

        let mut slots: Vec<Option<Fragment>> = calls.iter().map(|_| None).collect();
        for (i, fragment) in finished.into_iter().flatten() {
            slots[i] = Some(fragment);
        }
        slots.into_iter().flatten().collect()
    }

    async fn invoke_or_cancel(
        &self,
        registry: &ToolRegistry,
        call: &PendingInvocation,
        cancel: &CancellationToken,
    ) -> Fragment {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(tool = %call.name, id = %call.id, "Tool invocation cancelled");
                error_fragment(&call.id, &ToolError::Cancelled)
            }
            fragment = self.invoke(registry, call) => fragment,
        }
    }

    async fn execute(
        &self,
        registry: &ToolRegistry,
        call: &PendingInvocation,
    ) -> Result<ToolOutput, ToolError> {
        let session = registry.resolve(&call.name)?;
        let input = normalize_input(call)?;

        info!(tool = %call.name, session = %session.name(), "Calling tool");

        match tokio::time::timeout(self.timeout, session.call_tool(&call.name, &input)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ToolError::ExecutionFault {
                tool: call.name.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(ToolError::TimedOut {
                tool: call.name.clone(),
                after: self.timeout,
            }),
        }
    }
}

/// Indices of `calls` grouped by owning session, each group in request
/// order. Unresolved tools share one lane; they fail without a session call.
fn session_lanes(registry: &ToolRegistry, calls: &[PendingInvocation]) -> Vec<Vec<usize>> {
    let mut lanes: Vec<(Option<&str>, Vec<usize>)> = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        let owner = registry.owner_of(&call.name);
        match lanes.iter_mut().find(|(o, _)| *o == owner) {
            Some((_, indices)) => indices.push(i),
            None => lanes.push((owner, vec![i])),
        }
    }
    lanes.into_iter().map(|(_, indices)| indices).collect()
}

/// A missing input means "no arguments". Anything that is not an object
/// never reaches the session.
fn normalize_input(call: &PendingInvocation) -> Result<Value, ToolError> {
    match &call.input {
        Value::Object(_) => Ok(call.input.clone()),
        Value::Null => Ok(json!({})),
        Value::String(raw) => Err(ToolError::MalformedInput {
            tool: call.name.clone(),
            message: format!("arguments are not valid JSON: {raw}"),
        }),
        other => Err(ToolError::MalformedInput {
            tool: call.name.clone(),
            message: format!("expected a JSON object, got {other}"),
        }),
    }
}

fn success_fragment(tool_use_id: &str, output: &ToolOutput) -> Fragment {
    let content = serde_json::to_string(&output.text_items()).unwrap_or_else(|_| "[]".into());
    let status = if output.is_error {
        ToolResultStatus::Error
    } else {
        ToolResultStatus::Success
    };
    Fragment::tool_result(tool_use_id, content, status)
}

pub(crate) fn error_fragment(tool_use_id: &str, err: &ToolError) -> Fragment {
    let content = json!({ "error": err.to_string() }).to_string();
    Fragment::tool_result(tool_use_id, content, ToolResultStatus::Error)
}
