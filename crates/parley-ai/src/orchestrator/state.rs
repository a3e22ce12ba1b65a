use std::fmt;

/// Where the orchestrator is in its turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    AwaitingUserInput,
    Sending,
    ToolRound,
    Final,
}

impl OrchestratorState {
    /// Whether a new user request may start.
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            OrchestratorState::AwaitingUserInput | OrchestratorState::Final
        )
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchestratorState::AwaitingUserInput => "awaiting_user_input",
            OrchestratorState::Sending => "sending",
            OrchestratorState::ToolRound => "tool_round",
            OrchestratorState::Final => "final",
        };
        f.write_str(s)
    }
}
