//! Camera worker lifecycle state.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle of one camera worker.
///
/// `Idle -> Starting -> Running -> Stopping -> Stopped`, with
/// `Starting -> Failed` when the source cannot be opened. `Stopped` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        }
    }

    /// The boolean projection exposed to the registry.
    pub fn is_running(&self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_projection() {
        assert!(WorkerState::Starting.is_running());
        assert!(WorkerState::Running.is_running());
        assert!(!WorkerState::Idle.is_running());
        assert!(!WorkerState::Stopping.is_running());
        assert!(!WorkerState::Failed.is_running());
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkerState::Stopped.is_terminal());
        assert!(WorkerState::Failed.is_terminal());
        assert!(!WorkerState::Running.is_terminal());
    }
}
