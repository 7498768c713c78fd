//! Task execution model.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Mode a task runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// One full pass converging the destination toward the source.
    Sync,
    /// One pass over the destination removing entries gone at the source.
    Clean,
    /// Continuous interval-driven polling of source changes.
    Async,
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskMode::Sync => write!(f, "sync"),
            TaskMode::Clean => write!(f, "clean"),
            TaskMode::Async => write!(f, "async"),
        }
    }
}

/// Lifecycle state of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Report of one finished task pass.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Task name.
    pub task: String,
    pub mode: TaskMode,
    pub state: TaskState,
    /// Entries the pass examined.
    pub entries_seen: usize,
    /// Plans actually written to the destination.
    pub applied: usize,
    /// Entries that failed within the pass.
    pub entry_failures: usize,
    /// The task-level error, when the pass failed before or during entries.
    pub error: Option<EngineError>,
}

impl TaskOutcome {
    /// A pass that failed before touching any entry.
    pub fn failed(task: impl Into<String>, mode: TaskMode, error: EngineError) -> Self {
        Self {
            task: task.into(),
            mode,
            state: TaskState::Failed,
            entries_seen: 0,
            applied: 0,
            entry_failures: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == TaskState::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_display() {
        assert_eq!(TaskMode::Sync.to_string(), "sync");
        assert_eq!(TaskMode::Clean.to_string(), "clean");
        assert_eq!(TaskMode::Async.to_string(), "async");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = TaskOutcome::failed(
            "users",
            TaskMode::Async,
            EngineError::NotAsynchronous {
                task: "users".to_string(),
            },
        );
        assert!(!outcome.is_success());
        assert!(outcome.error.is_some());
    }
}
