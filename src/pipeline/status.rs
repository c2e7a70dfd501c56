use crate::collect::RejectedCandidate;
use crate::requirement::UnsatisfiedRequirement;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of one pipeline run: `Idle -> Running -> {Completed, Failed, Canceled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskResult {
    Succeeded,
    Failed {
        exit_code: i32,
    },
    /// Skipped by the requirement gate
    RequirementsUnsatisfied {
        unsatisfied: Vec<UnsatisfiedRequirement>,
    },
    Canceled,
    NotStarted,
}

impl TaskResult {
    pub(crate) fn from_exit_code(exit_code: i32, canceled: bool) -> Self {
        match exit_code {
            0 => TaskResult::Succeeded,
            _ if canceled => TaskResult::Canceled,
            code => TaskResult::Failed { exit_code: code },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskResult::Failed { .. } | TaskResult::RequirementsUnsatisfied { .. }
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskResult::Canceled | TaskResult::NotStarted)
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskResult::Succeeded => write!(f, "succeeded"),
            TaskResult::Failed { exit_code } => write!(f, "failed (exit code {})", exit_code),
            TaskResult::RequirementsUnsatisfied { unsatisfied } => {
                write!(f, "requirements unsatisfied ({})", unsatisfied.len())
            }
            TaskResult::Canceled => write!(f, "canceled"),
            TaskResult::NotStarted => write!(f, "not started"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: String,
    pub order: i32,
    /// The pipeline did not wait for this task before moving on
    pub background: bool,
    pub can_failure: bool,
    #[serde(flatten)]
    pub result: TaskResult,
    pub duration_ms: u64,
}

impl TaskOutcome {
    pub(crate) fn finish(&mut self, result: TaskResult, duration: Duration) {
        self.result = result;
        self.duration_ms = duration.as_millis() as u64;
    }

    /// A failure that decides the run, i.e. one not excused by `can_failure`
    pub fn is_blocking_failure(&self) -> bool {
        self.result.is_failure() && !self.can_failure
    }
}

/// Summary of a finished pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub id: Uuid,
    pub context: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<TaskOutcome>,
    pub rejected: Vec<RejectedCandidate>,
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }

    /// Process exit code for the CLI: 0 completed, 1 failed, 2 canceled
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Completed => 0,
            RunStatus::Failed => 1,
            RunStatus::Canceled => 2,
            RunStatus::Idle | RunStatus::Running => -1,
        }
    }
}
