//! Logging-based execution observer

use super::{ExecuteEvent, ExecuteObserver, LogLevel};
use crate::pipeline::RunStatus;
use tracing::{debug, error, info, warn};

/// Observer that logs execution events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ExecuteObserver for LoggingObserver {
    fn on_event(&self, event: &ExecuteEvent) {
        match event {
            ExecuteEvent::PipelineStarted { context, tasks } => {
                info!(context = %context, tasks, "Starting pipeline");
            }
            ExecuteEvent::TaskStarted { task, order } => {
                info!(task = %task, order, "Starting task");
            }
            ExecuteEvent::Log {
                source,
                level,
                message,
            } => match level {
                LogLevel::Info => info!(source = %source, "{}", message),
                LogLevel::Warning => warn!(source = %source, "{}", message),
                LogLevel::Error => error!(source = %source, "{}", message),
            },
            ExecuteEvent::RequirementsUnsatisfied { task, unsatisfied } => {
                for requirement in unsatisfied {
                    warn!(
                        task = %task,
                        requirement = %requirement.name,
                        reason = %requirement.message,
                        "Requirement not satisfied"
                    );
                }
            }
            ExecuteEvent::TaskFinished {
                task,
                exit_code,
                duration,
            } => {
                if *exit_code == 0 {
                    info!(
                        task = %task,
                        duration_ms = duration.as_millis(),
                        "Task complete"
                    );
                } else {
                    warn!(
                        task = %task,
                        exit_code,
                        duration_ms = duration.as_millis(),
                        "Task failed"
                    );
                }
            }
            ExecuteEvent::Canceled { source } => {
                warn!(source = %source, "Canceled");
            }
            ExecuteEvent::PipelineFinished { status, duration } => match status {
                RunStatus::Completed => {
                    info!(duration_ms = duration.as_millis(), "Pipeline complete");
                }
                RunStatus::Failed | RunStatus::Canceled => {
                    warn!(status = %status, duration_ms = duration.as_millis(), "Pipeline stopped");
                }
                RunStatus::Idle | RunStatus::Running => {
                    debug!(status = %status, "Pipeline finished in a non-terminal state");
                }
            },
        }
    }
}
