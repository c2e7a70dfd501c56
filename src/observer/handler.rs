//! Execution observer trait and events

use crate::pipeline::RunStatus;
use crate::requirement::UnsatisfiedRequirement;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Events emitted while a pipeline runs
#[derive(Debug, Clone)]
pub enum ExecuteEvent {
    /// Pipeline run started
    PipelineStarted { context: String, tasks: usize },

    /// A task is about to execute
    TaskStarted { task: String, order: i32 },

    /// A log line produced by a task or one of its processes
    Log {
        source: String,
        level: LogLevel,
        message: String,
    },

    /// A task was skipped because its requirements are not met
    RequirementsUnsatisfied {
        task: String,
        unsatisfied: Vec<UnsatisfiedRequirement>,
    },

    /// A task finished
    TaskFinished {
        task: String,
        exit_code: i32,
        duration: Duration,
    },

    /// Cancellation was observed by `source`
    Canceled { source: String },

    /// Pipeline run reached a terminal state
    PipelineFinished { status: RunStatus, duration: Duration },
}

/// Sink for execution events.
///
/// Events are delivered as they happen, from whichever task produced them.
pub trait ExecuteObserver: Send + Sync {
    fn on_event(&self, event: &ExecuteEvent);

    fn log(&self, source: &str, level: LogLevel, message: &str) {
        self.on_event(&ExecuteEvent::Log {
            source: source.to_string(),
            level,
            message: message.to_string(),
        });
    }

    fn info(&self, source: &str, message: &str) {
        self.log(source, LogLevel::Info, message);
    }

    fn warning(&self, source: &str, message: &str) {
        self.log(source, LogLevel::Warning, message);
    }

    fn error(&self, source: &str, message: &str) {
        self.log(source, LogLevel::Error, message);
    }

    fn canceled(&self, source: &str) {
        self.on_event(&ExecuteEvent::Canceled {
            source: source.to_string(),
        });
    }
}

/// Observer that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl ExecuteObserver for NoOpObserver {
    fn on_event(&self, _event: &ExecuteEvent) {}
}

/// Fans each event out to several observers, e.g. a progress UI and a log file
#[derive(Default, Clone)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ExecuteObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ExecuteObserver>>) -> Self {
        Self { observers }
    }

    pub fn with(mut self, observer: Arc<dyn ExecuteObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl ExecuteObserver for CompositeObserver {
    fn on_event(&self, event: &ExecuteEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Forwards events into an unbounded channel for a UI loop to consume
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ExecuteEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExecuteEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ExecuteObserver for ChannelObserver {
    fn on_event(&self, event: &ExecuteEvent) {
        // receiver may be gone once the UI closed
        let _ = self.sender.send(event.clone());
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExecuteEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecuteEvent> {
        self.lock().clone()
    }

    pub fn logs(&self) -> Vec<(String, LogLevel, String)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ExecuteEvent::Log {
                    source,
                    level,
                    message,
                } => Some((source.clone(), *level, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.logs()
            .into_iter()
            .filter(|(_, level, _)| *level == LogLevel::Error)
            .map(|(_, _, message)| message)
            .collect()
    }

    pub fn started_tasks(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ExecuteEvent::TaskStarted { task, .. } => Some(task.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn canceled_sources(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ExecuteEvent::Canceled { source } => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ExecuteEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExecuteObserver for RecordingObserver {
    fn on_event(&self, event: &ExecuteEvent) {
        self.lock().push(event.clone());
    }
}
