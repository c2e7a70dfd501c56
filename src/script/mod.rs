//! Script-defined tasks and the runtimes that host them

mod error;
mod python;
mod settings;

pub use error::{ScriptError, StackFrame};
pub use python::PythonRuntime;
pub use settings::{ScriptOptionDef, ScriptTaskSettings};

use crate::observer::ExecuteObserver;
use crate::services::ServiceRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a script task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Through the runtime's own host harness
    #[default]
    #[serde(alias = "Internal")]
    Internal,
    /// As a plain interpreter process via the process runner
    #[serde(alias = "External")]
    External,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Internal => write!(f, "internal"),
            ExecutionMode::External => write!(f, "external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    /// Task name, used as the log source
    pub task: String,
    pub path: PathBuf,
    /// Formatted option arguments
    pub arguments: Vec<String>,
    pub mode: ExecutionMode,
    pub working_dir: Option<PathBuf>,
}

/// A scripting runtime able to describe and run script tasks
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Environment service that must be available for external-mode runs
    fn interpreter_service(&self) -> &str;

    /// `extension` comes without the leading dot
    fn can_handle(&self, extension: &str) -> bool;

    /// Calls the script's `task_def.get_settings()`
    async fn get_settings(&self, path: &Path) -> Result<ScriptTaskSettings, ScriptError>;

    /// Runs the script and returns its exit code. Failures are reported
    /// through the observer and yield -1.
    async fn execute(
        &self,
        request: ScriptRequest,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> i32;
}
