//! In-memory service fakes for tests and dry runs

use super::environment::{EnvironmentService, Installation};
use super::process::{ProcessError, ProcessExit, ProcessRunner, ProcessSpec};
use super::registry::ServiceRegistry;
use crate::observer::ExecuteObserver;
use crate::script::{ExecutionMode, ScriptError, ScriptRequest, ScriptRuntime, ScriptTaskSettings};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Environment with a fixed set of installations
#[derive(Debug, Clone)]
pub struct MockEnvironment {
    name: String,
    installations: Vec<Installation>,
}

impl MockEnvironment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            installations: Vec::new(),
        }
    }

    pub fn with_installation(mut self, installation: Installation) -> Self {
        self.installations.push(installation);
        self
    }
}

impl EnvironmentService for MockEnvironment {
    fn name(&self) -> &str {
        &self.name
    }

    fn installations(&self) -> &[Installation] {
        &self.installations
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProcessBehavior {
    /// Exit immediately with the code
    ExitWith(i32),
    /// Exit with the code after a delay unless canceled first
    ExitAfter(Duration, i32),
    /// Run until canceled
    WaitForCancel,
    /// Fail to start
    SpawnError,
}

/// Process runner that records what it was asked to launch
pub struct MockProcessRunner {
    behavior: MockProcessBehavior,
    available: bool,
    output: Vec<String>,
    launched: Mutex<Vec<ProcessSpec>>,
}

impl MockProcessRunner {
    pub fn new(behavior: MockProcessBehavior) -> Self {
        Self {
            behavior,
            available: true,
            output: Vec::new(),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn exiting(code: i32) -> Self {
        Self::new(MockProcessBehavior::ExitWith(code))
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Lines emitted on stdout before the process finishes
    pub fn with_output<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn launched(&self) -> Vec<ProcessSpec> {
        lock(&self.launched).clone()
    }

    pub fn launch_count(&self) -> usize {
        lock(&self.launched).len()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn run(
        &self,
        spec: ProcessSpec,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> Result<ProcessExit, ProcessError> {
        if cancel.is_cancelled() {
            observer.canceled(&spec.name);
            return Ok(ProcessExit::Canceled);
        }

        lock(&self.launched).push(spec.clone());

        if self.behavior == MockProcessBehavior::SpawnError {
            return Err(ProcessError::Spawn {
                program: spec.program.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }

        for line in &self.output {
            observer.info(&spec.name, line);
        }

        let finished = match self.behavior {
            MockProcessBehavior::ExitWith(code) => return Ok(ProcessExit::Exited(code)),
            MockProcessBehavior::ExitAfter(delay, code) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Some(code),
                    _ = cancel.cancelled() => None,
                }
            }
            MockProcessBehavior::WaitForCancel => {
                cancel.cancelled().await;
                None
            }
            MockProcessBehavior::SpawnError => None,
        };

        match finished {
            Some(code) => Ok(ProcessExit::Exited(code)),
            None => {
                observer.canceled(&spec.name);
                Ok(ProcessExit::Canceled)
            }
        }
    }
}

/// Script runtime answering from an in-memory table keyed by file name.
///
/// Internal-mode execution returns the configured exit code; external mode
/// launches `mock-interpreter <script> <args>` through the registry's process
/// runner so tests can observe the command line.
pub struct MockScriptRuntime {
    name: String,
    extension: String,
    available: bool,
    settings: HashMap<String, Result<ScriptTaskSettings, String>>,
    exit_code: i32,
    requests: Mutex<Vec<ScriptRequest>>,
}

impl MockScriptRuntime {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: "py".to_string(),
            available: true,
            settings: HashMap::new(),
            exit_code: 0,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn handling(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_settings(mut self, file_name: impl Into<String>, settings: ScriptTaskSettings) -> Self {
        self.settings.insert(file_name.into(), Ok(settings));
        self
    }

    /// Makes `get_settings` raise for this file
    pub fn with_failure(mut self, file_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.settings.insert(file_name.into(), Err(message.into()));
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn requests(&self) -> Vec<ScriptRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ScriptRuntime for MockScriptRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn interpreter_service(&self) -> &str {
        super::INTERPRETER_SERVICE
    }

    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(&self.extension)
    }

    async fn get_settings(&self, path: &Path) -> Result<ScriptTaskSettings, ScriptError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.settings.get(&file_name) {
            Some(Ok(settings)) => Ok(settings.clone()),
            Some(Err(message)) => Err(ScriptError::Runtime {
                kind: "RuntimeError".to_string(),
                message: message.clone(),
                frames: Vec::new(),
            }),
            None => Err(ScriptError::Runtime {
                kind: "AttributeError".to_string(),
                message: format!("module '{}' has no attribute 'task_def'", file_name),
                frames: Vec::new(),
            }),
        }
    }

    async fn execute(
        &self,
        request: ScriptRequest,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> i32 {
        lock(&self.requests).push(request.clone());

        match request.mode {
            ExecutionMode::Internal => {
                if cancel.is_cancelled() {
                    observer.canceled(&request.task);
                    return -1;
                }
                self.exit_code
            }
            ExecutionMode::External => {
                let Some(runner) = services.process() else {
                    observer.error(&request.task, "No process runner registered");
                    return -1;
                };
                let spec = ProcessSpec::new(request.task.clone(), "mock-interpreter")
                    .arg(request.path.display().to_string())
                    .args(request.arguments.clone());
                match runner.run(spec, observer.clone(), cancel).await {
                    Ok(ProcessExit::Exited(code)) => code,
                    Ok(ProcessExit::Canceled) => -1,
                    Err(e) => {
                        observer.error(&request.task, &e.to_string());
                        -1
                    }
                }
            }
        }
    }
}
