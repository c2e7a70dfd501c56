//! Python script runtime hosted in an out-of-process interpreter
//!
//! Settings and internal-mode runs go through a small bootstrap passed with
//! `-c`. It loads the task file, calls `task_def.get_settings()` or
//! `task_def.execute(argv)` and writes a single reply prefixed with
//! [`REPLY_MARKER`]. The marker may follow unterminated script output on the
//! same line.
//!
//! - `{"ok": <settings or exit code>}`, where `sys.exit(n)` counts as exit code `n`
//! - `{"error": {"type": "syntax", "file", "line", "column", "snippet", "message"}}`
//! - `{"error": {"type": "runtime", "kind", "message", "frames": [...]}}`
//!
//! Every other output line is forwarded to the observer as task output.

use super::error::{ScriptError, StackFrame};
use super::settings::ScriptTaskSettings;
use super::{ExecutionMode, ScriptRequest, ScriptRuntime};
use crate::observer::{ExecuteObserver, LogLevel};
use crate::services::process::{run_with_sink, LineSink};
use crate::services::{
    EnvironmentService, InterpreterEnvironment, OutputStream, ProcessExit, ProcessSpec,
    ServiceRegistry, INTERPRETER_SERVICE,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) const REPLY_MARKER: &str = "@@buildrig@@";

const DEFAULT_SETTINGS_TIMEOUT: Duration = Duration::from_secs(30);

const BOOTSTRAP: &str = r#"
import importlib.util
import json
import os
import sys
import traceback

MARKER = "@@buildrig@@"


def reply(payload):
    sys.stdout.write(MARKER + json.dumps(payload, default=str) + "\n")
    sys.stdout.flush()


def frames(tb):
    return [
        {"file": f.filename, "line": f.lineno or 0, "function": f.name, "code": f.line}
        for f in traceback.extract_tb(tb)
    ]


def exit_code(code):
    if code is None:
        return 0
    if isinstance(code, int):
        return code
    sys.stderr.write(str(code) + "\n")
    return 1


def load(path):
    sys.path.insert(0, os.path.dirname(os.path.abspath(path)))
    spec = importlib.util.spec_from_file_location("buildrig_task", path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
    return module


def main():
    command, path, argv = sys.argv[1], sys.argv[2], sys.argv[3:]
    try:
        task_def = load(path).task_def
        if command == "settings":
            settings = task_def.get_settings()
            if not isinstance(settings, dict):
                settings = vars(settings)
            reply({"ok": settings})
        else:
            try:
                code = task_def.execute(argv)
            except SystemExit as e:
                code = exit_code(e.code)
            reply({"ok": 0 if code is None else int(code)})
        return 0
    except SystemExit as e:
        if command == "execute":
            reply({"ok": exit_code(e.code)})
            return 0
        reply({"error": {
            "type": "runtime",
            "kind": "SystemExit",
            "message": "script exited with %r while loading settings" % (e.code,),
            "frames": frames(e.__traceback__),
        }})
    except SyntaxError as e:
        reply({"error": {
            "type": "syntax",
            "file": e.filename or path,
            "line": e.lineno or 0,
            "column": e.offset or 0,
            "snippet": (e.text or "").rstrip("\n") or None,
            "message": e.msg,
        }})
    except Exception as e:
        reply({"error": {
            "type": "runtime",
            "kind": type(e).__name__,
            "message": str(e),
            "frames": frames(e.__traceback__),
        }})
    return 1


sys.exit(main())
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum HostReply<T> {
    Ok(T),
    Error(HostFailure),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum HostFailure {
    Syntax {
        file: String,
        line: u32,
        column: u32,
        #[serde(default)]
        snippet: Option<String>,
        message: String,
    },
    Runtime {
        kind: String,
        message: String,
        #[serde(default)]
        frames: Vec<StackFrame>,
    },
}

impl From<HostFailure> for ScriptError {
    fn from(failure: HostFailure) -> Self {
        match failure {
            HostFailure::Syntax {
                file,
                line,
                column,
                snippet,
                message,
            } => ScriptError::Syntax {
                file,
                line,
                column,
                snippet,
                message,
            },
            HostFailure::Runtime {
                kind,
                message,
                frames,
            } => ScriptError::Runtime {
                kind,
                message,
                frames,
            },
        }
    }
}

/// Splits an output line into the text before the reply marker and the reply
/// payload after it
pub(crate) fn split_reply(line: &str) -> (&str, Option<&str>) {
    match line.find(REPLY_MARKER) {
        Some(at) => (&line[..at], Some(&line[at + REPLY_MARKER.len()..])),
        None => (line, None),
    }
}

/// Decodes the marked reply out of the bootstrap's output
pub(crate) fn parse_reply<T>(output: &str) -> Result<T, ScriptError>
where
    T: for<'de> Deserialize<'de>,
{
    let line = output
        .lines()
        .rev()
        .find_map(|line| split_reply(line).1)
        .ok_or_else(|| ScriptError::Host("interpreter exited without a reply".to_string()))?;

    let reply: HostReply<serde_json::Value> = serde_json::from_str(line)
        .map_err(|e| ScriptError::Host(format!("malformed reply: {}", e)))?;

    match reply {
        HostReply::Ok(value) => {
            serde_json::from_value(value).map_err(|e| ScriptError::InvalidSettings(e.to_string()))
        }
        HostReply::Error(failure) => Err(failure.into()),
    }
}

/// Runs `.py` task scripts with a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    interpreter: Option<PathBuf>,
    settings_timeout: Duration,
}

impl PythonRuntime {
    pub fn new(interpreter: Option<PathBuf>) -> Self {
        Self {
            interpreter,
            settings_timeout: DEFAULT_SETTINGS_TIMEOUT,
        }
    }

    pub fn from_environment(environment: &InterpreterEnvironment) -> Self {
        Self::new(environment.executable().map(Path::to_path_buf))
    }

    pub fn with_settings_timeout(mut self, timeout: Duration) -> Self {
        self.settings_timeout = timeout;
        self
    }

    fn interpreter(&self) -> Result<&Path, ScriptError> {
        self.interpreter
            .as_deref()
            .ok_or_else(|| ScriptError::Host("no Python interpreter found".to_string()))
    }

    async fn execute_internal(
        &self,
        request: &ScriptRequest,
        observer: &Arc<dyn ExecuteObserver>,
        cancel: &CancellationToken,
    ) -> Result<i32, ScriptError> {
        let interpreter = self.interpreter()?;
        let mut spec = ProcessSpec::new(request.task.clone(), interpreter)
            .arg("-c")
            .arg(BOOTSTRAP)
            .arg("execute")
            .arg(request.path.display().to_string())
            .args(request.arguments.clone())
            .env("PYTHONUNBUFFERED", "1");
        if let Some(dir) = &request.working_dir {
            spec = spec.working_dir(dir.clone());
        }

        let reply = Arc::new(Mutex::new(None::<String>));
        let sink: LineSink = {
            let reply = Arc::clone(&reply);
            let observer = Arc::clone(observer);
            let source = request.task.clone();
            Arc::new(move |stream: OutputStream, line: String| {
                let (text, payload) = match stream {
                    OutputStream::Stdout => split_reply(&line),
                    OutputStream::Stderr => (line.as_str(), None),
                };
                if let Some(payload) = payload {
                    let mut slot = reply.lock().unwrap_or_else(|e| e.into_inner());
                    *slot = Some(format!("{}{}", REPLY_MARKER, payload));
                    if text.is_empty() {
                        return;
                    }
                }
                let level = match stream {
                    OutputStream::Stdout => LogLevel::Info,
                    OutputStream::Stderr => LogLevel::Error,
                };
                observer.log(&source, level, text);
            })
        };

        match run_with_sink(&spec, sink, observer.as_ref(), cancel).await? {
            ProcessExit::Canceled => Ok(-1),
            ProcessExit::Exited(status) => {
                let reply = reply.lock().unwrap_or_else(|e| e.into_inner()).take();
                match reply {
                    Some(line) => parse_reply::<i32>(&line),
                    None => Err(ScriptError::Host(format!(
                        "interpreter exited with status {} without a reply",
                        status
                    ))),
                }
            }
        }
    }

    async fn execute_external(
        &self,
        request: &ScriptRequest,
        services: &ServiceRegistry,
        observer: &Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> Result<i32, ScriptError> {
        let runner = services
            .process()
            .ok_or_else(|| ScriptError::Host("no process runner registered".to_string()))?;

        let interpreter = services
            .environment(INTERPRETER_SERVICE)
            .and_then(|env| env.installations().first())
            .map(|install| install.path.clone())
            .or_else(|| self.interpreter.clone())
            .ok_or_else(|| ScriptError::Host("no Python interpreter found".to_string()))?;

        let mut spec = ProcessSpec::new(request.task.clone(), interpreter)
            .arg(request.path.display().to_string())
            .args(request.arguments.clone());
        if let Some(dir) = &request.working_dir {
            spec = spec.working_dir(dir.clone());
        }

        match runner.run(spec, Arc::clone(observer), cancel).await? {
            ProcessExit::Exited(code) => Ok(code),
            ProcessExit::Canceled => Ok(-1),
        }
    }
}

#[async_trait]
impl ScriptRuntime for PythonRuntime {
    fn name(&self) -> &str {
        "python"
    }

    fn is_available(&self) -> bool {
        self.interpreter.is_some()
    }

    fn interpreter_service(&self) -> &str {
        INTERPRETER_SERVICE
    }

    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("py")
    }

    async fn get_settings(&self, path: &Path) -> Result<ScriptTaskSettings, ScriptError> {
        let interpreter = self.interpreter()?;
        debug!(script = %path.display(), "Fetching script task settings");

        let mut command = Command::new(interpreter);
        command
            .arg("-c")
            .arg(BOOTSTRAP)
            .arg("settings")
            .arg(path)
            .kill_on_drop(true);
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }

        let output = tokio::time::timeout(self.settings_timeout, command.output())
            .await
            .map_err(|_| ScriptError::Timeout(self.settings_timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = parse_reply::<ScriptTaskSettings>(&stdout);
        if result.is_err() && !output.stderr.is_empty() {
            debug!(
                script = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Interpreter stderr"
            );
        }
        result
    }

    async fn execute(
        &self,
        request: ScriptRequest,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> i32 {
        let result = match request.mode {
            ExecutionMode::Internal => self.execute_internal(&request, &observer, &cancel).await,
            ExecutionMode::External => {
                self.execute_external(&request, &services, &observer, cancel)
                    .await
            }
        };

        match result {
            Ok(code) => code,
            Err(e) => {
                warn!(task = %request.task, script = %request.path.display(), error = %e, "Script failed");
                observer.error(&request.task, &e.diagnostic());
                -1
            }
        }
    }
}
