//! External process execution with cooperative cancellation
//!
//! A child process is raced against its cancellation token: whichever finishes
//! first decides the outcome. On cancellation the child and every process it
//! started are killed, an [`ExecuteEvent::Canceled`] is reported and the run
//! resolves to [`ProcessExit::Canceled`]. Output lines are streamed to the
//! observer as they arrive, tagged with the process name.
//!
//! Descendants can inherit the output pipes, so the readers are only waited on
//! for a bounded time once the child is gone.

use super::PROCESS_SERVICE;
use crate::observer::{ExecuteEvent, ExecuteObserver, LogLevel};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long output still buffered in the pipes may take to drain after exit
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Same, after a cancellation killed the process tree
const CANCELED_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(i32),
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Name used to tag output and events
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Capability for running external processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    fn name(&self) -> &str {
        PROCESS_SERVICE
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn run(
        &self,
        spec: ProcessSpec,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> Result<ProcessExit, ProcessError>;
}

/// Runs processes on the tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        spec: ProcessSpec,
        observer: Arc<dyn ExecuteObserver>,
        cancel: CancellationToken,
    ) -> Result<ProcessExit, ProcessError> {
        let source = spec.name.clone();
        let sink_observer = Arc::clone(&observer);
        let sink = move |stream: OutputStream, line: String| {
            let level = match stream {
                OutputStream::Stdout => LogLevel::Info,
                OutputStream::Stderr => LogLevel::Error,
            };
            sink_observer.log(&source, level, &line);
        };
        run_with_sink(&spec, Arc::new(sink), observer.as_ref(), &cancel).await
    }
}

pub(crate) type LineSink = Arc<dyn Fn(OutputStream, String) + Send + Sync>;

/// Spawns `spec`, streams every output line into `sink` and waits for exit or
/// cancellation.
pub(crate) async fn run_with_sink(
    spec: &ProcessSpec,
    sink: LineSink,
    observer: &dyn ExecuteObserver,
    cancel: &CancellationToken,
) -> Result<ProcessExit, ProcessError> {
    if cancel.is_cancelled() {
        observer.on_event(&ExecuteEvent::Canceled {
            source: spec.name.clone(),
        });
        return Ok(ProcessExit::Canceled);
    }

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }

    let program = spec.program.display().to_string();
    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    debug!(process = %spec.name, pid = ?child.id(), command = %spec.command_line(), "Spawned process");

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(
            stdout,
            OutputStream::Stdout,
            Arc::clone(&sink),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(
            stderr,
            OutputStream::Stderr,
            Arc::clone(&sink),
        )));
    }

    let exit = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|source| ProcessError::Wait {
                program: program.clone(),
                source,
            })?;
            ProcessExit::Exited(status.code().unwrap_or(-1))
        }
        _ = cancel.cancelled() => {
            warn!(process = %spec.name, "Cancellation requested, terminating process tree");
            kill_tree(&mut child, &spec.name).await;
            observer.on_event(&ExecuteEvent::Canceled { source: spec.name.clone() });
            ProcessExit::Canceled
        }
    };

    let drain_timeout = match exit {
        ProcessExit::Canceled => CANCELED_DRAIN_TIMEOUT,
        ProcessExit::Exited(_) => OUTPUT_DRAIN_TIMEOUT,
    };
    drain(readers, drain_timeout, &spec.name).await;

    debug!(process = %spec.name, exit = ?exit, "Process finished");
    Ok(exit)
}

/// Kills every descendant of `child`, then `child` itself
async fn kill_tree(child: &mut Child, name: &str) {
    if let Some(pid) = child.id() {
        let root = Pid::from_u32(pid);
        let killed = tokio::task::spawn_blocking(move || kill_descendants(root))
            .await
            .unwrap_or(0);
        if killed > 0 {
            debug!(process = %name, killed, "Terminated child processes");
        }
    }
    if let Err(e) = child.kill().await {
        warn!(process = %name, error = %e, "Failed to terminate process");
    }
}

/// Returns how many descendants of `root` were signalled
fn kill_descendants(root: Pid) -> usize {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());

    let mut tree = HashSet::from([root]);
    let mut descendants = Vec::new();
    // parents can be listed after their children, so sweep until nothing new turns up
    loop {
        let found: Vec<Pid> = system
            .processes()
            .iter()
            .filter(|(pid, process)| {
                !tree.contains(*pid) && process.parent().is_some_and(|parent| tree.contains(&parent))
            })
            .map(|(pid, _)| *pid)
            .collect();
        if found.is_empty() {
            break;
        }
        tree.extend(found.iter().copied());
        descendants.extend(found);
    }

    descendants
        .iter()
        .rev()
        .filter_map(|pid| system.process(*pid))
        .filter(|process| process.kill())
        .count()
}

async fn drain(mut readers: Vec<JoinHandle<()>>, timeout: Duration, name: &str) {
    let wait_all = async {
        for reader in readers.iter_mut() {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(timeout, wait_all).await.is_err() {
        debug!(process = %name, "Output pipes still open, abandoning readers");
        for reader in &readers {
            reader.abort();
        }
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, sink: LineSink)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink(stream, line),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading process output");
                break;
            }
        }
    }
}
