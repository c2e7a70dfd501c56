use super::orchestrator::{BuildPipeline, PipelineError};
use super::status::PipelineReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Pipeline run {0} was aborted before it reported")]
    Aborted(Uuid),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

struct ActiveRun {
    context: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle to a run started by [`PipelineSupervisor::spawn`]
#[derive(Debug)]
pub struct RunHandle {
    id: Uuid,
    cancel: CancellationToken,
    report: oneshot::Receiver<Result<PipelineReport, PipelineError>>,
}

impl RunHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<PipelineReport, SupervisorError> {
        match self.report.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SupervisorError::Aborted(self.id)),
        }
    }
}

/// Tracks in-flight pipeline runs so the host can stop them all on exit
pub struct PipelineSupervisor {
    runs: Mutex<HashMap<Uuid, ActiveRun>>,
    grace: Duration,
}

impl PipelineSupervisor {
    pub fn new(grace: Duration) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            grace,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ActiveRun>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Runs the pipeline on its own task; the run unregisters itself when done
    pub fn spawn(self: &Arc<Self>, pipeline: BuildPipeline) -> RunHandle {
        let id = pipeline.id();
        let cancel = pipeline.cancel_token();
        let context = pipeline.context().name.clone();
        let (tx, rx) = oneshot::channel();

        // registered under the lock so a fast run cannot unregister first
        let mut runs = self.lock();
        let supervisor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = pipeline.run().await;
            supervisor.lock().remove(&id);
            // the handle may have been dropped
            let _ = tx.send(result);
        });
        runs.insert(
            id,
            ActiveRun {
                context: context.clone(),
                cancel: cancel.clone(),
                handle,
            },
        );
        debug!(pipeline = %id, context = %context, active = runs.len(), "Pipeline run spawned");

        RunHandle {
            id,
            cancel,
            report: rx,
        }
    }

    pub fn active_runs(&self) -> usize {
        self.lock().len()
    }

    /// Cancels every active run and waits until each has stopped.
    ///
    /// With `force`, runs still going after the grace period are aborted,
    /// which drops their tasks and kills the child processes they own.
    /// Returns the number of runs that were active.
    pub async fn stop_all_tasks_and_wait(&self, force: bool) -> usize {
        let runs: Vec<(Uuid, ActiveRun)> = self.lock().drain().collect();
        if runs.is_empty() {
            return 0;
        }

        info!(runs = runs.len(), force, "Stopping all pipeline runs");
        for (_, run) in &runs {
            run.cancel.cancel();
        }

        let deadline = tokio::time::Instant::now() + self.grace;
        let count = runs.len();
        for (id, run) in runs {
            let mut handle = run.handle;
            if !force {
                let _ = (&mut handle).await;
                continue;
            }
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(
                    pipeline = %id,
                    context = %run.context,
                    grace_secs = self.grace.as_secs(),
                    "Pipeline did not stop within grace period, aborting"
                );
                handle.abort();
                let _ = handle.await;
            }
        }
        count
    }
}

impl Default for PipelineSupervisor {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
