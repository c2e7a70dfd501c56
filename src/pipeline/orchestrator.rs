use super::status::{PipelineReport, RunStatus, TaskOutcome, TaskResult};
use crate::collect::{CollectError, RejectedCandidate, TaskDiscovery};
use crate::context::BuildContext;
use crate::observer::{ExecuteEvent, ExecuteObserver};
use crate::services::ServiceRegistry;
use crate::task::BuildTask;
use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline already started (status: {0})")]
    AlreadyStarted(RunStatus),

    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// An ordered task list for one context, executed once.
///
/// Tasks start strictly in order. Each one is gated on its requirements, and
/// the run halts at the first failure of a task that is not `can_failure`.
/// Background tasks (`can_async` without `wait_result`) are started and
/// joined before the run reports.
pub struct BuildPipeline {
    id: Uuid,
    context: Arc<BuildContext>,
    tasks: Vec<Arc<BuildTask>>,
    rejected: Vec<RejectedCandidate>,
    services: Arc<ServiceRegistry>,
    observer: Arc<dyn ExecuteObserver>,
    cancel: CancellationToken,
    status: Mutex<RunStatus>,
}

impl BuildPipeline {
    /// Collects the context's tasks and builds a pipeline over them
    pub async fn create(
        context: BuildContext,
        discovery: &TaskDiscovery,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
    ) -> Result<Self, PipelineError> {
        let collection = discovery.collect(&context, &services).await?;
        let mut pipeline = Self::from_tasks(context, collection.tasks, services, observer);
        pipeline.rejected = collection.rejected;
        Ok(pipeline)
    }

    pub fn from_tasks(
        context: BuildContext,
        mut tasks: Vec<BuildTask>,
        services: Arc<ServiceRegistry>,
        observer: Arc<dyn ExecuteObserver>,
    ) -> Self {
        tasks.sort_by_key(|task| task.order());
        Self {
            id: Uuid::new_v4(),
            context: Arc::new(context),
            tasks: tasks.into_iter().map(Arc::new).collect(),
            rejected: Vec::new(),
            services,
            observer,
            cancel: CancellationToken::new(),
            status: Mutex::new(RunStatus::Idle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn tasks(&self) -> &[Arc<BuildTask>] {
        &self.tasks
    }

    pub fn rejected(&self) -> &[RejectedCandidate] {
        &self.rejected
    }

    pub fn status(&self) -> RunStatus {
        *self.lock_status()
    }

    /// Token shared by every task of this pipeline
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cooperative cancellation; no new task starts afterwards
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!(pipeline = %self.id, context = %self.context.name, "Cancellation requested");
            self.cancel.cancel();
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: RunStatus) {
        *self.lock_status() = status;
    }

    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        {
            let mut status = self.lock_status();
            if *status != RunStatus::Idle {
                return Err(PipelineError::AlreadyStarted(*status));
            }
            *status = RunStatus::Running;
        }

        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            pipeline = %self.id,
            context = %self.context.name,
            tasks = self.tasks.len(),
            "Starting pipeline"
        );
        self.observer.on_event(&ExecuteEvent::PipelineStarted {
            context: self.context.name.clone(),
            tasks: self.tasks.len(),
        });

        // one outcome per task, same index
        let mut outcomes: Vec<TaskOutcome> = self
            .tasks
            .iter()
            .map(|task| TaskOutcome {
                task: task.name().to_string(),
                order: task.order(),
                background: false,
                can_failure: task.settings.can_failure,
                result: TaskResult::NotStarted,
                duration_ms: 0,
            })
            .collect();
        let mut background: JoinSet<(usize, i32, Duration)> = JoinSet::new();

        for (index, task) in self.tasks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(task = %task.name(), "Pipeline canceled, not starting task");
                break;
            }

            let report = task.requirements.evaluate(&self.services);
            if !report.is_satisfied() {
                let unsatisfied = report.unsatisfied();
                warn!(
                    task = %task.name(),
                    unsatisfied = unsatisfied.len(),
                    "Task skipped, requirements not satisfied"
                );
                self.observer.on_event(&ExecuteEvent::RequirementsUnsatisfied {
                    task: task.name().to_string(),
                    unsatisfied: unsatisfied.clone(),
                });
                outcomes[index].result = TaskResult::RequirementsUnsatisfied { unsatisfied };
                if task.settings.can_failure {
                    continue;
                }
                break;
            }

            self.observer.on_event(&ExecuteEvent::TaskStarted {
                task: task.name().to_string(),
                order: task.order(),
            });
            let task_start = Instant::now();
            let execution = self.spawn_task(Arc::clone(task));

            if task.settings.runs_in_background() {
                debug!(task = %task.name(), "Running task in background");
                outcomes[index].background = true;
                background.spawn(async move {
                    let exit_code = execution.await;
                    (index, exit_code, task_start.elapsed())
                });
                continue;
            }

            let exit_code = execution.await;
            let result = self.finish_task(task, exit_code, task_start.elapsed());
            outcomes[index].finish(result, task_start.elapsed());
            if outcomes[index].result != TaskResult::Succeeded && !task.settings.can_failure {
                debug!(task = %task.name(), "Task failed, halting pipeline");
                break;
            }
        }

        while let Some(joined) = background.join_next().await {
            match joined {
                Ok((index, exit_code, duration)) => {
                    let result = self.finish_task(&self.tasks[index], exit_code, duration);
                    outcomes[index].finish(result, duration);
                }
                Err(e) => warn!(error = %e, "Background task wrapper did not complete"),
            }
        }

        let status = self.final_status(&outcomes);
        if status == RunStatus::Canceled {
            self.observer.canceled(&self.context.name);
            self.observer.warning(&self.context.name, "Pipeline canceled");
        }
        self.set_status(status);

        let duration = start.elapsed();
        info!(
            pipeline = %self.id,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "Pipeline finished"
        );
        self.observer
            .on_event(&ExecuteEvent::PipelineFinished { status, duration });

        Ok(PipelineReport {
            id: self.id,
            context: self.context.name.clone(),
            status,
            started_at,
            outcomes,
            rejected: self.rejected.clone(),
            duration_ms: duration.as_millis() as u64,
        })
    }

    /// Runs a task on its own tokio task.
    ///
    /// The spawned task is aborted when the returned future is dropped, so an
    /// aborted run takes its tasks (and their `kill_on_drop` children) with it.
    /// A panic becomes exit code -1.
    fn spawn_task(&self, task: Arc<BuildTask>) -> impl Future<Output = i32> + Send + 'static {
        let name = task.name().to_string();
        let observer = Arc::clone(&self.observer);
        let handle = AbortOnDropHandle::new(tokio::spawn({
            let context = Arc::clone(&self.context);
            let services = Arc::clone(&self.services);
            let observer = Arc::clone(&self.observer);
            let cancel = self.cancel.clone();
            async move { task.execute(context, services, observer, cancel).await }
        }));

        async move {
            match handle.await {
                Ok(exit_code) => exit_code,
                Err(e) => {
                    let message = if e.is_panic() {
                        "Task panicked".to_string()
                    } else {
                        format!("Task did not complete: {}", e)
                    };
                    observer.error(&name, &message);
                    -1
                }
            }
        }
    }

    fn finish_task(&self, task: &BuildTask, exit_code: i32, duration: Duration) -> TaskResult {
        let result = TaskResult::from_exit_code(exit_code, self.cancel.is_cancelled());
        debug!(
            task = %task.name(),
            exit_code,
            result = %result,
            duration_ms = duration.as_millis() as u64,
            "Task finished"
        );
        self.observer.on_event(&ExecuteEvent::TaskFinished {
            task: task.name().to_string(),
            exit_code,
            duration,
        });
        result
    }

    fn final_status(&self, outcomes: &[TaskOutcome]) -> RunStatus {
        if self.cancel.is_cancelled() && outcomes.iter().any(|o| o.result.is_interrupted()) {
            RunStatus::Canceled
        } else if outcomes.iter().any(TaskOutcome::is_blocking_failure) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("id", &self.id)
            .field("context", &self.context.name)
            .field("tasks", &self.tasks.len())
            .field("status", &self.status())
            .finish()
    }
}
