use crate::collect::ReturnKind;
use crate::context::BuildContext;
use crate::observer::ExecuteObserver;
use crate::options::TaskOptions;
use crate::services::ServiceRegistry;
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a registered task receives when it runs
#[derive(Clone)]
pub struct TaskInput {
    pub task_name: String,
    pub context: Arc<BuildContext>,
    pub observer: Arc<dyn ExecuteObserver>,
    pub cancel: CancellationToken,
    pub options: Option<TaskOptions>,
    pub services: Arc<ServiceRegistry>,
}

impl TaskInput {
    pub fn info(&self, message: &str) {
        self.observer.info(&self.task_name, message);
    }

    pub fn error(&self, message: &str) {
        self.observer.error(&self.task_name, message);
    }
}

type BlockingFn = Arc<dyn Fn(TaskInput) -> i32 + Send + Sync>;
type AsyncFn = Arc<dyn Fn(TaskInput) -> BoxFuture<'static, i32> + Send + Sync>;

/// Body of a registered task, returning an exit code either directly or
/// through a future
#[derive(Clone)]
pub enum TaskHandler {
    Blocking(BlockingFn),
    Async(AsyncFn),
}

impl TaskHandler {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(TaskInput) -> i32 + Send + Sync + 'static,
    {
        TaskHandler::Blocking(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = i32> + Send + 'static,
    {
        TaskHandler::Async(Arc::new(move |input| f(input).boxed()))
    }

    pub fn return_kind(&self) -> ReturnKind {
        match self {
            TaskHandler::Blocking(_) => ReturnKind::ExitCode,
            TaskHandler::Async(_) => ReturnKind::AsyncExitCode,
        }
    }

    /// Blocking handlers run on the blocking pool; a panic is re-raised in
    /// the calling task
    pub async fn invoke(&self, input: TaskInput) -> i32 {
        match self {
            TaskHandler::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(input)).await {
                    Ok(code) => code,
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(_) => -1,
                }
            }
            TaskHandler::Async(f) => f(input).await,
        }
    }
}

impl fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskHandler::Blocking(_) => write!(f, "TaskHandler::Blocking"),
            TaskHandler::Async(_) => write!(f, "TaskHandler::Async"),
        }
    }
}
