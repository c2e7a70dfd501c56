//! Task discovery
//!
//! A [`TaskDiscovery`] runs its collectors in registration order. Each one
//! appends to a fresh [`TaskAccumulator`], so a collector never sees or
//! changes what another produced. The combined list is then stable-sorted by
//! task order, keeping discovery order for ties.
//!
//! Bad candidates (invalid signatures, scripts whose settings cannot be
//! read) are rejected individually and collection continues. Command-line
//! arguments that do not parse for a task abort the whole pass.

mod registered;
mod registry;
mod script;
mod signature;

pub use registered::RegisteredCollector;
pub use registry::{TaskExporter, TaskMethod, TaskRegistry};
pub use script::ScriptCollector;
pub use signature::{ParameterKind, ReturnKind, SignatureError, TaskSignature};

use crate::context::{BuildContext, CollectMode, ContextError};
use crate::options::{OptionSchema, OptionsError, TaskOptions, UnknownPolicy};
use crate::services::ServiceRegistry;
use crate::task::BuildTask;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Invalid arguments for task '{task}': {source}")]
    InvalidArguments {
        task: String,
        #[source]
        source: OptionsError,
    },

    #[error("Invalid build context: {0}")]
    Context(#[from] ContextError),
}

/// A candidate that was skipped during collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedCandidate {
    pub collector: String,
    pub candidate: String,
    pub reason: String,
}

/// Tasks and rejections produced by one collector
#[derive(Debug)]
pub struct TaskAccumulator {
    collector: String,
    tasks: Vec<BuildTask>,
    rejected: Vec<RejectedCandidate>,
}

impl TaskAccumulator {
    pub fn new(collector: impl Into<String>) -> Self {
        Self {
            collector: collector.into(),
            tasks: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn push(&mut self, task: BuildTask) {
        debug!(collector = %self.collector, task = %task.name(), order = task.order(), "Collected task");
        self.tasks.push(task);
    }

    /// Records a skipped candidate and logs it once
    pub fn reject(&mut self, candidate: impl Into<String>, reason: impl Into<String>) {
        let rejected = RejectedCandidate {
            collector: self.collector.clone(),
            candidate: candidate.into(),
            reason: reason.into(),
        };
        error!(
            collector = %rejected.collector,
            candidate = %rejected.candidate,
            reason = %rejected.reason,
            "Rejected task candidate"
        );
        self.rejected.push(rejected);
    }

    pub fn tasks(&self) -> &[BuildTask] {
        &self.tasks
    }

    pub fn rejected(&self) -> &[RejectedCandidate] {
        &self.rejected
    }
}

/// A discovery strategy contributing tasks for a context
#[async_trait]
pub trait TaskCollector: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(
        &self,
        context: &BuildContext,
        services: &Arc<ServiceRegistry>,
        tasks: &mut TaskAccumulator,
    ) -> Result<(), CollectError>;
}

/// Result of a discovery pass, tasks already in execution order
#[derive(Debug, Default)]
pub struct Collection {
    pub tasks: Vec<BuildTask>,
    pub rejected: Vec<RejectedCandidate>,
}

#[derive(Clone, Default)]
pub struct TaskDiscovery {
    collectors: Vec<Arc<dyn TaskCollector>>,
}

impl TaskDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered tasks first, then scripts under `script_root`
    pub fn standard(registry: Arc<TaskRegistry>, script_root: impl Into<PathBuf>) -> Self {
        Self::new()
            .with_collector(Arc::new(RegisteredCollector::new(registry)))
            .with_collector(Arc::new(ScriptCollector::new(script_root)))
    }

    pub fn with_collector(mut self, collector: Arc<dyn TaskCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub async fn collect(
        &self,
        context: &BuildContext,
        services: &Arc<ServiceRegistry>,
    ) -> Result<Collection, CollectError> {
        if context.collect_mode == CollectMode::Full {
            context.validate()?;
        }

        let mut collection = Collection::default();
        for collector in &self.collectors {
            let mut accumulator = TaskAccumulator::new(collector.name());
            collector.collect(context, services, &mut accumulator).await?;
            collection.tasks.extend(accumulator.tasks);
            collection.rejected.extend(accumulator.rejected);
        }

        for (index, task) in collection.tasks.iter_mut().enumerate() {
            task.discovery_index = index;
        }
        // stable: equal orders keep discovery order
        collection.tasks.sort_by_key(|task| task.order());

        info!(
            context = %context.name,
            tasks = collection.tasks.len(),
            rejected = collection.rejected.len(),
            "Collected tasks"
        );
        Ok(collection)
    }
}

/// Binds the context's arguments to a task's option schema.
///
/// A task without a schema takes no options and ignores the arguments.
/// Arguments are only parsed for live contexts; unknown flags are ignored
/// because one argument list is shared by every task of the family.
pub(crate) fn bind_options(
    schema: Option<&Arc<OptionSchema>>,
    context: &BuildContext,
    task: &str,
) -> Result<Option<TaskOptions>, CollectError> {
    let Some(schema) = schema else {
        return Ok(None);
    };

    if context.collect_mode == CollectMode::PureCollect || context.arguments.is_empty() {
        return Ok(Some(schema.defaults()));
    }

    schema
        .parse(&context.arguments, UnknownPolicy::Ignore)
        .map(Some)
        .map_err(|source| CollectError::InvalidArguments {
            task: task.to_string(),
            source,
        })
}
