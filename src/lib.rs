//! buildrig - build automation task orchestration
//!
//! Tasks are discovered per named build context, gated on environment
//! requirements and run in order with cooperative cancellation.
//!
//! # Core Concepts
//!
//! - **Context**: names a task family and carries the project, the active
//!   condition and raw command-line arguments
//! - **Collectors**: discovery strategies producing tasks for a context, from
//!   the built-in [`TaskRegistry`] or from script plugins on disk
//! - **Requirements**: preconditions checked against the [`ServiceRegistry`]
//!   before a task runs
//! - **Pipeline**: runs the collected tasks in order and reports an outcome
//!   per task; the [`PipelineSupervisor`] stops all runs on shutdown
//!
//! # Example Usage
//!
//! ```no_run
//! use buildrig::{BuildContext, BuildPipeline, LoggingObserver, ServiceRegistry, TaskDiscovery};
//! use buildrig::tasks::default_registry;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = buildrig::BuildrigConfig::default();
//! let services = Arc::new(ServiceRegistry::probe(&config));
//! let discovery = TaskDiscovery::standard(Arc::new(default_registry()), config.script_dir.clone());
//!
//! let context = BuildContext::new("CppExample").project_path("app/app.sln");
//! let pipeline =
//!     BuildPipeline::create(context, &discovery, services, Arc::new(LoggingObserver)).await?;
//! let report = pipeline.run().await?;
//! println!("{}", report.status);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collect;
pub mod config;
pub mod context;
pub mod observer;
pub mod options;
pub mod pipeline;
pub mod requirement;
pub mod script;
pub mod services;
pub mod task;
pub mod tasks;
pub mod util;

pub use collect::{CollectError, TaskCollector, TaskDiscovery, TaskExporter, TaskMethod, TaskRegistry};
pub use config::{BuildrigConfig, ConfigError};
pub use context::{BuildContext, CollectMode, ContextError};
pub use observer::{ExecuteEvent, ExecuteObserver, LoggingObserver};
pub use options::{FormatMode, OptionSchema, OptionsDocument, OptionsError, TaskOptions};
pub use pipeline::{
    BuildPipeline, PipelineError, PipelineReport, PipelineSupervisor, RunStatus, TaskResult,
};
pub use requirement::{EnvironmentRequirement, RequirementCollection, SatisfactionLevel};
pub use services::ServiceRegistry;
pub use task::{BuildTask, TaskHandler, TaskInput, TaskSettings};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
