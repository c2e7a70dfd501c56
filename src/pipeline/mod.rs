//! Pipeline execution: the per-run state machine and the supervisor that
//! stops in-flight runs on shutdown.

mod orchestrator;
mod status;
mod supervisor;

pub use orchestrator::{BuildPipeline, PipelineError};
pub use status::{PipelineReport, RunStatus, TaskOutcome, TaskResult};
pub use supervisor::{PipelineSupervisor, RunHandle, SupervisorError};
