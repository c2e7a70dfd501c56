//! Build tasks: settings, handlers and execution

mod build_task;
mod handler;
mod settings;

pub use build_task::{BuildTask, ScriptInvocation, TaskAction};
pub use handler::{TaskHandler, TaskInput};
pub use settings::TaskSettings;
