//! Capabilities shared by every pipeline: process execution, probed tool
//! environments and script runtimes.
//!
//! Services are resolved once into a [`ServiceRegistry`] and handed to the
//! pipeline, requirements and tasks. Nothing looks a service up from global
//! state.

pub mod environment;
pub mod mock;
pub mod process;
pub mod registry;
pub mod version;

pub use environment::{
    EnvironmentService, Installation, InterpreterEnvironment, MsBuildEnvironment,
    VisualStudioEnvironment,
};
pub use process::{
    OutputStream, ProcessError, ProcessExit, ProcessRunner, ProcessSpec, TokioProcessRunner,
};
pub use registry::ServiceRegistry;
pub use version::{Version, VersionParseError};

/// External process execution
pub const PROCESS_SERVICE: &str = "process";

/// Visual Studio installations
pub const VISUAL_STUDIO_SERVICE: &str = "visual-studio";

/// MSBuild executables
pub const MSBUILD_SERVICE: &str = "msbuild";

/// Script interpreter used by external-mode script tasks
pub const INTERPRETER_SERVICE: &str = "python-interpreter";
