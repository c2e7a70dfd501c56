pub mod commands;
pub mod handlers;
pub mod output;
pub mod progress;

pub use commands::{CheckArgs, CliArgs, Commands, ListArgs, OptionsArgs, RunArgs};
pub use output::{OutputFormat, OutputFormatter};
pub use progress::ProgressObserver;
