//! Observers receiving live log, progress and cancellation events

mod handler;
mod logging;

pub use handler::{
    ChannelObserver, CompositeObserver, ExecuteEvent, ExecuteObserver, LogLevel, NoOpObserver,
    RecordingObserver,
};
pub use logging::LoggingObserver;
