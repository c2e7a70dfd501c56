//! Typed task options bound to command-line flags
//!
//! An [`OptionSchema`] describes the options a task accepts; [`TaskOptions`]
//! pairs a schema with current values. Options format to `--name=value`
//! arguments and parse back from them, and can be persisted as an
//! [`OptionsDocument`].

mod document;
mod schema;
mod tokenize;
mod value;
mod values;

pub use document::{DocumentError, OptionsDocument, PersistedOption};
pub use schema::{OptionSchema, OptionSpec, UnknownPolicy};
pub use tokenize::{quote, tokenize};
pub use value::{OptionKind, OptionValue};
pub use values::{FormatMode, TaskOptions};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("Unknown option '--{0}'")]
    UnknownOption(String),

    #[error("Unexpected argument '{0}'")]
    UnexpectedArgument(String),

    #[error("Missing required option '--{0}'")]
    MissingRequired(String),

    #[error("Option '--{0}' expects a value")]
    MissingValue(String),

    #[error("Invalid value '{value}' for '--{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Option '{0}' is declared more than once")]
    DuplicateOption(String),

    #[error("Invalid default for '{name}': {reason}")]
    InvalidDefault { name: String, reason: String },

    #[error("Unterminated quote in command line")]
    UnterminatedQuote,
}
