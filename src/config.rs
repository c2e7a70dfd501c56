//! Configuration management for buildrig
//!
//! Settings are loaded from environment variables with defaults.
//!
//! # Environment Variables
//!
//! - `BUILDRIG_SCRIPT_DIR`: Root of the script plugin directories - default: "./scripts"
//! - `BUILDRIG_PYTHON`: Python interpreter used for script tasks - default: "python3"
//!   ("python" on Windows)
//! - `BUILDRIG_LOG_LEVEL`: Logging level - default: "info"
//! - `BUILDRIG_SHUTDOWN_GRACE_SECS`: How long a forced shutdown waits for running
//!   pipelines before aborting them - default: "10"
//! - `BUILDRIG_OPTIONS_DIR`: Where saved task options live - default:
//!   `<config dir>/buildrig/options`
//! - `BUILDRIG_CONDITION`: Active condition applied to new contexts - default: none
//!
//! # Example
//!
//! ```no_run
//! use buildrig::BuildrigConfig;
//!
//! let config = BuildrigConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SCRIPT_DIR: &str = "scripts";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
const MAX_SHUTDOWN_GRACE_SECS: u64 = 600;

#[cfg(windows)]
const DEFAULT_PYTHON: &str = "python";
#[cfg(not(windows))]
const DEFAULT_PYTHON: &str = "python3";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct BuildrigConfig {
    /// Root directory holding one script folder per context
    pub script_dir: PathBuf,

    /// Interpreter executable for script tasks
    pub python: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Grace period for forced shutdown, in seconds
    pub shutdown_grace_secs: u64,

    /// Directory for persisted task option documents
    pub options_dir: PathBuf,

    /// Default active condition for new contexts
    pub condition: Option<String>,
}

impl Default for BuildrigConfig {
    /// Loads the configuration from `BUILDRIG_*` environment variables,
    /// falling back to defaults for anything unset or unparsable
    fn default() -> Self {
        let script_dir = env::var("BUILDRIG_SCRIPT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCRIPT_DIR));

        let python = env::var("BUILDRIG_PYTHON")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PYTHON));

        let log_level = env::var("BUILDRIG_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let shutdown_grace_secs = env::var("BUILDRIG_SHUTDOWN_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS);

        let options_dir = env::var("BUILDRIG_OPTIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_options_dir());

        let condition = env::var("BUILDRIG_CONDITION")
            .ok()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            script_dir,
            python,
            log_level,
            shutdown_grace_secs,
            options_dir,
            condition,
        }
    }
}

impl BuildrigConfig {
    fn default_options_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join("buildrig")
            .join("options")
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the grace period or log level is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown_grace_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Shutdown grace period must be at least 1 second".to_string(),
            ));
        }
        if self.shutdown_grace_secs > MAX_SHUTDOWN_GRACE_SECS {
            return Err(ConfigError::ValidationFailed(
                "Shutdown grace period cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.python.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Python interpreter path is empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "script_dir".to_string(),
            self.script_dir.display().to_string(),
        );
        map.insert("python".to_string(), self.python.display().to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert(
            "shutdown_grace_secs".to_string(),
            self.shutdown_grace_secs.to_string(),
        );
        map.insert(
            "options_dir".to_string(),
            self.options_dir.display().to_string(),
        );
        if let Some(ref condition) = self.condition {
            map.insert("condition".to_string(), condition.clone());
        }
        map
    }
}

impl fmt::Display for BuildrigConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buildrig Configuration:")?;
        writeln!(f, "  Script Dir: {}", self.script_dir.display())?;
        writeln!(f, "  Python: {}", self.python.display())?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Shutdown Grace: {}s", self.shutdown_grace_secs)?;
        writeln!(f, "  Options Dir: {}", self.options_dir.display())?;
        if let Some(ref condition) = self.condition {
            writeln!(f, "  Condition: {}", condition)?;
        }
        Ok(())
    }
}
