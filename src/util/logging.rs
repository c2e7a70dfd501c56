//! Structured logging setup for buildrig
//!
//! All output goes to stderr through `tracing`; stdout is reserved for
//! command output such as reports and JSON listings. `RUST_LOG`, when set,
//! replaces the `buildrig=<level>` directive entirely.
//!
//! ```no_run
//! use buildrig::util::logging;
//! use tracing::info;
//!
//! logging::init_from_env();
//! info!(context = "CppExample", "Collecting tasks");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LEVEL_VAR: &str = "BUILDRIG_LOG_LEVEL";
const JSON_VAR: &str = "BUILDRIG_LOG_JSON";

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// One JSON object per line instead of human-readable text
    pub use_json: bool,
    /// Module path of the event, e.g. `buildrig::pipeline::orchestrator`
    pub include_target: bool,
    pub include_location: bool,
    /// Thread ids and names; useful when background tasks interleave
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::with_level(Level::INFO)
    }
}

impl LoggingConfig {
    /// Console output at `level` with targets shown
    ///
    /// ```
    /// use buildrig::util::LoggingConfig;
    /// use tracing::Level;
    ///
    /// let config = LoggingConfig::with_level(Level::DEBUG);
    /// assert_eq!(config.level, Level::DEBUG);
    /// assert!(!config.use_json);
    /// ```
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }

    /// JSON with full metadata, for CI log collectors
    pub fn production() -> Self {
        Self {
            use_json: true,
            include_location: true,
            include_thread_ids: true,
            ..Self::with_level(Level::INFO)
        }
    }

    pub fn development() -> Self {
        Self::with_level(Level::DEBUG)
    }

    /// Level from `BUILDRIG_LOG_LEVEL`, format from `BUILDRIG_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var(LEVEL_VAR)
            .map(|value| parse_level(&value))
            .unwrap_or(Level::INFO);
        Self {
            use_json: json_from_env(),
            ..Self::with_level(level)
        }
    }
}

/// Whether `BUILDRIG_LOG_JSON` asks for JSON output; anything but `true` is off
pub fn json_from_env() -> bool {
    env::var(JSON_VAR)
        .ok()
        .and_then(|value| value.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

/// Case-insensitive level name; unknown input falls back to INFO with a warning
///
/// ```
/// use buildrig::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Warn"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(value: &str) -> Level {
    value.trim().parse::<Level>().unwrap_or_else(|_| {
        eprintln!(
            "Unknown log level '{}', using info (expected trace, debug, info, warn or error)",
            value
        );
        Level::INFO
    })
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var_os("RUST_LOG").is_some() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(format!("buildrig={}", level))
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let json = config.use_json.then(|| {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_ids)
                .with_thread_names(config.include_thread_ids)
        });
        let text = (!config.use_json).then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_ids)
                .with_thread_names(config.include_thread_ids)
        });

        let installed = tracing_subscriber::registry()
            .with(build_filter(config.level))
            .with(json)
            .with(text)
            .try_init();
        if let Err(e) = installed {
            eprintln!("Logging already configured elsewhere: {}", e);
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" info "), Level::INFO);
        assert_eq!(parse_level("Warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_presets() {
        let default = LoggingConfig::default();
        assert_eq!(default.level, Level::INFO);
        assert!(!default.use_json);
        assert!(default.include_target);

        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);
        assert!(production.include_thread_ids);

        assert_eq!(LoggingConfig::development().level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var(LEVEL_VAR, "warn");
        env::set_var(JSON_VAR, "true");
        let config = LoggingConfig::from_env();
        env::remove_var(LEVEL_VAR);
        env::remove_var(JSON_VAR);

        assert_eq!(config.level, Level::WARN);
        assert!(config.use_json);
        assert!(!json_from_env());
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(LoggingConfig::with_level(Level::WARN));
        init_logging(LoggingConfig::development());
    }
}
