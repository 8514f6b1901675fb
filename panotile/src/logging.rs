//! Tracing subscriber setup.
//!
//! Console output always; a daily rolling log file when a directory is
//! configured. `RUST_LOG` overrides the configured filter.

use std::path::PathBuf;

use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

pub use tracing_appender::non_blocking::WorkerGuard;

/// Default filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_DIRECTIVE: &str = "panotile=info";

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "panotile.log";

/// Subscriber options.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub directive: String,
    /// Directory for the rolling log file; `None` logs to the console only.
    pub directory: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_DIRECTIVE.to_string(),
            directory: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Build from the `[logging]` section of the config file.
    ///
    /// A bare level such as `debug` applies to this crate only; anything
    /// containing `=` or `,` is used as a full filter directive.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let level = settings.level.trim();
        let directive = if level.is_empty() {
            DEFAULT_DIRECTIVE.to_string()
        } else if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("panotile={}", level)
        };
        let directory = (!settings.directory.trim().is_empty())
            .then(|| PathBuf::from(settings.directory.trim()));

        Self {
            directive,
            directory,
            ..Self::default()
        }
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes and stops the file writer.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>, TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.directive));

    // Must be read before any threads are spawned to get a real offset.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let console = fmt::layer()
        .with_ansi(config.ansi)
        .with_timer(timer.clone());

    let (file, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}
