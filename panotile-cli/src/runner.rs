//! Shared setup for commands that touch the network.

use std::future::Future;
use std::path::Path;

use panotile::config::{config_file_path, ConfigFile};
use panotile::loader::{LoaderConfig, ResourceLoader};
use panotile::logging::{init_logging, LoggingConfig, WorkerGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Loaded configuration, logging and an async runtime.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load the config file, install logging and start the runtime.
    pub fn new() -> Result<Self, CliError> {
        let config_path = config_file_path();
        let config = ConfigFile::load_from(&config_path)?;

        // Logging first: the local time offset can only be read while the
        // process is single-threaded.
        let log_guard = init_logging(LoggingConfig::from_settings(&config.logging))
            .map_err(|e| CliError::Config(format!("Failed to initialize logging: {}", e)))?;
        log_config_source(&config_path);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn log_startup(&self, command: &str) {
        info!(version = panotile::VERSION, command, "panotile starting");
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// HTTP-backed loader configured from `[loader]`.
    pub fn loader(&self) -> Result<ResourceLoader, CliError> {
        let config = LoaderConfig::from_settings(&self.config.loader);
        Ok(ResourceLoader::with_reqwest(config, self.runtime.handle().clone())?)
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Report where the configuration came from. Runs once logging is up.
fn log_config_source(path: &Path) {
    if path.exists() {
        info!(path = %path.display(), "Config loaded");
    } else {
        info!(path = %path.display(), "No config file, using defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.text()
    }

    #[test]
    fn test_config_source_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[lod]\nenabled = false\n").unwrap();

        let output = capture(|| log_config_source(&path));
        assert!(output.contains("Config loaded"));
        assert!(output.contains("config.ini"));
    }

    #[test]
    fn test_missing_config_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ini");

        let output = capture(|| log_config_source(&path));
        assert!(output.contains("No config file, using defaults"));
    }
}
