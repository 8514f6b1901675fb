//! Loading and saving `config.ini`.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, info};

use super::keys::ConfigKey;
use super::settings::{
    CacheSettings, LoaderSettings, LodSettings, LoggingSettings, SourceSettings, ViewSettings,
};

/// File name inside [`config_directory`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panotile")
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub loader: LoaderSettings,
    pub cache: CacheSettings,
    pub lod: LodSettings,
    pub view: ViewSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config = Self::parse(&text)?;
        debug!(path = %path.display(), "Config read");
        Ok(config)
    }

    /// Parse INI text. Unknown sections and keys are ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Render as INI. Empty values are left out.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FileSystemKind;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ConfigFile::parse(
            "[source]\nbase_path = http://example.com/pano\nfilesystem = archive\n\n[lod]\ntarget_fps = 60\n\n[extra]\nignored = yes\n",
        )
        .unwrap();
        assert_eq!(config.source.base_path, "http://example.com/pano");
        assert_eq!(config.source.filesystem, FileSystemKind::Archive);
        assert_eq!(config.lod.target_fps, 60.0);
        assert_eq!(config.lod.max_mag, 16.0);
        assert_eq!(config.cache, CacheSettings::default());
    }

    #[test]
    fn test_bad_value_is_reported() {
        let err = ConfigFile::parse("[cache]\nimage_capacity = -3\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "cache.image_capacity"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = ConfigFile::default();
        config.view.fling = false;
        config.view.max_tesselation = 3;
        config.logging.directory = "/tmp/panotile-logs".to_string();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_empty_values_not_written() {
        let ini = ConfigFile::default().to_ini();
        assert!(ini.get_from(Some("source"), "base_path").is_none());
        assert_eq!(ini.get_from(Some("lod"), "enabled"), Some("true"));
    }
}
