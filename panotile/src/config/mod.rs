//! Configuration file handling.
//!
//! Settings are stored as INI under the user's config directory
//! (`~/.config/panotile/config.ini` on Linux). A missing file or missing key
//! falls back to defaults; a value that does not parse is an error.
//!
//! Every component also has its own config struct with a `from_settings`
//! bridge, so the library is usable without a file.

mod file;
mod keys;
mod settings;

pub use file::{config_directory, config_file_path, ConfigError, ConfigFile, CONFIG_FILE_NAME};
pub use keys::ConfigKey;
pub use settings::{
    CacheSettings, LoaderSettings, LodSettings, LoggingSettings, SourceSettings, ViewSettings,
};
