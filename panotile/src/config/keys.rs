//! Addressable configuration keys (`section.key`).

use std::fmt;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};

fn parse_value<T: FromStr>(key: &ConfigKey, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.name(),
        value: value.to_string(),
    })
}

macro_rules! config_keys {
    ($( $variant:ident => $section:literal . $name:literal : $($field:ident).+ ),+ $(,)?) => {
        /// Every key the configuration file understands.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ConfigKey {
            $($variant),+
        }

        impl ConfigKey {
            /// All keys, grouped by section in file order.
            pub fn all() -> &'static [ConfigKey] {
                &[$(ConfigKey::$variant),+]
            }

            pub fn section(&self) -> &'static str {
                match self {
                    $(ConfigKey::$variant => $section),+
                }
            }

            pub fn key_name(&self) -> &'static str {
                match self {
                    $(ConfigKey::$variant => $name),+
                }
            }

            /// Current value rendered as it would be written to the file.
            pub fn get(&self, config: &ConfigFile) -> String {
                match self {
                    $(ConfigKey::$variant => config.$($field).+.to_string()),+
                }
            }

            /// Parse `value` and store it in `config`.
            ///
            /// # Errors
            ///
            /// Returns [`ConfigError::InvalidValue`] when `value` does not
            /// parse as the key's type.
            pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
                match self {
                    $(ConfigKey::$variant => config.$($field).+ = parse_value(self, value)?),+
                }
                Ok(())
            }
        }
    };
}

config_keys! {
    SourceBasePath => "source"."base_path": source.base_path,
    SourceFileSystem => "source"."filesystem": source.filesystem,

    LoaderMaxRetries => "loader"."max_retries": loader.max_retries,
    LoaderRetryStepMs => "loader"."retry_step_ms": loader.retry_step_ms,
    LoaderTimeoutSecs => "loader"."timeout_secs": loader.timeout_secs,

    CacheImageCapacity => "cache"."image_capacity": cache.image_capacity,
    CacheEvictionsPerPurge => "cache"."evictions_per_purge": cache.evictions_per_purge,
    CacheTextureCapacity => "cache"."texture_capacity": cache.texture_capacity,
    CacheDecodedCapacity => "cache"."decoded_capacity": cache.decoded_capacity,
    CacheTextureEvictionsPerPurge => "cache"."texture_evictions_per_purge": cache.texture_evictions_per_purge,
    CacheNotifyIntervalMs => "cache"."notify_interval_ms": cache.notify_interval_ms,
    CacheWrapX => "cache"."wrap_x": cache.wrap_x,
    CacheWrapY => "cache"."wrap_y": cache.wrap_y,

    LodEnabled => "lod"."enabled": lod.enabled,
    LodTargetFps => "lod"."target_fps": lod.target_fps,
    LodTolerance => "lod"."tolerance": lod.tolerance,
    LodRate => "lod"."rate": lod.rate,
    LodMinMag => "lod"."min_mag": lod.min_mag,
    LodMaxMag => "lod"."max_mag": lod.max_mag,
    LodHqRenderMag => "lod"."hq_render_mag": lod.hq_render_mag,
    LodHqRenderDelayMs => "lod"."hq_render_delay_ms": lod.hq_render_delay_ms,
    LodHqRenderIntervalMs => "lod"."hq_render_interval_ms": lod.hq_render_interval_ms,

    ViewMinFov => "view"."min_fov": view.min_fov,
    ViewMaxFov => "view"."max_fov": view.max_fov,
    ViewMinPitch => "view"."min_pitch": view.min_pitch,
    ViewMaxPitch => "view"."max_pitch": view.max_pitch,
    ViewMinYaw => "view"."min_yaw": view.min_yaw,
    ViewMaxYaw => "view"."max_yaw": view.max_yaw,
    ViewFling => "view"."fling": view.fling,
    ViewFlingScale => "view"."fling_scale": view.fling_scale,
    ViewMaxTextureMagnification => "view"."max_texture_magnification": view.max_texture_magnification,
    ViewMaxTesselation => "view"."max_tesselation": view.max_tesselation,
    ViewDevicePixelRatio => "view"."device_pixel_ratio": view.device_pixel_ratio,

    LoggingLevel => "logging"."level": logging.level,
    LoggingDirectory => "logging"."directory": logging.directory,
}

impl ConfigKey {
    /// Full name in `section.key` form.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FileSystemKind;
    use std::collections::HashSet;

    #[test]
    fn test_key_names_are_unique() {
        let names: HashSet<String> = ConfigKey::all().iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), ConfigKey::all().len());
    }

    #[test]
    fn test_parse_key() {
        assert_eq!("lod.target_fps".parse::<ConfigKey>().unwrap(), ConfigKey::LodTargetFps);
        assert_eq!(" View.Fling ".parse::<ConfigKey>().unwrap(), ConfigKey::ViewFling);
        assert!(matches!(
            "lod.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_get_and_set() {
        let mut config = ConfigFile::default();
        assert_eq!(ConfigKey::LodTargetFps.get(&config), "30");
        assert_eq!(ConfigKey::ViewMaxTesselation.get(&config), "-1");

        ConfigKey::SourceFileSystem.set(&mut config, "dzi").unwrap();
        ConfigKey::CacheWrapX.set(&mut config, "true").unwrap();
        ConfigKey::LodMinMag.set(&mut config, "2.5").unwrap();
        assert_eq!(config.source.filesystem, FileSystemKind::DeepZoom);
        assert!(config.cache.wrap_x);
        assert_eq!(config.lod.min_mag, 2.5);
    }

    #[test]
    fn test_set_rejects_bad_value() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::LoaderMaxRetries.set(&mut config, "lots").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "loader.max_retries");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(config.loader.max_retries, 0);
    }
}
