//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use panotile::config::ConfigFile;
use panotile::filesystem::FileSystemKind;
use panotile::render::RendererKind;

use crate::error::CliError;

/// Tile layout selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileSystemArg {
    /// Plain directory tree with a `descriptor` file
    Folder,
    /// Single packed archive addressed by byte ranges
    Archive,
    /// Deep Zoom (`.xml` descriptor plus `_files` tree)
    Dzi,
}

impl From<FileSystemArg> for FileSystemKind {
    fn from(arg: FileSystemArg) -> Self {
        match arg {
            FileSystemArg::Folder => FileSystemKind::Folder,
            FileSystemArg::Archive => FileSystemKind::Archive,
            FileSystemArg::Dzi => FileSystemKind::DeepZoom,
        }
    }
}

/// Renderer backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum RendererArg {
    /// Textured meshes
    #[default]
    Mesh,
    /// Affine-transformed tile images
    Compositor,
}

impl From<RendererArg> for RendererKind {
    fn from(arg: RendererArg) -> Self {
        match arg {
            RendererArg::Mesh => RendererKind::Mesh,
            RendererArg::Compositor => RendererKind::Compositor,
        }
    }
}

/// Resolve the image location from CLI args and config.
pub fn resolve_source(
    cli_base: Option<String>,
    cli_filesystem: Option<FileSystemArg>,
    config: &ConfigFile,
) -> Result<(String, FileSystemKind), CliError> {
    // CLI takes precedence, then config
    let base = cli_base
        .or_else(|| Some(config.source.base_path.clone()).filter(|b| !b.is_empty()))
        .ok_or_else(|| {
            CliError::Config(
                "No image given. Pass a base URL or set source.base_path in config.ini"
                    .to_string(),
            )
        })?;
    let kind = cli_filesystem
        .map(FileSystemKind::from)
        .unwrap_or(config.source.filesystem);
    Ok((base, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let mut config = ConfigFile::default();
        config.source.base_path = "http://config.test/img".to_string();
        config.source.filesystem = FileSystemKind::Archive;

        let (base, kind) =
            resolve_source(Some("http://cli.test/img".to_string()), Some(FileSystemArg::Dzi), &config)
                .unwrap();
        assert_eq!(base, "http://cli.test/img");
        assert_eq!(kind, FileSystemKind::DeepZoom);

        let (base, kind) = resolve_source(None, None, &config).unwrap();
        assert_eq!(base, "http://config.test/img");
        assert_eq!(kind, FileSystemKind::Archive);
    }

    #[test]
    fn test_missing_base_is_an_error() {
        let result = resolve_source(None, None, &ConfigFile::default());
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
