//! Image descriptor and its colon-separated text format.

use serde::Serialize;
use thiserror::Error;

use crate::loader::FetchError;

/// Errors raised while loading a descriptor. All of them abort setup.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor, header or index could not be fetched.
    #[error("Unable to load descriptor: {0}")]
    Fetch(#[from] FetchError),

    /// The descriptor text is not a sequence of `key:value` pairs.
    #[error("Malformed descriptor: {0}")]
    Malformed(String),

    /// A numeric field does not parse.
    #[error("Invalid value {value:?} for descriptor field '{field}'")]
    InvalidField { field: String, value: String },

    /// A required field is absent.
    #[error("Descriptor is missing required field '{0}'")]
    MissingField(&'static str),

    /// The archive does not start with the expected magic.
    #[error("Not a valid archive: {0}")]
    BadArchiveHeader(String),

    /// The archive index has no entry for a required file.
    #[error("Archive has no entry for '{0}'")]
    MissingEntry(String),

    /// The Deep Zoom XML does not contain the expected elements.
    #[error("Malformed DZI document: {0}")]
    MalformedXml(String),

    #[error("Unknown file system type '{0}' (expected folder, archive or dzi)")]
    UnknownFileSystem(String),
}

/// Geometry of one tiled image (or one cube face).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// Full-resolution width in pixels.
    pub width: u32,
    /// Full-resolution height in pixels.
    pub height: u32,
    /// Tile edge length in pixels, including overlap.
    pub tile_size: u32,
    /// Pixels shared between neighbouring tiles.
    pub overlap: u32,
    /// Coarsest zoom level available (zero or negative).
    pub min_zoom: i32,
    /// Longest edge of the poster image in pixels; 0 if unknown.
    pub poster_size: u32,
    /// File name suffix of tiles, e.g. `.jpg`.
    pub suffix: String,
}

impl Descriptor {
    /// Parse the `key:value:key:value...` descriptor format.
    ///
    /// Every value is an integer except `suffix`. Unknown keys are ignored.
    /// `width`, `height` and `tileSize` are required.
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        if parts.len() % 2 != 0 {
            return Err(DescriptorError::Malformed(format!(
                "odd number of fields in '{}'",
                text.trim()
            )));
        }

        let mut width = None;
        let mut height = None;
        let mut tile_size = None;
        let mut overlap = 0;
        let mut min_zoom = 0;
        let mut poster_size = 0;
        let mut suffix = String::new();

        for pair in parts.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            match key {
                "suffix" => suffix = value.to_string(),
                "width" => width = Some(parse_field(key, value)?),
                "height" => height = Some(parse_field(key, value)?),
                "tileSize" => tile_size = Some(parse_field(key, value)?),
                "overlap" => overlap = parse_field(key, value)?,
                "posterSize" => poster_size = parse_field(key, value)?,
                "minZoom" => min_zoom = parse_field(key, value)?,
                _ => {}
            }
        }

        let descriptor = Self {
            width: width.ok_or(DescriptorError::MissingField("width"))?,
            height: height.ok_or(DescriptorError::MissingField("height"))?,
            tile_size: tile_size.ok_or(DescriptorError::MissingField("tileSize"))?,
            overlap,
            min_zoom,
            poster_size,
            suffix,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub(crate) fn validate(&self) -> Result<(), DescriptorError> {
        if self.tile_size == 0 || self.overlap >= self.tile_size {
            return Err(DescriptorError::Malformed(format!(
                "tile size {} with overlap {}",
                self.tile_size, self.overlap
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(DescriptorError::Malformed(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Zoom level at which the poster has the same resolution as the image,
    /// i.e. `log2(poster_size / max(width, height))`.
    ///
    /// Returns negative infinity when the poster size is unknown.
    pub fn poster_zoom_level(&self) -> f64 {
        if self.poster_size == 0 {
            return f64::NEG_INFINITY;
        }
        (self.poster_size as f64 / self.width.max(self.height) as f64).log2()
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, DescriptorError> {
    value
        .trim()
        .parse()
        .map_err(|_| DescriptorError::InvalidField {
            field: field.to_string(),
            value: value.to_string(),
        })
}
