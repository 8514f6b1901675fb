//! Deep Zoom (DZI) layout.
//!
//! The descriptor is an XML document at `{base}{prefix}.xml`:
//!
//! ```xml
//! <Image TileSize="256" Overlap="1" Format="jpg">
//!   <Size Width="4000" Height="3000"/>
//! </Image>
//! ```
//!
//! DZI numbers levels upwards from a 1×1 image, so level
//! `ceil(log2(max(width, height)))` is full resolution. Tiles live at
//! `{base}{prefix}/{level}/{x}_{y}.{format}`.

use std::sync::OnceLock;

use regex::Regex;

use super::{Descriptor, DescriptorError, TileFileSystem};
use crate::loader::{BoxFuture, ResourceLoader};

static IMAGE_TAG: OnceLock<Regex> = OnceLock::new();
static SIZE_TAG: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();

fn image_tag() -> &'static Regex {
    IMAGE_TAG.get_or_init(|| Regex::new(r"<(?:\w+:)?Image\b([^>]*)>").expect("valid regex"))
}

fn size_tag() -> &'static Regex {
    SIZE_TAG.get_or_init(|| Regex::new(r"<(?:\w+:)?Size\b([^>]*)/?>").expect("valid regex"))
}

fn attribute() -> &'static Regex {
    ATTRIBUTE.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).expect("valid regex"))
}

/// File system for Deep Zoom images.
#[derive(Debug, Clone)]
pub struct DeepZoomFileSystem {
    base_path: String,
    prefix: String,
    suffix: String,
    full_zoom_level: i32,
    poster_url: String,
}

impl DeepZoomFileSystem {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            prefix: String::new(),
            suffix: String::new(),
            full_zoom_level: 0,
            poster_url: String::new(),
        }
    }

    fn filename(&self, name: &str) -> String {
        format!("{}{}/{}", self.base_path, self.prefix, name)
    }

    /// Parse the DZI XML and record the level offset and poster location.
    fn apply(&mut self, xml: &str) -> Result<Descriptor, DescriptorError> {
        let image = image_tag()
            .captures(xml)
            .ok_or_else(|| DescriptorError::MalformedXml("no <Image> element".to_string()))?;
        let size = size_tag()
            .captures(xml)
            .ok_or_else(|| DescriptorError::MalformedXml("no <Size> element".to_string()))?;

        let image_attrs = &image[1];
        let size_attrs = &size[1];
        let width: u32 = number_attr(size_attrs, "Width")?;
        let height: u32 = number_attr(size_attrs, "Height")?;
        let tile_size: u32 = number_attr(image_attrs, "TileSize")?;
        let overlap: u32 = number_attr(image_attrs, "Overlap")?;
        let format = attr(image_attrs, "Format")?;

        self.suffix = format!(".{}", format);
        self.full_zoom_level = (width.max(height) as f64).log2().ceil() as i32;

        let descriptor = Descriptor {
            width,
            height,
            tile_size,
            overlap,
            min_zoom: -self.full_zoom_level,
            poster_size: tile_size,
            suffix: self.suffix.clone(),
        };
        descriptor.validate()?;

        let poster_level = (tile_size as f64).log2().ceil() as i32;
        self.poster_url = self.image_url(0, 0, poster_level - self.full_zoom_level);
        Ok(descriptor)
    }
}

impl TileFileSystem for DeepZoomFileSystem {
    fn set_prefix(&mut self, prefix: Option<&str>) {
        self.prefix = prefix.unwrap_or("").to_string();
    }

    fn load_descriptor<'a>(
        &'a mut self,
        loader: &'a ResourceLoader,
    ) -> BoxFuture<'a, Result<Descriptor, DescriptorError>> {
        Box::pin(async move {
            let url = format!("{}{}.xml", self.base_path, self.prefix);
            let xml = loader.fetch_text(&url).await?;
            self.apply(&xml)
        })
    }

    fn image_url(&self, x: i64, y: i64, zoom: i32) -> String {
        let level = self.full_zoom_level + zoom;
        self.filename(&format!("{}/{}_{}{}", level, x, y, self.suffix))
    }

    fn poster_url(&self) -> String {
        self.poster_url.clone()
    }
}

fn attr(attrs: &str, name: &str) -> Result<String, DescriptorError> {
    attribute()
        .captures_iter(attrs)
        .find(|c| &c[1] == name)
        .map(|c| c[2].to_string())
        .ok_or_else(|| DescriptorError::MalformedXml(format!("missing attribute {}", name)))
}

fn number_attr<T: std::str::FromStr>(attrs: &str, name: &str) -> Result<T, DescriptorError> {
    let value = attr(attrs, name)?;
    value.trim().parse().map_err(|_| DescriptorError::InvalidField {
        field: name.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Image TileSize="256" Overlap="1" Format="jpg" ServerFormat="Default" xmnls="http://schemas.microsoft.com/deepzoom/2009">
  <Size Width="4000" Height="3000"/>
</Image>"#;

    #[test]
    fn test_parse_dzi() {
        let mut fs = DeepZoomFileSystem::new("http://host/img");
        let d = fs.apply(XML).unwrap();
        assert_eq!((d.width, d.height), (4000, 3000));
        assert_eq!(d.tile_size, 256);
        assert_eq!(d.overlap, 1);
        assert_eq!(d.suffix, ".jpg");
        assert_eq!(d.min_zoom, -12);
        assert_eq!(d.poster_size, 256);
    }

    #[test]
    fn test_urls_count_levels_from_one_pixel() {
        let mut fs = DeepZoomFileSystem::new("http://host/img");
        fs.apply(XML).unwrap();
        assert_eq!(fs.image_url(2, 3, 0), "http://host/img/12/2_3.jpg");
        assert_eq!(fs.image_url(0, 0, -4), "http://host/img/8/0_0.jpg");
        assert_eq!(fs.poster_url(), "http://host/img/8/0_0.jpg");
    }

    #[test]
    fn test_prefix_is_appended_to_base() {
        let mut fs = DeepZoomFileSystem::new("http://host/pano_");
        fs.set_prefix(Some("face_f"));
        fs.apply(XML).unwrap();
        assert_eq!(fs.image_url(0, 0, 0), "http://host/pano_face_f/12/0_0.jpg");
    }

    #[test]
    fn test_missing_size_element() {
        let mut fs = DeepZoomFileSystem::new("x");
        let err = fs
            .apply(r#"<Image TileSize="256" Overlap="0" Format="png"></Image>"#)
            .unwrap_err();
        assert!(matches!(err, DescriptorError::MalformedXml(_)));
    }
}
