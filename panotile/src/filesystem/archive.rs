//! Packed archive addressed by byte ranges.
//!
//! # File Format
//!
//! ```text
//! +--------------------------------+---------------------+-----------------+
//! | "BIGSHOT" + hex index size     | index (text)        | file data ...   |
//! | 24 bytes                       | index size bytes    |                 |
//! +--------------------------------+---------------------+-----------------+
//! ```
//!
//! The index is a colon-separated list of `name:start:length` triples, with
//! `start` relative to the end of the index. Every file is fetched with a
//! ranged request `{base}&start={s}&length={l}&type={mime}`.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{prefix_segment, Descriptor, DescriptorError, TileFileSystem};
use crate::loader::{BoxFuture, ResourceLoader};

/// Magic at the start of every archive.
pub const ARCHIVE_MAGIC: &str = "BIGSHOT";

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexEntry {
    start: u64,
    length: u64,
}

/// File system reading from a single packed archive.
#[derive(Debug, Clone)]
pub struct ArchiveFileSystem {
    base_path: String,
    prefix: Option<String>,
    suffix: String,
    index: Option<HashMap<String, IndexEntry>>,
}

impl ArchiveFileSystem {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            prefix: None,
            suffix: String::new(),
            index: None,
        }
    }

    async fn load_index(&mut self, loader: &ResourceLoader) -> Result<(), DescriptorError> {
        if self.index.is_some() {
            return Ok(());
        }

        let header_url = format!(
            "{}&start=0&length={}&type=text/plain",
            self.base_path, HEADER_SIZE
        );
        let header = loader.fetch_text(&header_url).await?;
        let index_size = parse_header(&header)?;

        let index_url = format!(
            "{}&type=text/plain&start={}&length={}",
            self.base_path, HEADER_SIZE, index_size
        );
        let text = loader.fetch_text(&index_url).await?;
        let index = parse_index(&text, index_size + HEADER_SIZE)?;
        debug!(base = %self.base_path, entries = index.len(), "Archive index loaded");

        self.index = Some(index);
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<IndexEntry> {
        self.index.as_ref()?.get(name).copied()
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}{}", prefix_segment(self.prefix.as_deref()), name)
    }

    fn filename(&self, name: &str) -> String {
        let name = self.qualified(name);
        let entry = self.entry(&name).unwrap_or_else(|| {
            warn!(base = %self.base_path, name = %name, "Archive has no such entry");
            IndexEntry { start: 0, length: 0 }
        });
        format!(
            "{}&start={}&length={}&type={}",
            self.base_path,
            entry.start,
            entry.length,
            mime_type(&name)
        )
    }
}

impl TileFileSystem for ArchiveFileSystem {
    fn set_prefix(&mut self, prefix: Option<&str>) {
        self.prefix = prefix.map(str::to_string);
    }

    fn load_descriptor<'a>(
        &'a mut self,
        loader: &'a ResourceLoader,
    ) -> BoxFuture<'a, Result<Descriptor, DescriptorError>> {
        Box::pin(async move {
            self.load_index(loader).await?;
            let name = self.qualified("descriptor");
            if self.entry(&name).is_none() {
                return Err(DescriptorError::MissingEntry(name));
            }
            let text = loader.fetch_text(&self.filename("descriptor")).await?;
            let descriptor = Descriptor::parse(&text)?;
            self.suffix = descriptor.suffix.clone();
            Ok(descriptor)
        })
    }

    fn image_url(&self, x: i64, y: i64, zoom: i32) -> String {
        self.filename(&format!("{}/{}_{}{}", -zoom, x, y, self.suffix))
    }

    fn poster_url(&self) -> String {
        self.filename(&format!("poster{}", self.suffix))
    }
}

/// Validate the magic and return the index size.
fn parse_header(header: &str) -> Result<u64, DescriptorError> {
    if !header.starts_with(ARCHIVE_MAGIC) {
        return Err(DescriptorError::BadArchiveHeader(format!(
            "expected '{}' magic",
            ARCHIVE_MAGIC
        )));
    }
    let size_field = header.get(ARCHIVE_MAGIC.len() + 1..).unwrap_or("").trim();
    let digits: String = size_field
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u64::from_str_radix(&digits, 16).map_err(|_| {
        DescriptorError::BadArchiveHeader(format!("invalid index size '{}'", size_field))
    })
}

fn parse_index(text: &str, offset: u64) -> Result<HashMap<String, IndexEntry>, DescriptorError> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(DescriptorError::Malformed(
            "archive index is not a list of name:start:length triples".to_string(),
        ));
    }

    let mut index = HashMap::with_capacity(parts.len() / 3);
    for triple in parts.chunks(3) {
        let number = |value: &str| -> Result<u64, DescriptorError> {
            value.trim().parse().map_err(|_| DescriptorError::InvalidField {
                field: triple[0].to_string(),
                value: value.to_string(),
            })
        };
        index.insert(
            triple[0].to_string(),
            IndexEntry {
                start: number(triple[1])? + offset,
                length: number(triple[2])?,
            },
        );
    }
    Ok(index)
}

fn mime_type(name: &str) -> &'static str {
    if name.ends_with(".jpg") {
        "image/jpeg"
    } else if name.ends_with(".png") {
        "image/png"
    } else {
        "text/plain"
    }
}
