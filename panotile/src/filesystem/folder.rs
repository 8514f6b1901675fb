use super::{prefix_segment, Descriptor, DescriptorError, TileFileSystem};
use crate::loader::{BoxFuture, ResourceLoader};

/// Tiles stored as individual files under the base URL.
///
/// Layout: `{base}/{prefix/}descriptor`, `{base}/{prefix/}poster{suffix}` and
/// `{base}/{prefix/}{-zoom}/{x}_{y}{suffix}`.
#[derive(Debug, Clone)]
pub struct FolderFileSystem {
    base_path: String,
    prefix: Option<String>,
    suffix: String,
}

impl FolderFileSystem {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            prefix: None,
            suffix: String::new(),
        }
    }

    /// Use `suffix` for tile and poster names without loading a descriptor.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    fn filename(&self, name: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_path,
            prefix_segment(self.prefix.as_deref()),
            name
        )
    }
}

impl TileFileSystem for FolderFileSystem {
    fn set_prefix(&mut self, prefix: Option<&str>) {
        self.prefix = prefix.map(str::to_string);
    }

    fn load_descriptor<'a>(
        &'a mut self,
        loader: &'a ResourceLoader,
    ) -> BoxFuture<'a, Result<Descriptor, DescriptorError>> {
        Box::pin(async move {
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
