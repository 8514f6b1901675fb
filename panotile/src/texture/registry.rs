//! Texture handles for the immediate-mode renderer.
//!
//! A [`TextureFactory`] turns decoded pixels into renderer-owned textures.
//! [`TextureRegistry`] is the in-process implementation: it hands out
//! numbered handles and tracks which ones are alive, which is all a headless
//! mesh renderer needs and lets tests detect leaked or double-freed textures.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use tracing::warn;

/// Opaque handle to a texture owned by a [`TextureFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u64);

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Creates and destroys renderer textures.
pub trait TextureFactory: Send + Sync {
    /// Upload `image` and return a handle to the new texture.
    fn create_texture(&self, image: &RgbaImage) -> TextureHandle;

    /// Release a texture. The handle must not be used afterwards.
    fn delete_texture(&self, handle: TextureHandle);
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: HashMap<TextureHandle, (u32, u32)>,
    created: u64,
    deleted: u64,
}

/// Headless [`TextureFactory`] recording texture sizes by handle.
///
/// Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions of a live texture.
    pub fn dimensions(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.state.lock().live.get(&handle).copied()
    }

    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }

    /// Number of textures created and not yet deleted.
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.state.lock().created
    }

    pub fn deleted_count(&self) -> u64 {
        self.state.lock().deleted
    }
}

impl TextureFactory for TextureRegistry {
    fn create_texture(&self, image: &RgbaImage) -> TextureHandle {
        let mut state = self.state.lock();
        let handle = TextureHandle(state.next_id);
        state.next_id += 1;
        state.created += 1;
        state.live.insert(handle, image.dimensions());
        handle
    }

    fn delete_texture(&self, handle: TextureHandle) {
        let mut state = self.state.lock();
        if state.live.remove(&handle).is_some() {
            state.deleted += 1;
        } else {
            warn!(texture = %handle, "Deleting unknown texture");
        }
    }
}
