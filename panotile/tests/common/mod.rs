//! Shared fixtures for integration tests: an in-memory HTTP client and
//! helpers to build encoded tiles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use panotile::loader::{AsyncHttpClient, BoxFuture, FetchError, LoaderConfig, ResourceLoader};
use tokio::runtime::Handle;

pub const BASE: &str = "http://images.test/gallery";

/// Serves registered bodies, 404 for everything else, and counts requests.
#[derive(Default)]
pub struct StaticServer {
    bodies: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    latency: Option<Duration>,
}

impl StaticServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn serve(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.bodies.lock().insert(url.into(), body.into());
    }

    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for StaticServer {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            *self.requests.lock().entry(url.to_string()).or_default() += 1;
            self.total.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.bodies
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        })
    }
}

/// Loader on the current runtime backed by `server`.
pub fn loader(server: &Arc<StaticServer>) -> ResourceLoader {
    ResourceLoader::new(server.clone(), LoaderConfig::default(), Handle::current())
}

/// A square solid-color PNG.
pub fn solid_png(size: u32, color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(size, size, Rgba(color));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("png encoding");
    out.into_inner()
}

/// Folder-layout descriptor for a 1024px square image with 256px tiles.
pub const DESCRIPTOR: &str =
    "width:1024:height:1024:tileSize:256:overlap:0:minZoom:-2:posterSize:128:suffix:.png";

pub fn tile_url(x: i64, y: i64, zoom: i32) -> String {
    format!("{}/{}/{}_{}.png", BASE, -zoom, x, y)
}

pub fn poster_url() -> String {
    format!("{}/poster.png", BASE)
}

pub fn descriptor_url() -> String {
    format!("{}/descriptor", BASE)
}
