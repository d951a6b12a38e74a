//! Decoded thumbnail cache for fast repaints.
//!
//! Caches RGB8 pixel data keyed by thumbnail file path using an LRU policy,
//! so redrawing the grid after a resize or filter change does not decode
//! the same PNGs again.

use crate::image_loader;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decoded thumbnail pixels.
#[derive(Clone)]
pub struct CachedImage {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl CachedImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
        }
    }
}

/// LRU cache of decoded thumbnails.
pub struct ImageCache {
    cache: LruCache<PathBuf, CachedImage>,
}

impl ImageCache {
    /// Creates a new image cache with the specified capacity (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Retrieves an image from the cache if it exists.
    pub fn get(&mut self, path: &Path) -> Option<CachedImage> {
        let result = self.cache.get(path).cloned();
        if result.is_some() {
            log::trace!("Decoded cache HIT: {}", path.display());
        } else {
            log::trace!("Decoded cache MISS: {}", path.display());
        }
        result
    }

    /// Stores an image in the cache.
    pub fn put(&mut self, path: PathBuf, cached_image: CachedImage) {
        log::trace!(
            "Decoded cache PUT: {} ({}x{})",
            path.display(),
            cached_image.width,
            cached_image.height
        );
        self.cache.put(path, cached_image);
    }

    /// Returns the cached pixels, decoding the file on a miss.
    pub fn get_or_load(&mut self, path: &Path) -> CachedImage {
        if let Some(cached) = self.get(path) {
            return cached;
        }
        let (data, width, height) = image_loader::load_thumbnail_or_placeholder(path);
        let cached = CachedImage::new(data, width, height);
        self.put(path.to_path_buf(), cached.clone());
        cached
    }

    /// Drops a stale entry, e.g. after the file was rewritten.
    pub fn invalidate(&mut self, path: &Path) {
        self.cache.pop(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cache.contains(path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
