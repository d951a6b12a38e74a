//! Content-addressed on-disk thumbnail cache.
//!
//! Each document path maps to `<cache_dir>/<md5(path)>.png`. The key depends
//! only on the path string, so thumbnails survive restarts without looking at
//! the (read-only) source files. Entries are never evicted.
//!
//! Writes go through a temporary file in the same directory followed by a
//! rename, so readers never see a partially written PNG. Two workers writing
//! the same key produce identical bytes; the last rename wins.

use crate::config::{
    PLACEHOLDER_FILE_NAME, PLACEHOLDER_RGB, THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH,
};
use crate::error::{AppError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use log::{debug, error, warn};
use once_cell::sync::OnceCell;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Derives the cache key for a document path.
///
/// The key covers the raw path bytes, so paths that are not valid UTF-8 never
/// share a key.
pub fn cache_key(document_path: &Path) -> String {
    format!(
        "{:x}",
        md5::compute(document_path.as_os_str().as_encoded_bytes())
    )
}

/// Thumbnail store shared by all pipeline workers.
pub struct ThumbnailCache {
    dir: PathBuf,
    persistent: bool,
    /// Keeps the directory alive when the cache runs in ephemeral mode.
    _ephemeral_root: Option<TempDir>,
    /// Scratch directory for renders whose persistent write failed.
    fallback: OnceCell<TempDir>,
    placeholder: OnceCell<PathBuf>,
}

impl ThumbnailCache {
    /// Opens the cache rooted at `dir`, creating the directory if needed.
    ///
    /// If the directory cannot be created the error is logged once and the
    /// cache continues in ephemeral mode: thumbnails still render, but live
    /// in a temporary directory removed when the cache is dropped.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!("Thumbnail cache at {}", dir.display());
                Self::with_dir(dir, true, None)
            }
            Err(e) => {
                error!(
                    "Cannot create thumbnail cache {}: {}; thumbnails will not be persisted",
                    dir.display(),
                    e
                );
                Self::ephemeral().unwrap_or_else(|e| {
                    error!("No temporary directory available for thumbnails: {}", e);
                    Self::with_dir(dir, false, None)
                })
            }
        }
    }

    /// Creates a cache that lives in a fresh temporary directory.
    pub fn ephemeral() -> Result<Self> {
        let root = new_scratch_dir()?;
        let dir = root.path().to_path_buf();
        Ok(Self::with_dir(dir, false, Some(root)))
    }

    fn with_dir(dir: PathBuf, persistent: bool, root: Option<TempDir>) -> Self {
        Self {
            dir,
            persistent,
            _ephemeral_root: root,
            fallback: OnceCell::new(),
            placeholder: OnceCell::new(),
        }
    }

    /// Directory thumbnails are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// False when thumbnails will not survive this process.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Expected location of the thumbnail for `document_path`.
    pub fn resolve(&self, document_path: &Path) -> PathBuf {
        self.dir.join(format!("{}.png", cache_key(document_path)))
    }

    /// True iff the resolved file exists and is non-empty.
    pub fn has(&self, document_path: &Path) -> bool {
        fs::metadata(self.resolve(document_path))
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    /// Shrinks `bitmap` into the thumbnail box and writes it atomically to
    /// the resolved path.
    pub fn store(&self, document_path: &Path, bitmap: &RgbImage) -> Result<PathBuf> {
        let target = self.resolve(document_path);
        let png = encode_thumbnail(bitmap)?;
        write_atomic(&self.dir, &target, &png)?;
        debug!("Stored thumbnail {}", target.display());
        Ok(target)
    }

    /// Writes the thumbnail to a process-scoped scratch directory.
    ///
    /// Used when [`store`](Self::store) fails so the render can still be
    /// shown for this session.
    pub fn store_ephemeral(&self, document_path: &Path, bitmap: &RgbImage) -> Result<PathBuf> {
        let scratch = self.fallback.get_or_try_init(new_scratch_dir)?;
        let target = scratch
            .path()
            .join(format!("{}.png", cache_key(document_path)));
        let png = encode_thumbnail(bitmap)?;
        write_atomic(scratch.path(), &target, &png)?;
        Ok(target)
    }

    /// Path of the neutral placeholder image, creating it on first use.
    ///
    /// If the file cannot be written the path is still returned (and the
    /// write is retried on the next call); consumers treat an unreadable
    /// image as the placeholder colour.
    pub fn placeholder(&self) -> PathBuf {
        if let Some(path) = self.placeholder.get() {
            return path.clone();
        }

        let path = self.dir.join(PLACEHOLDER_FILE_NAME);
        let created = self.placeholder.get_or_try_init(|| {
            write_placeholder(&self.dir, &path)?;
            Ok::<_, AppError>(path.clone())
        });

        match created {
            Ok(path) => path.clone(),
            Err(e) => {
                warn!("Failed to create placeholder thumbnail: {}", e);
                path
            }
        }
    }
}

/// Placeholder bitmap at full thumbnail size.
pub fn placeholder_bitmap() -> RgbImage {
    RgbImage::from_pixel(
        THUMBNAIL_MAX_WIDTH,
        THUMBNAIL_MAX_HEIGHT,
        Rgb(PLACEHOLDER_RGB),
    )
}

fn write_placeholder(dir: &Path, path: &Path) -> Result<()> {
    let exists = fs::metadata(path)
        .map(|meta| meta.len() > 0)
        .unwrap_or(false);
    if exists {
        return Ok(());
    }

    let png = encode_png(&DynamicImage::ImageRgb8(placeholder_bitmap()))?;
    write_atomic(dir, path, &png)
}

/// Fits the bitmap into the thumbnail box (never enlarging) and encodes PNG.
fn encode_thumbnail(bitmap: &RgbImage) -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgb8(bitmap.clone());
    let fitted = if bitmap.width() > THUMBNAIL_MAX_WIDTH || bitmap.height() > THUMBNAIL_MAX_HEIGHT
    {
        image.resize(THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT, FilterType::Lanczos3)
    } else {
        image
    };
    encode_png(&fitted)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AppError::cache(target, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AppError::cache(target, e))?;
    tmp.persist(target)
        .map_err(|e| AppError::cache(target, e.error))?;
    Ok(())
}

fn new_scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("pdf-shelf-")
        .tempdir()
        .map_err(|e| AppError::cache(std::env::temp_dir(), e))
}
