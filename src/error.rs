//! Unified error types for the shelf.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
///
/// None of these are fatal: the coordinator turns them into notifications or
/// placeholder thumbnails.
#[derive(Debug, Error)]
pub enum AppError {
    /// The active folder could not be listed.
    #[error("cannot read folder {path}: {source}")]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a cached thumbnail failed.
    #[error("thumbnail cache error for {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// Encoding or decoding a thumbnail image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings could not be read or written.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// The folder watcher could not be started.
    #[error("failed to watch folder: {0}")]
    Watch(String),
}

impl AppError {
    pub(crate) fn cache(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        AppError::Cache {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failures reported by a [`crate::rasterizer::Rasterizer`].
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("document not found: {0}")]
    Missing(PathBuf),

    #[error("document has no pages: {0}")]
    NoPages(PathBuf),

    #[error("cannot open document {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("cannot render first page of {path}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("rasterizer unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the key-value settings store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("settings I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings value for {key}: {source}")]
    Format {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, AppError>;
