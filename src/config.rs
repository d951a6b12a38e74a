//! Application configuration.
//!
//! Fixed constants live at the top; everything that touches the filesystem
//! is carried by [`AppConfig`] so tests can point it at a temporary directory.

use std::path::PathBuf;

/// Supported document file extensions for scanning directories.
pub const SUPPORTED_DOCUMENT_EXTENSIONS: [&str; 1] = ["pdf"];

/// Thumbnails are fitted inside this box, preserving aspect ratio.
pub const THUMBNAIL_MAX_WIDTH: u32 = 150;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 200;

/// Zoom applied to the first page before it is shrunk into the thumbnail box.
pub const RASTER_ZOOM_FACTOR: f32 = 2.0;

/// Fill colour of the placeholder thumbnail (#2d2d2d).
pub const PLACEHOLDER_RGB: [u8; 3] = [0x2d, 0x2d, 0x2d];

/// File name of the placeholder inside the cache directory.
pub const PLACEHOLDER_FILE_NAME: &str = "default.png";

/// Grid card metrics in logical pixels.
pub const CARD_WIDTH: u32 = 170;
pub const CARD_HEIGHT: u32 = 230;
pub const GRID_SPACING: u32 = 16;

/// Number of decoded thumbnails kept in memory.
pub const DECODED_THUMBNAIL_CAPACITY: usize = 256;

/// Environment variable overriding the worker count.
pub const WORKERS_ENV_VAR: &str = "PDF_SHELF_WORKERS";

const APP_DIR_NAME: &str = "pdf-shelf";

/// Runtime configuration passed to the cache, pipeline and settings store.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `<md5>.png` thumbnails and the placeholder.
    pub cache_dir: PathBuf,
    /// JSON file holding the last folder and favorites.
    pub settings_path: PathBuf,
    /// Upper bound on concurrently running rasterization jobs.
    pub max_workers: usize,
    /// Capacity of the in-memory decoded thumbnail LRU.
    pub decoded_capacity: usize,
    /// Watch the active folder and reload on changes.
    pub auto_reload: bool,
}

impl AppConfig {
    /// Creates a configuration rooted at explicit directories.
    pub fn new(cache_dir: impl Into<PathBuf>, settings_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            settings_path: settings_path.into(),
            max_workers: default_worker_count(),
            decoded_capacity: DECODED_THUMBNAIL_CAPACITY,
            auto_reload: false,
        }
    }

    /// Builds the configuration from the user's cache and config directories.
    ///
    /// Falls back to dot-directories in the home directory, then to the
    /// current directory when no home can be determined.
    pub fn from_user_dirs() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        let cache_dir = dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join("thumbnails"))
            .unwrap_or_else(|| home.join(".pdf_viewer_cache"));

        let settings_path = dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join("settings.json"))
            .unwrap_or_else(|| home.join(".pdf_viewer_config"));

        let mut config = Self::new(cache_dir, settings_path);
        if let Some(workers) = workers_from_env() {
            config.max_workers = workers;
        }
        config
    }

    /// Sets the worker ceiling. Zero is clamped to one.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Sets the decoded thumbnail LRU capacity. Zero is clamped to one.
    pub fn with_decoded_capacity(mut self, capacity: usize) -> Self {
        self.decoded_capacity = capacity.max(1);
        self
    }

    /// Enables or disables folder watching.
    pub fn with_auto_reload(mut self, enabled: bool) -> Self {
        self.auto_reload = enabled;
        self
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn workers_from_env() -> Option<usize> {
    let raw = std::env::var(WORKERS_ENV_VAR).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => {
            log::warn!("Ignoring invalid {}={:?}", WORKERS_ENV_VAR, raw);
            None
        }
        Ok(n) => Some(n),
    }
}
