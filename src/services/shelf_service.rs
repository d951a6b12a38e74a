//! Coordinator for the thumbnail shelf.
//!
//! Owns the view model and the batch controller and is driven from a single
//! thread: UI input goes in through the `set_*`/`open_*` methods, worker
//! results come out of [`ShelfService::pump`] and [`ShelfService::wait`] as
//! [`ShelfEvent`]s.

use crate::config::AppConfig;
use crate::controller::{BatchController, BatchEvent, Progress, RequestOutcome};
use crate::document::Epoch;
use crate::error::Result;
use crate::file_utils::{scan_pdf_directory, PathExt};
use crate::image_cache::{CachedImage, ImageCache};
use crate::layout::{self, GridLayout, GridMetrics};
use crate::persistence::Settings;
use crate::pipeline::{EpochGate, GenerationPipeline};
use crate::rasterizer::Rasterizer;
use crate::services::auto_reload_service::{AutoReloadDebouncer, AutoReloadService};
use crate::state::{CardAction, CardActions, CardView, ThumbnailState, ViewModel};
use crate::thumbnail_cache::ThumbnailCache;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Viewport width used until the first resize.
const INITIAL_VIEWPORT_WIDTH: u32 = 800;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShelfEvent {
    Progress(Progress),
    ThumbnailReady { document: PathBuf, image: PathBuf },
    ThumbnailFailed { document: PathBuf, image: PathBuf },
    BatchComplete { epoch: Epoch },
    /// The requested set is empty.
    NoDocuments,
    FavoriteChanged { document: PathBuf, favorite: bool },
    /// A card asked for its document to be opened externally.
    OpenDocument(PathBuf),
    /// Non-fatal problem worth showing to the user.
    Notification(String),
    LayoutChanged(GridLayout),
}

pub struct ShelfService {
    view: ViewModel,
    controller: BatchController,
    settings: Settings,
    decoded: ImageCache,
    metrics: GridMetrics,
    viewport_width: u32,
    auto_reload: Option<AutoReloadService>,
    watch: Option<AutoReloadDebouncer>,
    reload_tx: Sender<()>,
    reload_rx: Receiver<()>,
}

impl ShelfService {
    /// Opens the thumbnail cache and starts the worker pool.
    pub fn new(
        config: &AppConfig,
        rasterizer: Arc<dyn Rasterizer>,
        settings: Settings,
    ) -> Result<Self> {
        let cache = Arc::new(ThumbnailCache::open(&config.cache_dir));
        Self::with_cache(config, cache, rasterizer, settings)
    }

    /// Like [`ShelfService::new`] with an already opened cache.
    pub fn with_cache(
        config: &AppConfig,
        cache: Arc<ThumbnailCache>,
        rasterizer: Arc<dyn Rasterizer>,
        settings: Settings,
    ) -> Result<Self> {
        let pipeline =
            GenerationPipeline::new(cache, rasterizer, config.max_workers, EpochGate::new())?;
        info!(
            "Thumbnail pipeline ready: {} workers, cache {}{}",
            pipeline.worker_count(),
            pipeline.cache().dir().format_for_log(),
            if pipeline.cache().is_persistent() { "" } else { " (temporary)" }
        );

        let (reload_tx, reload_rx) = mpsc::channel();
        Ok(Self {
            view: ViewModel::new(settings.favorites()),
            controller: BatchController::new(pipeline),
            settings,
            decoded: ImageCache::new(config.decoded_capacity),
            metrics: GridMetrics::default(),
            viewport_width: INITIAL_VIEWPORT_WIDTH,
            auto_reload: config.auto_reload.then(AutoReloadService::new),
            watch: None,
            reload_tx,
            reload_rx,
        })
    }

    pub fn with_metrics(mut self, metrics: GridMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn cards(&self) -> Vec<CardView> {
        self.view.cards()
    }

    pub fn actions(&self) -> CardActions {
        self.view.actions()
    }

    pub fn progress(&self) -> Progress {
        self.view.progress()
    }

    pub fn metrics(&self) -> &GridMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        self.controller.pipeline().cache()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Reopens the persisted folder, if it still exists.
    pub fn restore_last_folder(&mut self) -> Vec<ShelfEvent> {
        match self.settings.last_folder() {
            Some(folder) if folder.is_dir() => self.open_folder(&folder),
            Some(folder) => {
                info!("Last folder {} no longer exists", folder.format_for_log());
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Makes `folder` the active folder and regenerates its thumbnails.
    ///
    /// On a scan error the previous folder stays active.
    pub fn open_folder(&mut self, folder: &Path) -> Vec<ShelfEvent> {
        let folder = std::path::absolute(folder).unwrap_or_else(|_| folder.to_path_buf());
        let listing = match scan_pdf_directory(&folder) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("{}", e);
                return vec![ShelfEvent::Notification(format!("Could not open folder: {}", e))];
            }
        };
        info!("Opened {} ({} PDF files)", folder.format_for_log(), listing.len());

        let mut events = Vec::new();
        if let Err(e) = self.settings.set_last_folder(&folder) {
            warn!("Failed to remember last folder: {}", e);
            events.push(ShelfEvent::Notification(format!("Could not save settings: {}", e)));
        }

        self.view.set_listing(folder.clone(), listing);
        self.watch_folder(&folder);
        events.extend(self.refresh(true));
        events
    }

    /// Rescans the active folder.
    pub fn reload(&mut self) -> Vec<ShelfEvent> {
        let Some(folder) = self.view.folder().map(Path::to_path_buf) else {
            return Vec::new();
        };
        match scan_pdf_directory(&folder) {
            Ok(listing) => {
                debug!("Reloaded {} ({} PDF files)", folder.format_for_log(), listing.len());
                self.view.set_listing(folder, listing);
                self.refresh(true)
            }
            Err(e) => {
                warn!("{}", e);
                vec![ShelfEvent::Notification(format!("Could not reload folder: {}", e))]
            }
        }
    }

    /// Leaves the active folder; the grid becomes empty.
    pub fn close_folder(&mut self) -> Vec<ShelfEvent> {
        self.watch = None;
        self.view.clear_folder();
        self.refresh(true)
    }

    pub fn set_search_text(&mut self, text: &str) -> Vec<ShelfEvent> {
        if self.view.search_text() == text {
            return Vec::new();
        }
        self.view.set_search_text(text);
        self.refresh(false)
    }

    pub fn set_favorites_mode(&mut self, enabled: bool) -> Vec<ShelfEvent> {
        if self.view.favorites_mode() == enabled {
            return Vec::new();
        }
        self.view.set_favorites_mode(enabled);
        self.refresh(false)
    }

    /// Flips favorite membership and persists the whole set.
    pub fn toggle_favorite(&mut self, document: &Path) -> Vec<ShelfEvent> {
        let favorite = self.view.toggle_favorite(document);
        debug!(
            "{} {} favorites",
            document.format_for_log(),
            if favorite { "added to" } else { "removed from" }
        );

        let mut events = vec![ShelfEvent::FavoriteChanged {
            document: document.to_path_buf(),
            favorite,
        }];
        if let Err(e) = self.settings.set_favorites(self.view.favorites()) {
            warn!("Failed to save favorites: {}", e);
            events.push(ShelfEvent::Notification(format!("Could not save favorites: {}", e)));
        }
        if self.view.favorites_mode() {
            events.extend(self.refresh(false));
        }
        events
    }

    /// Stores the new viewport width and re-lays out the grid.
    pub fn resize(&mut self, viewport_width: u32) -> Vec<ShelfEvent> {
        self.viewport_width = viewport_width;
        vec![ShelfEvent::LayoutChanged(self.layout())]
    }

    pub fn layout(&self) -> GridLayout {
        layout::layout(self.viewport_width, &self.metrics, self.view.requested().len())
    }

    /// Decoded pixels of a card's displayed thumbnail.
    pub fn card_image(&mut self, document: &Path) -> Option<CachedImage> {
        match self.view.thumbnail(document) {
            ThumbnailState::Displayed { image, .. } => Some(self.decoded.get_or_load(&image)),
            ThumbnailState::Unresolved => None,
        }
    }

    /// Handles queued card actions, folder changes and arrived results
    /// without blocking.
    pub fn pump(&mut self) -> Vec<ShelfEvent> {
        let mut events = self.drain_inputs();
        let batch = self.controller.poll();
        events.extend(self.apply_batch(batch));
        events
    }

    /// Like [`ShelfService::pump`], but blocks up to `timeout` for a worker
    /// result when nothing else is pending.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ShelfEvent> {
        let mut events = self.pump();
        if events.is_empty() {
            let batch = self.controller.wait(timeout);
            events.extend(self.apply_batch(batch));
        }
        events
    }

    fn drain_inputs(&mut self) -> Vec<ShelfEvent> {
        let mut events = Vec::new();
        for action in self.view.take_actions() {
            match action {
                CardAction::ToggleFavorite(path) => events.extend(self.toggle_favorite(&path)),
                CardAction::Open(path) => events.push(ShelfEvent::OpenDocument(path)),
            }
        }
        if self.reload_rx.try_iter().count() > 0 {
            events.extend(self.reload());
        }
        events
    }

    /// Pushes the requested set to the controller when it changed, or
    /// always when `force` is set.
    fn refresh(&mut self, force: bool) -> Vec<ShelfEvent> {
        let documents = match self.view.recompute() {
            Some(documents) => documents,
            None if force => self.view.requested().to_vec(),
            None => return Vec::new(),
        };

        let mut events = Vec::new();
        match self.controller.request(&documents) {
            RequestOutcome::Started { epoch, total } => {
                self.view.begin_epoch(epoch, total);
                events.push(ShelfEvent::Progress(self.view.progress()));
            }
            RequestOutcome::Empty { epoch } => {
                self.view.begin_epoch(epoch, 0);
                events.push(ShelfEvent::NoDocuments);
            }
        }
        events.push(ShelfEvent::LayoutChanged(self.layout()));
        events
    }

    fn apply_batch(&mut self, batch: Vec<BatchEvent>) -> Vec<ShelfEvent> {
        let mut events = Vec::with_capacity(batch.len());
        for event in batch {
            self.view.apply(&event);
            match event {
                BatchEvent::ThumbnailReady { document, image } => {
                    // The PNG may have been rewritten since it was last decoded.
                    self.decoded.invalidate(&image);
                    events.push(ShelfEvent::ThumbnailReady { document, image });
                }
                BatchEvent::ThumbnailFailed { document, image } => {
                    events.push(ShelfEvent::ThumbnailFailed { document, image });
                }
                BatchEvent::Progress(progress) => events.push(ShelfEvent::Progress(progress)),
                BatchEvent::BatchComplete { epoch } => {
                    events.push(ShelfEvent::BatchComplete { epoch });
                    events.push(ShelfEvent::LayoutChanged(self.layout()));
                }
            }
        }
        events
    }

    fn watch_folder(&mut self, folder: &Path) {
        let Some(service) = &self.auto_reload else {
            return;
        };
        self.watch = None;

        let tx = self.reload_tx.clone();
        match service.start_watching(folder, move || {
            let _ = tx.send(());
        }) {
            Ok(debouncer) => self.watch = Some(debouncer),
            Err(e) => warn!("Auto-reload disabled: {}", e),
        }
    }
}
