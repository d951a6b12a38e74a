//! View model: folder listing, filters, favorites and displayed thumbnails.
//!
//! Only the coordinating thread mutates this. Cards talk back through
//! [`CardActions`], which queues requests instead of mutating state.

use crate::controller::{BatchEvent, Progress};
use crate::document::{Document, Epoch};
use crate::state::favorites::FavoriteSet;
use log::debug;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

/// Displayed thumbnail of one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailState {
    Unresolved,
    Displayed { image: PathBuf, placeholder: bool },
}

/// Requests a card can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardAction {
    ToggleFavorite(PathBuf),
    Open(PathBuf),
}

/// Capability handed to every card once; cloning is cheap.
#[derive(Debug, Clone)]
pub struct CardActions {
    tx: Sender<CardAction>,
}

impl CardActions {
    pub fn toggle_favorite(&self, path: &Path) {
        let _ = self.tx.send(CardAction::ToggleFavorite(path.to_path_buf()));
    }

    pub fn open(&self, path: &Path) {
        let _ = self.tx.send(CardAction::Open(path.to_path_buf()));
    }
}

/// Everything the grid needs to draw one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub document: Document,
    pub favorite: bool,
    pub thumbnail: ThumbnailState,
}

pub struct ViewModel {
    folder: Option<PathBuf>,
    listing: Vec<Document>,
    search_text: String,
    favorites_mode: bool,
    favorites: FavoriteSet,
    requested: Vec<Document>,
    thumbnails: HashMap<PathBuf, ThumbnailState>,
    epoch: Epoch,
    progress: Progress,
    actions_tx: Sender<CardAction>,
    actions_rx: Receiver<CardAction>,
}

impl ViewModel {
    pub fn new(favorites: FavoriteSet) -> Self {
        let (actions_tx, actions_rx) = mpsc::channel();
        Self {
            folder: None,
            listing: Vec::new(),
            search_text: String::new(),
            favorites_mode: false,
            favorites,
            requested: Vec::new(),
            thumbnails: HashMap::new(),
            epoch: Epoch::default(),
            progress: Progress::default(),
            actions_tx,
            actions_rx,
        }
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn favorites_mode(&self) -> bool {
        self.favorites_mode
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    pub fn is_favorite(&self, path: &Path) -> bool {
        self.favorites.contains(path)
    }

    /// The filtered, sorted list currently shown.
    pub fn requested(&self) -> &[Document] {
        &self.requested
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn thumbnail(&self, path: &Path) -> ThumbnailState {
        self.thumbnails
            .get(path)
            .cloned()
            .unwrap_or(ThumbnailState::Unresolved)
    }

    /// Capability for cards to request favorite toggles and opens.
    pub fn actions(&self) -> CardActions {
        CardActions {
            tx: self.actions_tx.clone(),
        }
    }

    /// Card actions queued since the last call.
    pub fn take_actions(&self) -> Vec<CardAction> {
        self.actions_rx.try_iter().collect()
    }

    /// Replaces the folder and its listing.
    pub fn set_listing(&mut self, folder: PathBuf, listing: Vec<Document>) {
        self.folder = Some(folder);
        self.listing = listing;
    }

    /// Forgets the folder; the requested set becomes empty.
    pub fn clear_folder(&mut self) {
        self.folder = None;
        self.listing.clear();
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    pub fn set_favorites_mode(&mut self, enabled: bool) {
        self.favorites_mode = enabled;
    }

    /// Toggles a favorite. Returns the new membership.
    pub fn toggle_favorite(&mut self, path: &Path) -> bool {
        self.favorites.toggle(path)
    }

    /// Documents implied by the listing, search text and favorites mode.
    pub fn compute_requested(&self) -> Vec<Document> {
        let needle = self.search_text.to_lowercase();
        let mut documents: Vec<Document> = self
            .listing
            .iter()
            .filter(|doc| doc.name().to_lowercase().contains(&needle))
            .filter(|doc| !self.favorites_mode || self.favorites.contains(doc.path()))
            .cloned()
            .collect();
        documents.sort_by(compare_by_name);
        documents
    }

    /// Recomputes the requested set.
    ///
    /// Returns the new set only when its contents changed; thumbnails of
    /// documents that left the set are dropped.
    pub fn recompute(&mut self) -> Option<Vec<Document>> {
        let next = self.compute_requested();
        if next == self.requested {
            return None;
        }

        let keep: HashSet<&Path> = next.iter().map(Document::path).collect();
        let before = self.thumbnails.len();
        self.thumbnails.retain(|path, _| keep.contains(path.as_path()));
        debug!(
            "Requested set changed: {} -> {} documents, {} thumbnails dropped",
            self.requested.len(),
            next.len(),
            before - self.thumbnails.len()
        );

        self.requested = next.clone();
        Some(next)
    }

    /// Records that `epoch` now drives the displayed state.
    pub fn begin_epoch(&mut self, epoch: Epoch, total: usize) {
        self.epoch = epoch;
        self.progress = Progress {
            completed: 0,
            total,
        };
    }

    /// Applies an accepted batch event.
    pub fn apply(&mut self, event: &BatchEvent) {
        match event {
            BatchEvent::ThumbnailReady { document, image } => {
                self.set_thumbnail(document, image, false)
            }
            BatchEvent::ThumbnailFailed { document, image } => {
                self.set_thumbnail(document, image, true)
            }
            BatchEvent::Progress(progress) => self.progress = *progress,
            BatchEvent::BatchComplete { .. } => {}
        }
    }

    fn set_thumbnail(&mut self, document: &Path, image: &Path, placeholder: bool) {
        if !self.requested.iter().any(|doc| doc.path() == document) {
            return;
        }
        self.thumbnails.insert(
            document.to_path_buf(),
            ThumbnailState::Displayed {
                image: image.to_path_buf(),
                placeholder,
            },
        );
    }

    /// Cards in display order.
    pub fn cards(&self) -> Vec<CardView> {
        self.requested
            .iter()
            .map(|doc| CardView {
                document: doc.clone(),
                favorite: self.favorites.contains(doc.path()),
                thumbnail: self.thumbnail(doc.path()),
            })
            .collect()
    }
}

/// Case-insensitive name order with a total tie-break.
fn compare_by_name(a: &Document, b: &Document) -> Ordering {
    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.path().cmp(b.path()))
}
