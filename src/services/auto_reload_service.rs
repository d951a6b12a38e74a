//! Service for handling auto-reload functionality.
//!
//! Watches the active folder and reports when PDF files appear, disappear or
//! change so the coordinator can rescan it.

use crate::error::AppError;
use crate::file_utils::{is_supported_document, PathExt};
use log::{debug, warn};
use notify::{PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config, DebounceEventResult, DebouncedEvent};
use std::path::Path;
use std::time::Duration;

/// Handle keeping a folder watch alive; dropping it stops the watch.
pub type AutoReloadDebouncer = notify_debouncer_mini::Debouncer<PollWatcher>;

/// Service for managing folder watches.
#[derive(Debug, Clone)]
pub struct AutoReloadService {
    poll_interval: Duration,
    debounce: Duration,
}

impl Default for AutoReloadService {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            debounce: Duration::from_millis(500),
        }
    }
}

/// Returns true when at least one event concerns a document.
fn touches_documents(events: &[DebouncedEvent]) -> bool {
    let relevant: Vec<_> = events
        .iter()
        .filter(|event| is_supported_document(&event.path))
        .collect();

    for event in &relevant {
        debug!("  - {:?} for {}", event.kind, event.path.format_for_log());
    }
    !relevant.is_empty()
}

impl AutoReloadService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intervals(poll_interval: Duration, debounce: Duration) -> Self {
        Self {
            poll_interval,
            debounce,
        }
    }

    /// Starts watching `folder` (non-recursively) with debouncing.
    ///
    /// `on_change` runs on the watcher thread whenever a debounced batch of
    /// events touches a PDF file. A folder that does not exist is rejected up
    /// front, since the poll watcher would otherwise wait for it silently.
    pub fn start_watching<F>(
        &self,
        folder: &Path,
        on_change: F,
    ) -> Result<AutoReloadDebouncer, AppError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !folder.is_dir() {
            return Err(AppError::Watch(format!(
                "{}: not a directory",
                folder.display()
            )));
        }

        let notify_config = notify::Config::default().with_poll_interval(self.poll_interval);
        let debouncer_config = Config::default()
            .with_timeout(self.debounce)
            .with_notify_config(notify_config);

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(
            debouncer_config,
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    if touches_documents(&events) {
                        debug!("Folder changed: {} document events", events.len());
                        on_change();
                    }
                }
                Err(error) => warn!("File watcher error: {}", error),
            },
        )
        .map_err(|e| AppError::Watch(format!("failed to create debouncer: {}", e)))?;

        debouncer
            .watcher()
            .watch(folder, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Watch(format!("{}: {}", folder.display(), e)))?;

        debug!("Watching {}", folder.format_for_log());
        Ok(debouncer)
    }
}
