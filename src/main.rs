mod startup;

use clap::{CommandFactory, Parser};
use log::{info, warn};
use pdf_shelf::file_utils::PathExt;
use pdf_shelf::persistence::{JsonFileStore, Settings};
use pdf_shelf::rasterizer::{Rasterizer, UnavailableRasterizer};
use pdf_shelf::state::ThumbnailState;
use pdf_shelf::{AppConfig, ShelfEvent, ShelfService};
use startup::StartupOptions;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[cfg(feature = "pdfium")]
fn create_rasterizer() -> Arc<dyn Rasterizer> {
    match pdf_shelf::rasterizer::PdfiumRasterizer::new() {
        Ok(rasterizer) => Arc::new(rasterizer),
        Err(e) => {
            warn!("{}; thumbnails will use the placeholder", e);
            Arc::new(UnavailableRasterizer)
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn create_rasterizer() -> Arc<dyn Rasterizer> {
    warn!("Built without the `pdfium` feature; thumbnails will use the placeholder");
    Arc::new(UnavailableRasterizer)
}

/// Logs one event. Returns true once the current batch has settled.
fn report(shelf: &ShelfService, event: &ShelfEvent) -> bool {
    match event {
        ShelfEvent::Progress(progress) => {
            info!("Generating thumbnails... {}/{}", progress.completed, progress.total);
            false
        }
        ShelfEvent::ThumbnailFailed { document, .. } => {
            warn!("No preview for {}", document.format_for_log());
            false
        }
        ShelfEvent::BatchComplete { epoch } => *epoch == shelf.view().epoch(),
        ShelfEvent::NoDocuments => {
            info!("No PDF files to show");
            true
        }
        ShelfEvent::Notification(message) => {
            warn!("{}", message);
            false
        }
        _ => false,
    }
}

fn print_grid(shelf: &ShelfService) {
    let grid = shelf.layout();
    println!(
        "{} documents in {} columns x {} rows ({} px high)",
        grid.placements.len(),
        grid.columns,
        grid.rows,
        grid.content_height(shelf.metrics())
    );
    for (card, place) in shelf.cards().iter().zip(&grid.placements) {
        let thumbnail = match &card.thumbnail {
            ThumbnailState::Displayed { image, placeholder: false } => image.display().to_string(),
            ThumbnailState::Displayed { placeholder: true, .. } => "(placeholder)".to_string(),
            ThumbnailState::Unresolved => "(pending)".to_string(),
        };
        println!(
            "[{},{}] {}{}  {}",
            place.row,
            place.col,
            if card.favorite { "* " } else { "" },
            card.document.name(),
            thumbnail
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let options = StartupOptions::parse();

    let config = AppConfig::from_user_dirs().with_auto_reload(options.watch);
    let settings = Settings::new(JsonFileStore::open(&config.settings_path));
    let mut shelf = ShelfService::new(&config, create_rasterizer(), settings)?;

    // Filters first, so opening the folder starts exactly one batch.
    shelf.resize(options.width);
    if let Some(search) = &options.search {
        shelf.set_search_text(search);
    }
    shelf.set_favorites_mode(options.favorites);

    let mut events = match &options.folder {
        Some(folder) => shelf.open_folder(folder),
        None => shelf.restore_last_folder(),
    };
    if shelf.view().folder().is_none() {
        for event in &events {
            report(&shelf, event);
        }
        info!("No folder to show");
        eprintln!("{}", StartupOptions::command().render_usage());
        return Ok(());
    }

    loop {
        let mut settled = false;
        for event in &events {
            settled |= report(&shelf, event);
        }
        if settled {
            print_grid(&shelf);
            if !shelf.is_watching() {
                break;
            }
        }
        events = shelf.wait(POLL_INTERVAL);
    }

    Ok(())
}
