//! Thumbnail grid for a folder of PDF files.
//!
//! Scans a folder, renders the first page of every document into a
//! persistent PNG cache on a bounded worker pool and keeps a filtered,
//! sorted view of the results for a grid presentation.

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod file_utils;
pub mod image_cache;
pub mod image_loader;
pub mod layout;
pub mod persistence;
pub mod pipeline;
pub mod rasterizer;
pub mod services;
pub mod state;
pub mod thumbnail_cache;

pub use config::AppConfig;
pub use document::{Document, Epoch, JobOutcome, JobResult};
pub use error::{AppError, PersistenceError, RasterError, Result};
pub use rasterizer::Rasterizer;
pub use services::{ShelfEvent, ShelfService};
