//! Service layer for business logic.
//!
//! Keeps folder handling, persistence and batching out of the presentation
//! layer so it can be driven headlessly and tested.

pub mod auto_reload_service;
pub mod shelf_service;

pub use auto_reload_service::AutoReloadService;
pub use shelf_service::{ShelfEvent, ShelfService};
