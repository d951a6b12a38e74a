//! State owned by the coordinating thread.

pub mod favorites;
pub mod view_model;

pub use favorites::FavoriteSet;
pub use view_model::{CardAction, CardActions, CardView, ThumbnailState, ViewModel};
