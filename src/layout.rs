//! Adaptive grid placement for document cards.
//!
//! Stateless: the whole layout is recomputed on every resize or list change.

use crate::config::{CARD_HEIGHT, CARD_WIDTH, GRID_SPACING};

/// Card size and gap, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMetrics {
    pub card_width: u32,
    pub card_height: u32,
    pub spacing: u32,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            card_width: CARD_WIDTH,
            card_height: CARD_HEIGHT,
            spacing: GRID_SPACING,
        }
    }
}

impl GridMetrics {
    /// `max(1, floor(width / (card_width + spacing)))`.
    pub fn columns(&self, viewport_width: u32) -> usize {
        let pitch = self.card_width + self.spacing;
        if pitch == 0 {
            return 1;
        }
        ((viewport_width / pitch) as usize).max(1)
    }
}

/// Position of one item in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPlacement {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub x: u32,
    pub y: u32,
}

/// Placement of every item for one viewport width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
    pub placements: Vec<GridPlacement>,
}

impl GridLayout {
    /// Total content height, including the spacing between rows.
    pub fn content_height(&self, metrics: &GridMetrics) -> u32 {
        if self.rows == 0 {
            return 0;
        }
        let rows = self.rows as u32;
        rows * metrics.card_height + (rows - 1) * metrics.spacing
    }
}

/// Places `item_count` items row-major into as many columns as fit.
pub fn layout(viewport_width: u32, metrics: &GridMetrics, item_count: usize) -> GridLayout {
    let columns = metrics.columns(viewport_width);
    let rows = item_count.div_ceil(columns);

    let placements = (0..item_count)
        .map(|index| {
            let row = index / columns;
            let col = index % columns;
            GridPlacement {
                index,
                row,
                col,
                x: col as u32 * (metrics.card_width + metrics.spacing),
                y: row as u32 * (metrics.card_height + metrics.spacing),
            }
        })
        .collect();

    GridLayout {
        columns,
        rows,
        placements,
    }
}
