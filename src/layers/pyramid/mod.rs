//! Tile pyramid: layout, fallback and pruning of the resident tile set.

pub mod layout;
pub mod manager;
pub mod prune;
pub mod types;

pub use manager::{PyramidManager, PyramidManagerBuilder};
pub use types::{Effects, ResidentTile, ShowTile, TileState};
