//! Seams between the tile engine and the host application

use crate::{
    core::viewport::{TilePlacement, Viewport},
    prelude::Arc,
    tiles::address::TileKey,
};

/// Whatever paints tiles on screen.
///
/// The pyramid manager only ever tells the renderer which image belongs to
/// which slot; compositing, animation and scene-graph bookkeeping stay on the
/// renderer's side.
pub trait TileRenderer {
    /// Decoded image type handed over by the manager's decoder
    type Image;

    /// Display `image` in slot `key`. Higher `z_order` draws on top.
    fn show(&mut self, key: &TileKey, image: Arc<Self::Image>, z_order: f64);

    /// Remove whatever slot `key` is showing.
    fn hide(&mut self, key: &TileKey);

    /// The viewport the next layout pass should cover.
    fn current_viewport(&self) -> Viewport;

    /// Reposition an already shown slot after the transform changed.
    fn place(&mut self, _key: &TileKey, _placement: &TilePlacement) {}
}
