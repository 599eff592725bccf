use crate::core::viewport::TilePlacement;
use crate::prelude::Arc;
use crate::tiles::address::TileKey;
use crate::TileError;

/// Lifecycle of a resident slot
#[derive(Debug)]
pub enum TileState<I> {
    /// Waiting for a fetch to complete
    Pending,
    Loaded(Arc<I>),
    /// No image data at this zoom; requests passing through fall back further
    Hidden,
}

impl<I> Clone for TileState<I> {
    fn clone(&self) -> Self {
        match self {
            TileState::Pending => TileState::Pending,
            TileState::Loaded(image) => TileState::Loaded(Arc::clone(image)),
            TileState::Hidden => TileState::Hidden,
        }
    }
}

/// One tile slot owned by the pyramid manager.
#[derive(Debug, Clone)]
pub struct ResidentTile<I> {
    pub key: TileKey,
    pub state: TileState<I>,
    /// Bumped every time the slot is recreated; completions carrying an older
    /// generation are stale.
    pub generation: u64,
}

impl<I> ResidentTile<I> {
    pub fn new(key: TileKey, generation: u64) -> Self {
        Self {
            key,
            state: TileState::Pending,
            generation,
        }
    }

    /// Draw order: finer tiles above coarser ones, all below other map content.
    pub fn z_order(&self) -> f64 {
        z_order_for(self.key.zoom())
    }

    /// True while the slot has no pixel data to show.
    pub fn is_transparent(&self) -> bool {
        !matches!(self.state, TileState::Loaded(_))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, TileState::Loaded(_))
    }
}

pub fn z_order_for(zoom: u8) -> f64 {
    f64::from(zoom) * 0.01 - 0.25
}

/// A tile to display
#[derive(Debug)]
pub struct ShowTile<I> {
    pub key: TileKey,
    pub image: Arc<I>,
    pub z_order: f64,
}

/// Everything a layout pass wants done to the renderer.
///
/// A key never appears in both `to_show` and `to_hide`; whichever was
/// requested last wins.
#[derive(Debug)]
pub struct Effects<I> {
    /// Slots whose fetch went out during the pass
    pub to_fetch: Vec<TileKey>,
    pub to_show: Vec<ShowTile<I>>,
    pub to_hide: Vec<TileKey>,
    /// Screen placement of every slot left after pruning
    pub placements: Vec<(TileKey, TilePlacement)>,
    /// Per-tile problems, reported to the host after the renderer is updated
    pub errors: Vec<TileError>,
}

impl<I> Default for Effects<I> {
    fn default() -> Self {
        Self {
            to_fetch: Vec::new(),
            to_show: Vec::new(),
            to_hide: Vec::new(),
            placements: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<I> Effects<I> {
    pub fn show(&mut self, key: TileKey, image: Arc<I>, z_order: f64) {
        self.to_hide.retain(|k| *k != key);
        self.to_show.retain(|s| s.key != key);
        self.to_show.push(ShowTile {
            key,
            image,
            z_order,
        });
    }

    pub fn hide(&mut self, key: TileKey) {
        self.to_show.retain(|s| s.key != key);
        if !self.to_hide.contains(&key) {
            self.to_hide.push(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_fetch.is_empty()
            && self.to_show.is_empty()
            && self.to_hide.is_empty()
            && self.placements.is_empty()
            && self.errors.is_empty()
    }
}
