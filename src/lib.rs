//! # tilepyramid
//!
//! Tile-pyramid cache-and-fetch engine for scrolling raster maps.
//!
//! The crate turns a viewport into the set of imagery tiles it needs,
//! resolves them through a two-tier cache before going to the network, falls
//! back to coarser zoom levels when a tile has no data, and prunes resident
//! tiles that finer or coarser opaque coverage makes redundant. Painting is
//! left to a [`TileRenderer`] supplied by the host application.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{PyramidConfig, PyramidProfile, ServiceDescriptor},
    geo::{GeoPoint, MapPoint, MapRect},
    observer::{Subscription, TransformObservers},
    viewport::{ScreenTransform, TilePlacement, Viewport},
};

pub use layers::pyramid::{
    manager::{PyramidManager, PyramidManagerBuilder},
    types::{Effects, ResidentTile, TileState},
};

pub use tiles::{
    address::{TileAddress, TileKey},
    cache::{CacheLookup, TileCache},
    source::{TemplateSource, TileSource},
};

pub use runtime::{AsyncSpawner, BlockingSpawner};

#[cfg(feature = "tokio-runtime")]
pub use runtime::TokioSpawner;

pub use traits::TileRenderer;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, TileError>;

/// Error kinds produced by the tile engine
///
/// Only [`TileError::NoImageData`] is meant for the host application; the
/// others are reported per tile and never stop the manager.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// Non-finite projection output or a layout pass over the tile ceiling
    #[error("malformed transform: {0}")]
    MalformedTransform(String),

    #[error("fetch of {key} failed: {reason}")]
    FetchFailed { key: String, reason: String },

    /// The zoom fallback chain ran out without finding imagery
    #[error("no image data for tile {key}")]
    NoImageData { key: TileKey },

    /// Fetched bytes that are neither imagery nor a known placeholder
    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid service: {0}")]
    InvalidService(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl TileError {
    /// Whether the error belongs to one tile rather than the whole pass.
    pub fn is_tile_scoped(&self) -> bool {
        matches!(
            self,
            TileError::FetchFailed { .. } | TileError::NoImageData { .. } | TileError::Decode(_)
        )
    }
}

/// Error type alias for convenience
pub type Error = TileError;
