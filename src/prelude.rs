//! Prelude module for common tilepyramid types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilepyramid::prelude::*;`

pub use crate::core::{
    config::{PyramidConfig, PyramidProfile, ServiceDescriptor},
    geo::{GeoPoint, MapPoint, MapRect},
    observer::{Subscription, TransformObservers},
    projection::{forward_mercator, inverse_mercator, tile_to_wms_coords},
    viewport::{BirdsEye, ScreenTransform, TilePlacement, Viewport},
};

pub use crate::layers::pyramid::{
    manager::{PyramidManager, PyramidManagerBuilder},
    types::{Effects, ResidentTile, ShowTile, TileState},
};

pub use crate::tiles::{
    address::{decode_quadkey, encode_quadkey, normalize, TileAddress, TileKey},
    cache::{CacheLookup, FetchOutcome, TileCache},
    decode::{BytesDecoder, PlaceholderFilter, TileDecoder},
    loader::{FetcherConfig, HttpFetcher, TileFetcher},
    source::{TemplateSource, TileSource},
    store::{DiskStore, DiskUsage, MemoryStore, PersistentStore},
};

pub use crate::runtime::{AsyncHandle, AsyncSpawner, BlockingSpawner, BoxFuture};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::TokioSpawner;

#[cfg(feature = "render")]
pub use crate::tiles::decode::RasterDecoder;

pub use crate::traits::TileRenderer;

pub use crate::{Error as TileError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
