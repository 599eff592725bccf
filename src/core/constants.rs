//! Engine-wide constants for the tile pyramid.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

use std::time::Duration;

/// Square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Width of the whole map plane in map units; one zoom-0 tile spans it.
pub const WORLD_SIZE: f64 = 256.0;

/// Half the circumference of the EPSG:3857 sphere, in meters.
pub const MERCATOR_HALF_EXTENT: f64 = 20_037_508.34;

/// A layout pass asking for more tiles than this is treated as a broken transform.
pub const MAX_TILES_PER_PASS: usize = 4000;

/// How many zoom levels a failed tile may fall back before giving up.
pub const FALLBACK_DEPTH: u8 = 8;

/// Zoom levels at or above this are never bucketed by the pruning sweep.
pub const MAX_TRACKED_ZOOM: u8 = 30;

/// Deepest zoom a quadkey (and the bulk download planner) will address.
pub const MAX_QUADKEY_ZOOM: u8 = 31;

/// Metadata services are never asked about zooms deeper than this.
pub const MAX_METADATA_ZOOM: u8 = 21;

/// Bulk downloads cover the current zoom plus this many finer levels.
pub const BULK_ZOOM_BAND: u8 = 2;

/// Approximate byte budget of the decoded in-memory tier.
pub const DEFAULT_MEMORY_BUDGET: usize = 20 * 1000 * 1000;

/// Persisted tiles untouched for longer than this are purged on service attach.
pub const DEFAULT_PURGE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Extension appended to the quadkey of every persisted tile.
pub const CACHE_FILE_SUFFIX: &str = ".jpg";

/// Substituted for `{@2x}` on high density displays.
pub const RETINA_SUFFIX: &str = "@2x";

/// Projection identifier whose WMS 1.3 bounding boxes list latitude first.
pub const EPSG_4326: &str = "EPSG:4326";
