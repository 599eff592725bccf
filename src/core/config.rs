//! Configuration for tile services and the pyramid engine
//!
//! A [`ServiceDescriptor`] describes one remote imagery service and is usually
//! read from JSON. [`PyramidConfig`] tunes the engine itself and comes in a few
//! presets, in the same way as the rest of the crate's profiles.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    BULK_ZOOM_BAND, DEFAULT_MEMORY_BUDGET, DEFAULT_PURGE_AGE, FALLBACK_DEPTH, MAX_QUADKEY_ZOOM,
    MAX_TILES_PER_PASS,
};
use crate::{Result, TileError};

/// A remote imagery service.
///
/// Immutable once attached to a pyramid manager; swapping it resets the
/// manager's cache and resident tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Names the persistent cache of this service
    pub identifier: String,
    /// Fetch URL with `{x}`/`{y}`/`{z}`/`{u}`/`{bbox}`-style placeholders
    pub url_template: String,
    pub max_zoom: u8,
    /// Round the display zoom up instead of down when picking a tile zoom
    #[serde(default)]
    pub round_zoom_up: bool,
    /// WMS projection identifier; absent or empty means a tiled service
    #[serde(default)]
    pub wms_projection: Option<String>,
    /// Attribution/metadata URL with `{lat}`, `{lon}` and `{zoom}` placeholders
    #[serde(default)]
    pub metadata_url_template: Option<String>,
    /// Exact bytes of the image the service returns instead of an error
    #[serde(default)]
    pub placeholder_image: Option<Vec<u8>>,
}

impl ServiceDescriptor {
    pub fn new(identifier: impl Into<String>, url_template: impl Into<String>, max_zoom: u8) -> Self {
        Self {
            identifier: identifier.into(),
            url_template: url_template.into(),
            max_zoom,
            round_zoom_up: false,
            wms_projection: None,
            metadata_url_template: None,
            placeholder_image: None,
        }
    }

    pub fn with_round_zoom_up(mut self, round_zoom_up: bool) -> Self {
        self.round_zoom_up = round_zoom_up;
        self
    }

    pub fn with_wms_projection(mut self, projection: impl Into<String>) -> Self {
        self.wms_projection = Some(projection.into());
        self
    }

    pub fn with_metadata_url(mut self, template: impl Into<String>) -> Self {
        self.metadata_url_template = Some(template.into());
        self
    }

    pub fn with_placeholder_image(mut self, bytes: Vec<u8>) -> Self {
        self.placeholder_image = Some(bytes);
        self
    }

    /// Parses and validates a descriptor from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let service: ServiceDescriptor = serde_json::from_str(json)?;
        service.validate()?;
        Ok(service)
    }

    pub fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(TileError::InvalidService("empty identifier".into()));
        }
        if self.url_template.is_empty() {
            return Err(TileError::InvalidService(format!(
                "service '{}' has no URL template",
                self.identifier
            )));
        }
        if self.max_zoom == 0 || self.max_zoom > MAX_QUADKEY_ZOOM {
            return Err(TileError::InvalidService(format!(
                "service '{}' max zoom {} outside 1..={}",
                self.identifier, self.max_zoom, MAX_QUADKEY_ZOOM
            )));
        }
        Ok(())
    }

    /// The WMS projection, or `None` for a tiled service.
    pub fn wms_projection(&self) -> Option<&str> {
        self.wms_projection.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PyramidProfile {
    #[default]
    Balanced,
    LowResource,
    HighDetail,
    Custom(PyramidConfig),
}

impl PyramidProfile {
    pub fn resolve(&self) -> PyramidConfig {
        match self {
            Self::Balanced => PyramidConfig::balanced(),
            Self::LowResource => PyramidConfig::low_resource(),
            Self::HighDetail => PyramidConfig::high_detail(),
            Self::Custom(config) => config.clone(),
        }
    }
}

/// Tuning knobs of the pyramid engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidConfig {
    /// Approximate byte budget of decoded tiles kept in memory
    pub memory_budget: usize,
    /// Layout passes needing more tiles than this are rejected
    pub max_tiles_per_pass: usize,
    /// A failed tile falls back at most this many zoom levels (never below 1)
    pub fallback_depth: u8,
    /// Persisted tiles older than this are purged when a service is attached
    pub purge_age: Duration,
    /// Extra zoom levels covered by bulk download planning
    pub bulk_zoom_band: u8,
    /// Display density; above 1.0 the `{@2x}` placeholder expands
    pub display_scale: f64,
    /// Root of the on-disk cache; `None` keeps the persistent tier in memory
    pub cache_dir: Option<PathBuf>,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl PyramidConfig {
    pub fn balanced() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            max_tiles_per_pass: MAX_TILES_PER_PASS,
            fallback_depth: FALLBACK_DEPTH,
            purge_age: DEFAULT_PURGE_AGE,
            bulk_zoom_band: BULK_ZOOM_BAND,
            display_scale: 1.0,
            cache_dir: default_cache_dir(),
        }
    }

    pub fn low_resource() -> Self {
        Self {
            memory_budget: 8 * 1000 * 1000,
            fallback_depth: 4,
            purge_age: Duration::from_secs(3 * 24 * 60 * 60),
            ..Self::balanced()
        }
    }

    pub fn high_detail() -> Self {
        Self {
            memory_budget: 64 * 1000 * 1000,
            purge_age: Duration::from_secs(30 * 24 * 60 * 60),
            display_scale: 2.0,
            ..Self::balanced()
        }
    }

    /// Small memory tier and no disk access.
    pub fn for_testing() -> Self {
        Self {
            memory_budget: 1000 * 1000,
            cache_dir: None,
            ..Self::balanced()
        }
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn with_display_scale(mut self, scale: f64) -> Self {
        self.display_scale = scale;
        self
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Coarsest zoom a request at `zoom` may fall back to.
    pub fn min_zoom_for(&self, zoom: u8) -> u8 {
        zoom.saturating_sub(self.fallback_depth).max(1)
    }
}

/// Platform cache directory for persisted tiles, if the platform has one.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("tilepyramid"))
}
