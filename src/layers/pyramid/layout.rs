//! Viewport to tile-address planning.
//!
//! Pure functions: nothing here touches resident state, so a rejected plan
//! leaves the manager exactly as it was.

use crate::core::{
    config::{PyramidConfig, ServiceDescriptor},
    constants::MAX_QUADKEY_ZOOM,
    geo::MapRect,
    projection::tile_scale,
    viewport::Viewport,
};
use crate::prelude::HashSet;
use crate::tiles::address::{encode_quadkey, TileAddress};
use crate::{Result, TileError};

/// Integer zoom implied by a fractional display zoom, before clamping.
pub fn rounded_zoom(display_zoom: f64, round_up: bool) -> Result<i64> {
    if !display_zoom.is_finite() {
        return Err(TileError::MalformedTransform(format!(
            "display zoom {display_zoom}"
        )));
    }
    let zoom = if round_up {
        display_zoom.ceil()
    } else {
        display_zoom.floor()
    };
    Ok(zoom as i64)
}

/// Tile zoom for a display zoom, clamped to `[1, max_zoom]`.
pub fn tile_zoom(display_zoom: f64, round_up: bool, max_zoom: u8) -> Result<u8> {
    let zoom = rounded_zoom(display_zoom, round_up)?;
    Ok(zoom.clamp(1, i64::from(max_zoom.max(1))) as u8)
}

/// Half-open block of tile indices covering a map rectangle at one zoom.
///
/// `west..east` may extend past the world on either side; those columns
/// address wrapped copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub west: i64,
    pub north: i64,
    pub east: i64,
    pub south: i64,
}

impl TileRange {
    /// Covers `rect`, refusing blocks larger than `ceiling` tiles.
    pub fn covering(rect: &MapRect, zoom: u8, ceiling: usize) -> Result<Self> {
        if !rect.is_finite() {
            return Err(TileError::MalformedTransform(
                "viewport rectangle is not finite".into(),
            ));
        }
        let scale = tile_scale(zoom);
        let north = (rect.origin.y * scale).floor();
        let west = (rect.origin.x * scale).floor();
        let south = (rect.max_y() * scale).ceil();
        let east = (rect.max_x() * scale).ceil();

        let count = (east - west).max(0.0) * (south - north).max(0.0);
        if count > ceiling as f64 {
            log::warn!("Bad tile transform: {} tiles at zoom {}", count, zoom);
            return Err(TileError::MalformedTransform(format!(
                "{count} tiles needed at zoom {zoom}, ceiling is {ceiling}"
            )));
        }
        Ok(Self {
            zoom,
            west: west as i64,
            north: north as i64,
            east: east as i64,
            south: south as i64,
        })
    }

    pub fn count(&self) -> usize {
        ((self.east - self.west).max(0) * (self.south - self.north).max(0)) as usize
    }

    /// Every address in the block whose row exists, column by column.
    pub fn addresses(&self) -> impl Iterator<Item = TileAddress> + '_ {
        let rows = self.north.max(0)..self.south.min(TileAddress::tiles_per_side(self.zoom));
        (self.west..self.east)
            .flat_map(move |x| rows.clone().map(move |y| TileAddress::new(self.zoom, x, y)))
    }
}

/// Tiles a layout pass needs
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub zoom: u8,
    /// Coarsest zoom the fallback chain may reach
    pub min_zoom: u8,
    pub tiles: Vec<TileAddress>,
}

pub fn plan_layout(
    viewport: &Viewport,
    service: &ServiceDescriptor,
    config: &PyramidConfig,
) -> Result<LayoutPlan> {
    let zoom = tile_zoom(viewport.zoom(), service.round_zoom_up, service.max_zoom)?;
    let range = TileRange::covering(&viewport.map_rect, zoom, config.max_tiles_per_pass)?;
    Ok(LayoutPlan {
        zoom,
        min_zoom: config.min_zoom_for(zoom),
        tiles: range.addresses().collect(),
    })
}

/// Quadkeys needed to cover `viewport` from the current zoom through the bulk
/// zoom band that are not yet persisted.
///
/// Each deeper level may hold four times as many tiles as the one above it,
/// so the per-level ceiling grows accordingly.
pub fn needed_tile_keys(
    viewport: &Viewport,
    service: &ServiceDescriptor,
    config: &PyramidConfig,
    persisted: &HashSet<String>,
) -> Result<Vec<String>> {
    let min_zoom = rounded_zoom(viewport.zoom(), service.round_zoom_up)?
        .clamp(1, i64::from(MAX_QUADKEY_ZOOM)) as u8;
    let max_zoom = service
        .max_zoom
        .min(min_zoom.saturating_add(config.bulk_zoom_band))
        .min(MAX_QUADKEY_ZOOM);

    let mut needed = Vec::new();
    let mut seen = HashSet::default();
    for zoom in min_zoom..=max_zoom {
        let depth = u32::from(zoom - min_zoom) * 2;
        let ceiling = config.max_tiles_per_pass.saturating_mul(1usize << depth);
        let range = TileRange::covering(&viewport.map_rect, zoom, ceiling)?;
        for address in range.addresses() {
            let n = address.normalized();
            let key = encode_quadkey(n.zoom, n.x, n.y);
            if !persisted.contains(&key) && seen.insert(key.clone()) {
                needed.push(key);
            }
        }
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::MapPoint;
    use crate::core::viewport::ScreenTransform;

    fn viewport(scale: f64, tx: f64, ty: f64, w: f64, h: f64) -> Viewport {
        Viewport::from_transform(ScreenTransform::new(scale, 0.0, MapPoint::new(tx, ty)), w, h).unwrap()
    }

    #[test]
    fn test_tile_zoom_rounding_and_clamp() {
        assert_eq!(tile_zoom(4.3, false, 18).unwrap(), 4);
        assert_eq!(tile_zoom(4.3, true, 18).unwrap(), 5);
        assert_eq!(tile_zoom(-2.0, false, 18).unwrap(), 1);
        assert_eq!(tile_zoom(22.0, false, 18).unwrap(), 18);
        assert!(matches!(
            tile_zoom(f64::NAN, false, 18),
            Err(TileError::MalformedTransform(_))
        ));
    }

    #[test]
    fn test_single_tile_plan() {
        let service = ServiceDescriptor::new("s", "https://t/{z}/{x}/{y}", 10);
        let plan = plan_layout(&viewport(1024.0, 0.0, 0.0, 100.0, 100.0), &service, &PyramidConfig::for_testing())
            .unwrap();
        assert_eq!(plan.zoom, 10);
        assert_eq!(plan.min_zoom, 2);
        assert_eq!(plan.tiles, vec![TileAddress::new(10, 0, 0)]);
    }

    #[test]
    fn test_ceiling_rejects_runaway_pass() {
        let service = ServiceDescriptor::new("s", "https://t/{z}/{x}/{y}", 18);
        let result = plan_layout(
            &viewport(1024.0, 0.0, 0.0, 100_000.0, 100_000.0),
            &service,
            &PyramidConfig::for_testing(),
        );
        assert!(matches!(result, Err(TileError::MalformedTransform(_))));
    }

    #[test]
    fn test_rows_outside_world_skipped_columns_wrap() {
        // zoom 1, map x in [-128, 256), y in [-64, 192)
        let service = ServiceDescriptor::new("s", "https://t/{z}/{x}/{y}", 18);
        let plan = plan_layout(&viewport(2.0, 256.0, 128.0, 768.0, 512.0), &service, &PyramidConfig::for_testing())
            .unwrap();
        assert_eq!(plan.zoom, 1);
        let xs: HashSet<i64> = plan.tiles.iter().map(|a| a.x).collect();
        assert_eq!(xs, [-1, 0, 1].into_iter().collect());
        assert!(plan.tiles.iter().all(|a| (0..2).contains(&a.y)));
        assert_eq!(plan.tiles.len(), 6);
    }

    #[test]
    fn test_needed_keys_skip_persisted() {
        // zoom 1 viewport covering the whole world once
        let service = ServiceDescriptor::new("s", "https://t/{z}/{x}/{y}", 18);
        let vp = viewport(2.0, 0.0, 0.0, 512.0, 512.0);
        let persisted: HashSet<String> = ["0".to_string(), "12".to_string()].into_iter().collect();
        let keys = needed_tile_keys(&vp, &service, &PyramidConfig::for_testing(), &persisted).unwrap();

        // 4 + 16 + 64 tiles over zooms 1..=3, minus the two persisted
        assert_eq!(keys.len(), 4 + 16 + 64 - 2);
        assert!(!keys.contains(&"0".to_string()));
        assert!(keys.contains(&"1".to_string()));
        assert!(keys.iter().all(|k| (1..=3).contains(&k.len())));
    }

    #[test]
    fn test_needed_keys_respect_max_zoom() {
        let service = ServiceDescriptor::new("s", "https://t/{z}/{x}/{y}", 2);
        let vp = viewport(2.0, 0.0, 0.0, 512.0, 512.0);
        let keys = needed_tile_keys(&vp, &service, &PyramidConfig::for_testing(), &HashSet::default()).unwrap();
        assert_eq!(keys.len(), 4 + 16);
    }
}
