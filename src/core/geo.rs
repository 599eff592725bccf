use serde::{Deserialize, Serialize};

use crate::{Result, TileError};

/// A geographical coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Validates that the coordinates are finite and within valid ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A point on the projected map plane, or on screen when the context says so.
///
/// Map-plane points use the pyramid's own units: the world spans
/// [`WORLD_SIZE`](crate::core::constants::WORLD_SIZE) on both axes with `y`
/// growing southwards, so multiplying by `2^zoom / 256` yields tile indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns the point unchanged, or `MalformedTransform` if either axis is NaN/Inf.
    pub fn ensure_finite(self) -> Result<Self> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(TileError::MalformedTransform(format!(
                "non-finite point ({}, {})",
                self.x, self.y
            )))
        }
    }

    pub fn scale(&self, factor: f64) -> MapPoint {
        MapPoint::new(self.x * factor, self.y * factor)
    }
}

impl Default for MapPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Axis-aligned rectangle on the map plane (origin is the north-west corner)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRect {
    pub origin: MapPoint,
    pub width: f64,
    pub height: f64,
}

impl MapRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: MapPoint::new(x, y),
            width,
            height,
        }
    }

    /// Smallest rectangle containing every point; `None` for an empty input.
    pub fn bounding(points: &[MapPoint]) -> Option<MapRect> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(MapRect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.height
    }

    pub fn center(&self) -> MapPoint {
        MapPoint::new(
            self.origin.x + self.width / 2.0,
            self.origin.y + self.height / 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.origin.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Checks if the rectangles share any area
    pub fn intersects(&self, other: &MapRect) -> bool {
        !(other.max_x() <= self.origin.x
            || other.origin.x >= self.max_x()
            || other.max_y() <= self.origin.y
            || other.origin.y >= self.max_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(40.7128, -74.0060).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounding_rect() {
        let rect = MapRect::bounding(&[
            MapPoint::new(3.0, 1.0),
            MapPoint::new(-1.0, 4.0),
            MapPoint::new(2.0, 2.0),
        ])
        .unwrap();
        assert_eq!(rect, MapRect::new(-1.0, 1.0, 4.0, 3.0));
        assert!(MapRect::bounding(&[]).is_none());
    }

    #[test]
    fn test_rect_intersection() {
        let a = MapRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&MapRect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&MapRect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(!a.intersects(&MapRect::new(-6.0, -6.0, 5.0, 5.0)));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(MapPoint::new(1.0, 2.0).ensure_finite().is_ok());
        assert!(matches!(
            MapPoint::new(f64::INFINITY, 2.0).ensure_finite(),
            Err(TileError::MalformedTransform(_))
        ));
    }
}
