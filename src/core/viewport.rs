//! Screen transform and viewport state consumed by the pyramid manager.
//!
//! The renderer owns the real map transform; the pyramid only ever sees a
//! snapshot of it in the form of a [`Viewport`].

use serde::{Deserialize, Serialize};

use crate::{
    core::geo::{MapPoint, MapRect},
    tiles::address::TileAddress,
    Result, TileError,
};

/// Perspective tilt applied on top of the flat screen transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirdsEye {
    /// Distance from the eye to the screen plane, in screen pixels
    pub distance: f64,
    /// Tilt around the horizontal screen axis, in radians
    pub rotation: f64,
}

impl BirdsEye {
    /// Projects a flat screen point into the tilted view around `center`.
    ///
    /// Returns `None` when the point ends up behind the eye.
    pub fn project(&self, point: MapPoint, center: MapPoint) -> Option<MapPoint> {
        let dx = point.x - center.x;
        let dy = point.y - center.y;
        let y = dy * self.rotation.cos();
        let z = dy * self.rotation.sin();
        let depth = self.distance + z;
        if depth <= 0.0 {
            return None;
        }
        let scale = self.distance / depth;
        Some(MapPoint::new(center.x + dx * scale, center.y + y * scale))
    }
}

/// Affine map-to-screen transform.
///
/// Stored as `[a, b, c, d, tx, ty]` where
/// `screen = (a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenTransform {
    pub matrix: [f64; 6],
    pub birds_eye: Option<BirdsEye>,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ScreenTransform {
    pub fn identity() -> Self {
        Self {
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            birds_eye: None,
        }
    }

    /// Uniform scale, then rotation, then a screen-space translation.
    pub fn new(scale: f64, rotation: f64, translation: MapPoint) -> Self {
        let (sin, cos) = rotation.sin_cos();
        Self {
            matrix: [
                scale * cos,
                scale * sin,
                -scale * sin,
                scale * cos,
                translation.x,
                translation.y,
            ],
            birds_eye: None,
        }
    }

    pub fn with_birds_eye(mut self, birds_eye: BirdsEye) -> Self {
        self.birds_eye = Some(birds_eye);
        self
    }

    /// Screen pixels per map unit.
    pub fn scale(&self) -> f64 {
        let [a, b, ..] = self.matrix;
        (a * a + b * b).sqrt()
    }

    pub fn rotation(&self) -> f64 {
        let [a, b, ..] = self.matrix;
        b.atan2(a)
    }

    /// Fractional display zoom implied by the transform.
    pub fn zoom(&self) -> f64 {
        self.scale().log2()
    }

    pub fn apply(&self, point: MapPoint) -> MapPoint {
        let [a, b, c, d, tx, ty] = self.matrix;
        MapPoint::new(a * point.x + c * point.y + tx, b * point.x + d * point.y + ty)
    }

    pub fn invert(&self) -> Result<ScreenTransform> {
        let [a, b, c, d, tx, ty] = self.matrix;
        let det = a * d - b * c;
        if det == 0.0 || !det.is_finite() {
            return Err(TileError::MalformedTransform(format!(
                "singular screen transform (determinant {det})"
            )));
        }
        let ia = d / det;
        let ib = -b / det;
        let ic = -c / det;
        let id = a / det;
        Ok(ScreenTransform {
            matrix: [ia, ib, ic, id, -(ia * tx + ic * ty), -(ib * tx + id * ty)],
            birds_eye: None,
        })
    }
}

/// Where and how large a tile image should be drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlacement {
    /// Screen position of the tile's north-west corner
    pub origin: MapPoint,
    /// Factor applied to the 256 px image
    pub scale: f64,
    /// Rotation of the image around `origin`, in radians
    pub rotation: f64,
}

/// Snapshot of what the screen currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Bounding map rectangle of the screen
    pub map_rect: MapRect,
    /// Map-to-screen transform
    pub transform: ScreenTransform,
    /// Screen size in pixels
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(map_rect: MapRect, transform: ScreenTransform, width: f64, height: f64) -> Self {
        Self {
            map_rect,
            transform,
            width,
            height,
        }
    }

    /// Builds a viewport whose map rectangle bounds the whole screen under `transform`.
    pub fn from_transform(transform: ScreenTransform, width: f64, height: f64) -> Result<Self> {
        let inverse = transform.invert()?;
        let corners = [
            MapPoint::new(0.0, 0.0),
            MapPoint::new(width, 0.0),
            MapPoint::new(width, height),
            MapPoint::new(0.0, height),
        ]
        .map(|p| inverse.apply(p));
        let map_rect = MapRect::bounding(&corners)
            .filter(MapRect::is_finite)
            .ok_or_else(|| TileError::MalformedTransform("screen has no finite bounds".into()))?;
        Ok(Self::new(map_rect, transform, width, height))
    }

    pub fn zoom(&self) -> f64 {
        self.transform.zoom()
    }

    pub fn screen_rect(&self) -> MapRect {
        MapRect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn screen_point(&self, map: MapPoint) -> MapPoint {
        self.transform.apply(map)
    }

    /// Map-plane rectangle covered by `address` (wrapped copies keep their own position).
    pub fn tile_map_rect(address: TileAddress) -> MapRect {
        let size = 1.0 / crate::core::projection::tile_scale(address.zoom);
        MapRect::new(address.x as f64 * size, address.y as f64 * size, size, size)
    }

    /// Whether the tile's on-screen footprint, after rotation and perspective,
    /// intersects the screen.
    pub fn tile_overlaps_screen(&self, address: TileAddress) -> bool {
        let rect = Self::tile_map_rect(address);
        let corners = [
            rect.origin,
            MapPoint::new(rect.max_x(), rect.origin.y),
            MapPoint::new(rect.max_x(), rect.max_y()),
            MapPoint::new(rect.origin.x, rect.max_y()),
        ]
        .map(|p| self.transform.apply(p));

        let projected: Vec<MapPoint> = match self.transform.birds_eye {
            Some(birds_eye) => {
                let center = self.screen_rect().center();
                let mut out = Vec::with_capacity(4);
                for corner in corners {
                    match birds_eye.project(corner, center) {
                        Some(p) => out.push(p),
                        // part of the tile is behind the eye: keep it
                        None => return true,
                    }
                }
                out
            }
            None => corners.to_vec(),
        };

        match MapRect::bounding(&projected) {
            Some(footprint) if footprint.is_finite() => footprint.intersects(&self.screen_rect()),
            _ => false,
        }
    }

    pub fn tile_placement(&self, address: TileAddress) -> TilePlacement {
        let rect = Self::tile_map_rect(address);
        TilePlacement {
            origin: self.transform.apply(rect.origin),
            scale: self.transform.scale() * rect.width / crate::core::constants::TILE_SIZE as f64,
            rotation: self.transform.rotation(),
        }
    }
}
