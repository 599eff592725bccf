//! Spherical mercator math shared by the layout planner and the WMS URL builder.
//!
//! Everything here is pure. Callers must check results for finiteness before
//! feeding them into tile arithmetic; a NaN here means the viewport is broken.

use std::f64::consts::PI;

use crate::core::{
    constants::{EPSG_4326, MERCATOR_HALF_EXTENT, WORLD_SIZE},
    geo::{GeoPoint, MapPoint},
};

/// Projects a geographic coordinate onto the map plane.
pub fn forward_mercator(point: GeoPoint) -> MapPoint {
    let lat = point.latitude.to_radians();
    let x = (point.longitude + 180.0) / 360.0 * WORLD_SIZE;
    let y = (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0 * WORLD_SIZE;
    MapPoint::new(x, y)
}

/// Inverse of [`forward_mercator`].
pub fn inverse_mercator(point: MapPoint) -> GeoPoint {
    let longitude = point.x / WORLD_SIZE * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * point.y / WORLD_SIZE)).sinh().atan();
    GeoPoint::new(latitude.to_degrees(), longitude)
}

/// Factor converting map units into tile indices at `zoom`.
pub fn tile_scale(zoom: u8) -> f64 {
    2f64.powi(zoom as i32) / WORLD_SIZE
}

/// Converts the north-west corner of tile `(x, y)` at `zoom` into a bounding
/// coordinate for a WMS request.
///
/// `EPSG:4326` yields plain degrees; any other identifier yields meters on the
/// EPSG:3857 plane.
pub fn tile_to_wms_coords(x: i64, y: i64, zoom: u8, projection: &str) -> MapPoint {
    let zoom_size = 2f64.powi(zoom as i32);
    let lon = x as f64 / zoom_size * PI * 2.0 - PI;
    let lat = (PI * (1.0 - 2.0 * y as f64 / zoom_size)).sinh().atan();
    if projection == EPSG_4326 {
        MapPoint::new(lon * 180.0 / PI, lat * 180.0 / PI)
    } else {
        let raw = MapPoint::new(lon, ((PI / 2.0 + lat) / 2.0).tan().ln());
        raw.scale(MERCATOR_HALF_EXTENT / PI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_forward_mercator_origin_and_corner() {
        let center = forward_mercator(GeoPoint::new(0.0, 0.0));
        assert!(close(center.x, 128.0, 1e-9));
        assert!(close(center.y, 128.0, 1e-9));

        let corner = forward_mercator(GeoPoint::new(85.0511287798, 180.0));
        assert!(close(corner.x, 256.0, 1e-9));
        assert!(close(corner.y, 0.0, 1e-6));
    }

    #[test]
    fn test_inverse_round_trip() {
        let original = GeoPoint::new(47.6062, -122.3321);
        let back = inverse_mercator(forward_mercator(original));
        assert!(close(back.latitude, original.latitude, 1e-9));
        assert!(close(back.longitude, original.longitude, 1e-9));
    }

    #[test]
    fn test_non_finite_input_propagates() {
        let p = forward_mercator(GeoPoint::new(f64::NAN, 10.0));
        assert!(!p.is_finite());
    }

    #[test]
    fn test_wms_coords_degrees() {
        let nw = tile_to_wms_coords(0, 0, 1, "EPSG:4326");
        assert!(close(nw.x, -180.0, 1e-9));
        assert!(close(nw.y, 85.0511287798, 1e-6));

        let center = tile_to_wms_coords(1, 1, 1, "EPSG:4326");
        assert!(close(center.x, 0.0, 1e-9));
        assert!(close(center.y, 0.0, 1e-9));
    }

    #[test]
    fn test_wms_coords_meters() {
        let nw = tile_to_wms_coords(0, 0, 0, "EPSG:3857");
        assert!(close(nw.x, -MERCATOR_HALF_EXTENT, 1e-3));
        assert!(close(nw.y, MERCATOR_HALF_EXTENT, 1e-3));
    }

    #[test]
    fn test_tile_scale() {
        assert_eq!(tile_scale(0), 1.0 / 256.0);
        assert_eq!(tile_scale(8), 1.0);
    }
}
