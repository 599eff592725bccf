//! Tile addresses, resident-slot keys and the quadkey codec.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::constants::MAX_QUADKEY_ZOOM;
use crate::{Result, TileError};

/// A tile in the slippy-map pyramid.
///
/// `y` must lie in `[0, 2^zoom)`. `x` may be any integer: values outside the
/// range address a wrapped copy of the world and are folded back by
/// [`TileAddress::normalized`] before anything is looked up or fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    pub zoom: u8,
    pub x: i64,
    pub y: i64,
}

impl TileAddress {
    pub fn new(zoom: u8, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at `zoom`.
    pub fn tiles_per_side(zoom: u8) -> i64 {
        1i64 << zoom
    }

    /// Whether `y` is inside the pyramid (there is no wraparound on `y`).
    pub fn has_valid_row(&self) -> bool {
        (0..Self::tiles_per_side(self.zoom)).contains(&self.y)
    }

    /// Folds `x` into `[0, 2^zoom)` with a floored modulo; `y` is left alone.
    pub fn normalized(&self) -> TileAddress {
        TileAddress {
            x: self.x.rem_euclid(Self::tiles_per_side(self.zoom)),
            ..*self
        }
    }

    /// The tile one zoom level coarser that covers this one.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.zoom == 0 {
            None
        } else {
            Some(TileAddress::new(self.zoom - 1, self.x >> 1, self.y >> 1))
        }
    }

    pub fn key(&self) -> TileKey {
        TileKey(*self)
    }

    /// Quadkey of the normalized address; the cache and URL key of this tile.
    pub fn quadkey(&self) -> String {
        let n = self.normalized();
        encode_quadkey(n.zoom, n.x, n.y)
    }
}

/// Folds `address.x` into range, see [`TileAddress::normalized`].
pub fn normalize(address: TileAddress) -> TileAddress {
    address.normalized()
}

/// Encodes a tile as one base-4 digit per zoom level, most significant first.
///
/// `x` and `y` must already be inside `[0, 2^zoom)`.
pub fn encode_quadkey(zoom: u8, x: i64, y: i64) -> String {
    debug_assert!(zoom <= MAX_QUADKEY_ZOOM);
    debug_assert!((0..TileAddress::tiles_per_side(zoom)).contains(&x));
    debug_assert!((0..TileAddress::tiles_per_side(zoom)).contains(&y));

    let mut key = String::with_capacity(zoom as usize);
    for level in (1..=zoom).rev() {
        let mask = 1i64 << (level - 1);
        let mut digit = b'0';
        if x & mask != 0 {
            digit += 1;
        }
        if y & mask != 0 {
            digit += 2;
        }
        key.push(digit as char);
    }
    key
}

/// Exact inverse of [`encode_quadkey`].
pub fn decode_quadkey(key: &str) -> Result<TileAddress> {
    if key.is_empty() {
        return Err(TileError::InvalidKey("empty quadkey".into()));
    }
    if key.len() > MAX_QUADKEY_ZOOM as usize {
        return Err(TileError::InvalidKey(format!(
            "quadkey '{key}' is deeper than zoom {MAX_QUADKEY_ZOOM}"
        )));
    }

    let zoom = key.len() as u8;
    let (mut x, mut y) = (0i64, 0i64);
    for (i, digit) in key.bytes().enumerate() {
        let mask = 1i64 << (zoom as usize - i - 1);
        match digit {
            b'0' => {}
            b'1' => x |= mask,
            b'2' => y |= mask,
            b'3' => {
                x |= mask;
                y |= mask;
            }
            _ => {
                return Err(TileError::InvalidKey(format!(
                    "quadkey '{key}' contains '{}'",
                    digit as char
                )))
            }
        }
    }
    Ok(TileAddress::new(zoom, x, y))
}

/// Identifies one resident tile slot, formatted `"{zoom},{x},{y}"`.
///
/// Slots keep the raw `x` so that wrapped copies of the world sit at their own
/// screen position; the cache underneath is keyed by the normalized quadkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey(TileAddress);

impl TileKey {
    pub fn address(&self) -> TileAddress {
        self.0
    }

    pub fn zoom(&self) -> u8 {
        self.0.zoom
    }

    /// Two keys are equivalent when their normalized addresses match.
    pub fn is_equivalent(&self, other: &TileKey) -> bool {
        self.0.normalized() == other.0.normalized()
    }
}

impl From<TileAddress> for TileKey {
    fn from(address: TileAddress) -> Self {
        TileKey(address)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0.zoom, self.0.x, self.0.y)
    }
}

impl FromStr for TileKey {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TileError::InvalidKey(format!("tile key '{s}'"));
        let mut parts = s.split(',');
        let zoom = parts.next().and_then(|p| p.trim().parse::<u8>().ok());
        let x = parts.next().and_then(|p| p.trim().parse::<i64>().ok());
        let y = parts.next().and_then(|p| p.trim().parse::<i64>().ok());
        match (zoom, x, y, parts.next()) {
            (Some(zoom), Some(x), Some(y), None) => Ok(TileKey(TileAddress::new(zoom, x, y))),
            _ => Err(invalid()),
        }
    }
}
