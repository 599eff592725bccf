//! Turning fetched bytes into displayable tiles.

use crate::prelude::Arc;
use crate::Result;

/// Decodes raw tile payloads.
///
/// `Ok(None)` means the payload carries no image data; the caller falls back
/// to a coarser zoom without treating it as a failure.
pub trait TileDecoder: Send + Sync + 'static {
    type Image: Send + Sync + 'static;

    fn decode(&self, bytes: &[u8]) -> Result<Option<Self::Image>>;

    /// Approximate memory footprint of a decoded image, in bytes.
    fn cost(&self, image: &Self::Image) -> usize;
}

/// Wraps a decoder so that empty payloads and the service's placeholder image
/// decode to "no image data".
pub struct PlaceholderFilter<D> {
    inner: Arc<D>,
    placeholder: Option<Vec<u8>>,
}

impl<D: TileDecoder> PlaceholderFilter<D> {
    pub fn new(inner: Arc<D>, placeholder: Option<Vec<u8>>) -> Self {
        Self {
            inner,
            placeholder: placeholder.filter(|p| !p.is_empty()),
        }
    }

    pub fn is_placeholder(&self, bytes: &[u8]) -> bool {
        bytes.is_empty() || self.placeholder.as_deref() == Some(bytes)
    }
}

impl<D: TileDecoder> TileDecoder for PlaceholderFilter<D> {
    type Image = D::Image;

    fn decode(&self, bytes: &[u8]) -> Result<Option<D::Image>> {
        if self.is_placeholder(bytes) {
            return Ok(None);
        }
        self.inner.decode(bytes)
    }

    fn cost(&self, image: &D::Image) -> usize {
        self.inner.cost(image)
    }
}

/// Keeps the payload as-is; handy for renderers that decode on their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesDecoder;

impl TileDecoder for BytesDecoder {
    type Image = Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(Some(bytes.to_vec()))
    }

    fn cost(&self, image: &Vec<u8>) -> usize {
        image.len()
    }
}

/// Decodes PNG/JPEG payloads into RGBA buffers.
#[cfg(feature = "render")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

#[cfg(feature = "render")]
impl TileDecoder for RasterDecoder {
    type Image = image::RgbaImage;

    fn decode(&self, bytes: &[u8]) -> Result<Option<image::RgbaImage>> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| crate::TileError::Decode(format!("Failed to load image: {}", e)))?
            .to_rgba8();
        Ok(Some(img))
    }

    fn cost(&self, image: &image::RgbaImage) -> usize {
        image.as_raw().len()
    }
}
