//! Pixel normalization and scaled brush sizes

use image::{imageops, GrayImage};

use super::error::AbrError;
use super::types::BrushImage;

/// Convert a big-endian 16-bit sample (0..=32768) to 8-bit alpha.
#[inline]
pub fn alpha_from_16bit(sample: u16) -> u8 {
    ((sample as u32 * 10) / 1285).min(255) as u8
}

/// Remap a row-major buffer of big-endian 16-bit samples to 8-bit alpha.
pub fn remap_16bit(raw: &[u8]) -> Vec<u8> {
    raw.chunks_exact(2)
        .map(|pair| alpha_from_16bit(u16::from_be_bytes([pair[0], pair[1]])))
        .collect()
}

/// Target size for a scaled brush whose longest edge is at most `max_edge`.
///
/// Non-positive input dimensions give 1x1. The shorter side keeps the
/// aspect ratio and never drops below 1.
pub fn compute_brush_size(width: i32, height: i32, max_edge: i32) -> (u32, u32) {
    if width <= 0 || height <= 0 {
        return (1, 1);
    }

    let (width, height, max_edge) = (width as i64, height as i64, max_edge as i64);
    let (long, short) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };

    let new_long = long.min(max_edge).max(1);
    let new_short = if width == height {
        new_long
    } else {
        (short * new_long / long).max(1)
    };

    if width >= height {
        (new_long as u32, new_short as u32)
    } else {
        (new_short as u32, new_long as u32)
    }
}

/// Produces the pixels of a scaled-down brush variant.
pub trait BrushResampler {
    /// Resample `source.alpha` to `width * height` bytes.
    fn resample(&self, source: &BrushImage, width: u32, height: u32)
        -> Result<Vec<u8>, AbrError>;
}

/// Area-averaging downsampler backed by `image::imageops::thumbnail`
#[derive(Debug, Clone, Copy, Default)]
pub struct SupersamplingResampler;

impl BrushResampler for SupersamplingResampler {
    fn resample(
        &self,
        source: &BrushImage,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, AbrError> {
        if width == source.width && height == source.height {
            return Ok(source.alpha.clone());
        }

        let gray = GrayImage::from_raw(source.width, source.height, source.alpha.clone())
            .ok_or_else(|| {
                AbrError::InvalidArgument(format!(
                    "mask does not match {}x{}",
                    source.width, source.height
                ))
            })?;

        Ok(imageops::thumbnail(&gray, width, height).into_raw())
    }
}
