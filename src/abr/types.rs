//! ABR data types
//!
//! Type definitions shared by the decoder, the encoder and the tag table.

use image::{Rgba, RgbaImage};

use super::error::AbrError;

/// ABR file format version (leading big-endian i16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbrVersion {
    /// Photoshop 4, sampled records without names
    V1,
    /// Photoshop 5-6, sampled records with UTF-16 names
    V2,
    /// Photoshop 7+
    V6,
    /// Photoshop CS and later, used for 16-bit brushes
    V7,
    /// Photoshop CS6 / Creative Cloud
    V10,
}

impl AbrVersion {
    pub fn from_i16(value: i16) -> Result<Self, AbrError> {
        match value {
            1 => Ok(AbrVersion::V1),
            2 => Ok(AbrVersion::V2),
            6 => Ok(AbrVersion::V6),
            7 => Ok(AbrVersion::V7),
            10 => Ok(AbrVersion::V10),
            other => Err(AbrError::UnsupportedFormatVersion(other)),
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            AbrVersion::V1 => 1,
            AbrVersion::V2 => 2,
            AbrVersion::V6 => 6,
            AbrVersion::V7 => 7,
            AbrVersion::V10 => 10,
        }
    }

    /// Check if this is a "new" format (V6+) with a tag table
    pub fn is_new_format(self) -> bool {
        matches!(self, AbrVersion::V6 | AbrVersion::V7 | AbrVersion::V10)
    }

    /// Whether version-1-family sampled records carry a name field
    pub fn has_names(self) -> bool {
        self == AbrVersion::V2
    }
}

/// Minor version of the version 6 family.
///
/// Decides how many unused bytes precede the bounds in each sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// Minor version 1: i16 bounds plus an unknown i16
    Short,
    /// Minor version 2
    Long,
}

impl SampleLayout {
    pub fn from_minor(major: AbrVersion, minor: i16) -> Result<Self, AbrError> {
        match minor {
            1 => Ok(SampleLayout::Short),
            2 => Ok(SampleLayout::Long),
            _ => Err(AbrError::UnsupportedFormatSubVersion {
                major: major.as_i16(),
                minor,
            }),
        }
    }

    pub fn unused_bytes(self) -> u64 {
        match self {
            SampleLayout::Short => 10,
            SampleLayout::Long => 264,
        }
    }
}

/// Brush record type in the version 1 family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushType {
    /// Parametric brush, no bitmap
    Computed,
    Sampled,
}

impl BrushType {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(BrushType::Computed),
            2 => Some(BrushType::Sampled),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            BrushType::Computed => 1,
            BrushType::Sampled => 2,
        }
    }
}

/// Pixel data compression selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCompression {
    Raw,
    Rle,
}

impl ImageCompression {
    pub fn as_u8(self) -> u8 {
        match self {
            ImageCompression::Raw => 0,
            ImageCompression::Rle => 1,
        }
    }
}

impl From<u8> for ImageCompression {
    /// Anything other than 1 is read as raw data.
    fn from(value: u8) -> Self {
        if value == 1 {
            ImageCompression::Rle
        } else {
            ImageCompression::Raw
        }
    }
}

/// Sample bit depth of a brush image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }
}

/// Rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from edges as stored on disk. Extents that are not positive
    /// or do not fit in `i32` give an empty rectangle.
    pub fn from_edges(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        let extent = |from: i32, to: i32| i32::try_from(to as i64 - from as i64).unwrap_or(0);

        Self {
            x: left,
            y: top,
            width: extent(left, right),
            height: extent(top, bottom),
        }
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Zero or negative extent
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A decoded brush: an alpha-only mask plus metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrushImage {
    pub width: u32,
    pub height: u32,
    /// Depth of the samples the mask was decoded from
    pub depth: BitDepth,
    pub name: String,
    /// Dab spacing in percent of the diameter
    pub spacing: i16,
    /// One byte per pixel, row-major (0 = transparent, 255 = opaque)
    pub alpha: Vec<u8>,
}

impl BrushImage {
    pub fn new(
        width: u32,
        height: u32,
        depth: BitDepth,
        name: impl Into<String>,
        spacing: i16,
        alpha: Vec<u8>,
    ) -> Result<Self, AbrError> {
        if width == 0 || height == 0 {
            return Err(AbrError::InvalidArgument(format!(
                "brush size {}x{} is empty",
                width, height
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or(AbrError::ArithmeticOverflow)?;
        if alpha.len() != expected {
            return Err(AbrError::InvalidArgument(format!(
                "alpha mask has {} bytes, expected {}",
                alpha.len(),
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            depth,
            name: name.into(),
            spacing,
            alpha,
        })
    }

    /// Get alpha value at coordinates
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.alpha.get(idx).copied()
        } else {
            None
        }
    }

    /// Alpha-only RGBA surface (RGB is always zero)
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            Rgba([0, 0, 0, self.alpha_at(x, y).unwrap_or(0)])
        })
    }
}

/// One entry of the version 6 tag table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledBrushDescriptor {
    pub name: String,
    /// Key of the sample record holding the pixels (not unique)
    pub tag: String,
    pub diameter: i32,
    pub spacing: i32,
}
