//! Layered document model at the host boundary
//!
//! Decoded brushes become one layer each on a canvas sized to the largest
//! brush; the encoder reads layers back the same way.

use image::{imageops, RgbaImage};
use indexmap::IndexMap;

use super::error::AbrError;
use super::types::BrushImage;

/// Layer metadata key holding the brush spacing as a decimal string
pub const SPACING_METADATA_KEY: &str = "AbrBrushSpacing";

/// A single raster layer
#[derive(Debug, Clone, PartialEq)]
pub struct BrushLayer {
    pub name: String,
    pub image: RgbaImage,
    pub is_background: bool,
    pub metadata: IndexMap<String, String>,
}

impl BrushLayer {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            image,
            is_background: false,
            metadata: IndexMap::new(),
        }
    }

    /// Stored spacing, unparsed
    pub fn spacing_metadata(&self) -> Option<&str> {
        self.metadata.get(SPACING_METADATA_KEY).map(String::as_str)
    }

    pub fn set_spacing(&mut self, spacing: i16) {
        self.metadata
            .insert(SPACING_METADATA_KEY.to_string(), spacing.to_string());
    }
}

/// Canvas plus its layers, bottom first
#[derive(Debug, Clone, PartialEq)]
pub struct BrushDocument {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<BrushLayer>,
}

impl BrushDocument {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
        }
    }

    /// One layer per brush, each copied to the top-left of a canvas sized
    /// to the largest brush.
    pub fn from_brushes(brushes: Vec<BrushImage>) -> Result<Self, AbrError> {
        if brushes.is_empty() {
            return Err(AbrError::NoBrushesFound);
        }

        let width = brushes.iter().map(|b| b.width).max().unwrap_or(1);
        let height = brushes.iter().map(|b| b.height).max().unwrap_or(1);
        let mut document = Self::new(width, height);

        for (i, brush) in brushes.into_iter().enumerate() {
            let mut canvas = RgbaImage::new(width, height);
            imageops::replace(&mut canvas, &brush.to_rgba_image(), 0, 0);

            let name = if brush.name.is_empty() {
                format!("Brush {}", i)
            } else {
                brush.name
            };

            let mut layer = BrushLayer::new(name, canvas);
            layer.is_background = i == 0;
            layer.set_spacing(brush.spacing);
            document.layers.push(layer);
        }

        Ok(document)
    }

    pub fn push_layer(&mut self, layer: BrushLayer) -> Result<(), AbrError> {
        if layer.image.dimensions() != (self.width, self.height) {
            return Err(AbrError::InvalidArgument(format!(
                "layer '{}' is {}x{}, document is {}x{}",
                layer.name,
                layer.image.width(),
                layer.image.height(),
                self.width,
                self.height
            )));
        }
        self.layers.push(layer);
        Ok(())
    }
}
