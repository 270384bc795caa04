//! ABR encoder
//!
//! Writes every non-empty layer of a document as a version 1/2 sampled
//! brush, cropped to the layer's alpha bounding box.

use image::RgbaImage;

use super::decoder::MAX_CHUNK_ROWS;
use super::document::{BrushDocument, BrushLayer};
use super::error::AbrError;
use super::options::SaveOptions;
use super::rle;
use super::types::{BrushType, ImageCompression, Rect};
use crate::io::{BigEndianWriter, ByteSink};

/// Largest count or dimension the i16 header and bounds fields can hold
pub const MAX_DOCUMENT_DIMENSION: u32 = i16::MAX as u32;

/// Spacing written when a layer carries no usable spacing metadata
pub const DEFAULT_SPACING_PERCENT: i16 = 25;

/// Brushes smaller than this in both directions are flagged anti-aliased
const ANTI_ALIAS_LIMIT: i32 = 32;

/// Encoder writing to one sink
pub struct AbrEncoder<W> {
    writer: BigEndianWriter<W>,
    options: SaveOptions,
}

impl<W: ByteSink> AbrEncoder<W> {
    pub fn new(sink: W, options: SaveOptions) -> Self {
        Self {
            writer: BigEndianWriter::new(sink),
            options,
        }
    }

    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    /// Encode `document`, calling `progress` with the completed fraction
    /// after each layer. Returns the number of brushes written.
    ///
    /// Sizes are validated before anything is written.
    pub fn encode(
        &mut self,
        document: &BrushDocument,
        mut progress: impl FnMut(f64),
    ) -> Result<usize, AbrError> {
        validate_document(document)?;

        let bounds: Vec<Option<Rect>> = document
            .layers
            .iter()
            .map(|layer| alpha_bounds(&layer.image))
            .collect();
        let brush_count = bounds.iter().flatten().count();

        let writer = &mut self.writer;
        writer.write_i16(self.options.version.as_i16())?;
        writer.write_i16(
            i16::try_from(brush_count).map_err(|_| AbrError::ArithmeticOverflow)?,
        )?;

        let total = document.layers.len();
        for (i, (layer, bounds)) in document.layers.iter().zip(&bounds).enumerate() {
            match bounds {
                Some(bounds) => write_brush(writer, layer, bounds, &self.options)?,
                None => tracing::debug!("[ABR] Layer '{}' is empty, skipped", layer.name),
            }

            progress((i + 1) as f64 / total as f64);
        }

        writer.flush()?;

        tracing::info!(
            "[ABR] Encoded {} of {} layers as version {} ({})",
            brush_count,
            total,
            self.options.version.as_i16(),
            if self.options.rle { "RLE" } else { "raw" }
        );

        Ok(brush_count)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

fn validate_document(document: &BrushDocument) -> Result<(), AbrError> {
    if document.layers.len() > MAX_DOCUMENT_DIMENSION as usize {
        return Err(AbrError::UnsupportedDocumentSize(format!(
            "{} layers exceeds the limit of {}",
            document.layers.len(),
            MAX_DOCUMENT_DIMENSION
        )));
    }

    let too_large = |w: u32, h: u32| w > MAX_DOCUMENT_DIMENSION || h > MAX_DOCUMENT_DIMENSION;
    if too_large(document.width, document.height) {
        return Err(AbrError::UnsupportedDocumentSize(format!(
            "{}x{} exceeds the limit of {}",
            document.width, document.height, MAX_DOCUMENT_DIMENSION
        )));
    }

    for layer in &document.layers {
        let (w, h) = layer.image.dimensions();
        if too_large(w, h) {
            return Err(AbrError::UnsupportedDocumentSize(format!(
                "layer '{}' is {}x{}",
                layer.name, w, h
            )));
        }
    }

    Ok(())
}

/// Smallest rectangle containing every pixel with alpha > 0
pub fn alpha_bounds(image: &RgbaImage) -> Option<Rect> {
    let mut top = u32::MAX;
    let mut left = u32::MAX;
    let mut bottom = 0;
    let mut right = 0;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[3] > 0 {
            top = top.min(y);
            left = left.min(x);
            bottom = bottom.max(y);
            right = right.max(x);
        }
    }

    if top == u32::MAX {
        return None;
    }

    Some(Rect::new(
        left as i32,
        top as i32,
        (right - left + 1) as i32,
        (bottom - top + 1) as i32,
    ))
}

/// Alpha channel of `bounds`, row-major
fn crop_alpha(image: &RgbaImage, bounds: &Rect) -> Vec<u8> {
    let (x0, y0) = (bounds.x as u32, bounds.y as u32);
    let (width, height) = (bounds.width as u32, bounds.height as u32);

    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            alpha.push(image.get_pixel(x, y).0[3]);
        }
    }
    alpha
}

fn layer_spacing(layer: &BrushLayer) -> i16 {
    layer
        .spacing_metadata()
        .and_then(|s| s.trim().parse::<i16>().ok())
        .unwrap_or(DEFAULT_SPACING_PERCENT)
}

fn write_brush<W: ByteSink>(
    writer: &mut BigEndianWriter<W>,
    layer: &BrushLayer,
    bounds: &Rect,
    options: &SaveOptions,
) -> Result<(), AbrError> {
    writer.write_i16(BrushType::Sampled.as_i16())?;

    let mut record = writer.length_scope()?;

    // Unused 'miscellaneous' field
    record.write_u32(0)?;
    record.write_i16(layer_spacing(layer))?;
    if options.version.has_names() {
        record.write_unicode_string(&layer.name)?;
    }

    let anti_alias = bounds.width < ANTI_ALIAS_LIMIT && bounds.height < ANTI_ALIAS_LIMIT;
    record.write_u8(anti_alias as u8)?;
    record.write_rectangle16(bounds)?;
    record.write_rectangle32(bounds)?;
    record.write_i16(8)?;

    let alpha = crop_alpha(&layer.image, bounds);
    let row_bytes = bounds.width as usize;
    let compression = if options.rle {
        ImageCompression::Rle
    } else {
        ImageCompression::Raw
    };

    for chunk in alpha.chunks(row_bytes * MAX_CHUNK_ROWS as usize) {
        record.write_u8(compression.as_u8())?;
        match compression {
            ImageCompression::Rle => write_rle_chunk(&mut record, chunk, row_bytes)?,
            ImageCompression::Raw => record.write_bytes(chunk)?,
        }
    }

    let length = record.finish()?;
    tracing::debug!(
        "[ABR] Wrote brush '{}' {}x{} ({} bytes)",
        layer.name,
        bounds.width,
        bounds.height,
        length
    );

    Ok(())
}

/// Row length table followed by the PackBits rows; the table is patched
/// once the rows are written.
fn write_rle_chunk<W: ByteSink>(
    writer: &mut BigEndianWriter<W>,
    chunk: &[u8],
    row_bytes: usize,
) -> Result<(), AbrError> {
    let rows = chunk.len() / row_bytes;
    let table_offset = writer.position()?;
    for _ in 0..rows {
        writer.write_i16(i16::MAX)?;
    }

    let mut row_lengths = Vec::with_capacity(rows);
    for row in chunk.chunks_exact(row_bytes) {
        let written = rle::encode_row(row, writer.get_mut())?;
        row_lengths.push(u16::try_from(written).map_err(|_| AbrError::ArithmeticOverflow)?);
    }

    let end = writer.position()?;
    writer.set_position(table_offset)?;
    for length in row_lengths {
        writer.write_u16(length)?;
    }
    writer.set_position(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abr::options::AbrFileVersion;
    use image::Rgba;
    use std::io::Cursor;

    fn encode(
        document: &BrushDocument,
        options: SaveOptions,
    ) -> Result<(usize, Vec<u8>), AbrError> {
        let mut encoder = AbrEncoder::new(Cursor::new(Vec::new()), options);
        let count = encoder.encode(document, |_| {})?;
        Ok((count, encoder.into_inner().into_inner()))
    }

    fn layer_with_dot(width: u32, height: u32, x: u32, y: u32) -> BrushLayer {
        let mut image = RgbaImage::new(width, height);
        image.put_pixel(x, y, Rgba([0, 0, 0, 200]));
        BrushLayer::new("dot", image)
    }

    #[test]
    fn test_alpha_bounds() {
        let mut image = RgbaImage::new(10, 10);
        assert_eq!(alpha_bounds(&image), None);

        image.put_pixel(2, 3, Rgba([0, 0, 0, 1]));
        image.put_pixel(6, 4, Rgba([255, 255, 255, 9]));
        // Colour without alpha does not count
        image.put_pixel(9, 9, Rgba([255, 0, 0, 0]));

        assert_eq!(alpha_bounds(&image), Some(Rect::new(2, 3, 5, 2)));
    }

    #[test]
    fn test_record_layout() {
        let mut doc = BrushDocument::new(4, 4);
        let mut layer = layer_with_dot(4, 4, 1, 2);
        layer.set_spacing(40);
        doc.layers.push(layer);

        let options = SaveOptions {
            version: AbrFileVersion::Version1,
            rle: false,
        };
        let (count, bytes) = encode(&doc, options).unwrap();
        assert_eq!(count, 1);

        let expected_record: Vec<u8> = [
            &[0, 0, 0, 0][..],    // unused
            &[0, 40],             // spacing
            &[1],                 // anti-alias
            &[0, 2, 0, 1, 0, 3, 0, 2],
            &[0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 2],
            &[0, 8],              // depth
            &[0, 200],            // raw chunk
        ]
        .concat();

        assert_eq!(&bytes[..6], &[0, 1, 0, 1, 0, 2]);
        assert_eq!(
            &bytes[6..10],
            &(expected_record.len() as u32).to_be_bytes()
        );
        assert_eq!(&bytes[10..], expected_record.as_slice());
    }

    #[test]
    fn test_rle_row_table_is_patched() {
        let mut image = RgbaImage::new(3, 2);
        for x in 0..3 {
            image.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
            image.put_pixel(x, 1, Rgba([0, 0, 0, x as u8 + 1]));
        }
        let mut doc = BrushDocument::new(3, 2);
        doc.layers.push(BrushLayer::new("", image));

        let options = SaveOptions {
            version: AbrFileVersion::Version1,
            rle: true,
        };
        let (_, bytes) = encode(&doc, options).unwrap();

        let tail = &bytes[bytes.len() - (1 + 4 + 2 + 4)..];
        assert_eq!(tail, &[1, 0, 2, 0, 4, 0xFE, 255, 2, 1, 2, 3]);
    }

    #[test]
    fn test_empty_layers_are_not_counted() {
        let mut doc = BrushDocument::new(8, 8);
        doc.layers.push(BrushLayer::new("empty", RgbaImage::new(8, 8)));
        doc.layers.push(layer_with_dot(8, 8, 0, 0));

        let mut fractions = Vec::new();
        let mut encoder = AbrEncoder::new(Cursor::new(Vec::new()), SaveOptions::default());
        let count = encoder.encode(&doc, |f| fractions.push(f)).unwrap();

        assert_eq!(count, 1);
        assert_eq!(fractions, vec![0.5, 1.0]);
        let bytes = encoder.into_inner().into_inner();
        assert_eq!(&bytes[..4], &[0, 2, 0, 1]);
    }

    #[test]
    fn test_spacing_fallback() {
        let mut layer = layer_with_dot(1, 1, 0, 0);
        assert_eq!(layer_spacing(&layer), DEFAULT_SPACING_PERCENT);

        layer
            .metadata
            .insert("AbrBrushSpacing".to_string(), "not a number".to_string());
        assert_eq!(layer_spacing(&layer), DEFAULT_SPACING_PERCENT);

        layer.set_spacing(75);
        assert_eq!(layer_spacing(&layer), 75);
    }

    #[test]
    fn test_oversized_document_writes_nothing() {
        let doc = BrushDocument::new(40_000, 1);
        let mut encoder = AbrEncoder::new(Cursor::new(Vec::new()), SaveOptions::default());

        assert!(matches!(
            encoder.encode(&doc, |_| {}),
            Err(AbrError::UnsupportedDocumentSize(_))
        ));
        assert!(encoder.into_inner().into_inner().is_empty());
    }
}
