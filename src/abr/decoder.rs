//! ABR decoder
//!
//! Parses Adobe Photoshop ABR brush files into alpha-only brush images.
//! Supports versions 1, 2, 6, 7, and 10.
//!
//! Malformed individual records (bad bounds, unsupported depth) are skipped
//! by seeking to the record's end. Malformed top-level structure aborts the
//! whole decode.

use super::error::AbrError;
use super::rle;
use super::scale::{compute_brush_size, remap_16bit, BrushResampler, SupersamplingResampler};
use super::section::BrushSectionIndex;
use super::types::{
    AbrVersion, BitDepth, BrushImage, BrushType, ImageCompression, Rect, SampleLayout,
};
use crate::io::{BigEndianReader, ByteSource};

/// Rows per pixel chunk in version 1/2 sampled records
pub const MAX_CHUNK_ROWS: u32 = 16384;

/// Smallest possible PackBits encoding: 2 bytes per 128 output bytes
const MIN_RLE_RATIO: u64 = 64;

/// Decoder for one ABR stream
pub struct AbrDecoder<R> {
    reader: BigEndianReader<R>,
    resampler: Box<dyn BrushResampler>,
}

impl<R: ByteSource> AbrDecoder<R> {
    pub fn new(source: R) -> Result<Self, AbrError> {
        Ok(Self {
            reader: BigEndianReader::new(source)?,
            resampler: Box::new(SupersamplingResampler),
        })
    }

    /// Replace the resampler used for scaled brush variants
    pub fn with_resampler(mut self, resampler: impl BrushResampler + 'static) -> Self {
        self.resampler = Box::new(resampler);
        self
    }

    /// Decode every sampled brush in the stream.
    ///
    /// Fails with [`AbrError::NoBrushesFound`] rather than returning an
    /// empty list.
    pub fn decode(mut self) -> Result<Vec<BrushImage>, AbrError> {
        let version = AbrVersion::from_i16(self.reader.read_i16()?)?;
        tracing::debug!("[ABR] Decoding version {:?}", version);

        let brushes = if version.is_new_format() {
            self.decode_version6(version)?
        } else {
            self.decode_version1(version)?
        };

        if brushes.is_empty() {
            return Err(AbrError::NoBrushesFound);
        }

        tracing::info!(
            "[ABR] Decoded {} brushes from version {} file",
            brushes.len(),
            version.as_i16()
        );

        Ok(brushes)
    }

    fn decode_version1(&mut self, version: AbrVersion) -> Result<Vec<BrushImage>, AbrError> {
        let count = self.reader.read_i16()?;
        if count < 0 {
            return Err(AbrError::InvalidArgument(format!(
                "negative brush count {}",
                count
            )));
        }

        let mut brushes = Vec::with_capacity(count as usize);

        for i in 0..count {
            let brush_type = self.reader.read_i16()?;
            let size = self.reader.read_i32()?;
            let size = u64::try_from(size).map_err(|_| {
                AbrError::InvalidArgument(format!("brush #{} has negative length {}", i, size))
            })?;
            let end = self.reader.position() + size;

            match BrushType::from_i16(brush_type) {
                Some(BrushType::Sampled) => {
                    if let Some(brush) = self.read_sampled_record(version, i, end)? {
                        brushes.push(brush);
                    }
                }
                Some(BrushType::Computed) => {
                    tracing::debug!("[ABR] Computed brush #{} skipped", i);
                }
                None => {
                    tracing::warn!("[ABR] Unknown brush type {} for brush #{}", brush_type, i);
                }
            }

            if self.reader.position() < end {
                self.reader.set_position(end)?;
            }
        }

        Ok(brushes)
    }

    /// Body of a version 1/2 sampled record. `None` means the record was
    /// tolerated but produced no image.
    fn read_sampled_record(
        &mut self,
        version: AbrVersion,
        index: i16,
        end: u64,
    ) -> Result<Option<BrushImage>, AbrError> {
        let reader = &mut self.reader;

        // Obsolete 'miscellaneous' field
        reader.skip(4)?;
        let spacing = reader.read_i16()?;
        let name = if version.has_names() {
            reader.read_unicode_string()?
        } else {
            String::new()
        };

        let _anti_alias = reader.read_u8()?;
        // i16 bounds duplicate the i32 rectangle
        reader.skip(8)?;

        let bounds = reader.read_rectangle()?;
        if bounds.is_empty() {
            tracing::warn!(
                "[ABR] Brush #{} has invalid bounds {}x{}",
                index,
                bounds.width,
                bounds.height
            );
            return Ok(None);
        }

        let depth = reader.read_i16()?;
        if depth != 8 {
            tracing::warn!("[ABR] Brush #{} has unsupported depth {}", index, depth);
            return Ok(None);
        }

        let (width, height) = (bounds.width as u32, bounds.height as u32);
        let mut alpha = allocate_plane(reader, &bounds, BitDepth::Eight)?;

        let row_bytes = width as usize;
        let mut chunk_start = 0u32;
        while chunk_start < height {
            let chunk_rows = (height - chunk_start).min(MAX_CHUNK_ROWS);
            let compression = ImageCompression::from(reader.read_u8()?);

            let start = chunk_start as usize * row_bytes;
            let stop = start + chunk_rows as usize * row_bytes;
            read_plane(
                reader,
                &mut alpha[start..stop],
                row_bytes,
                chunk_rows,
                compression,
            )?;

            chunk_start += chunk_rows;
        }

        if reader.position() > end {
            tracing::warn!(
                "[ABR] Brush #{} overran its record by {} bytes",
                index,
                reader.position() - end
            );
        }

        BrushImage::new(width, height, BitDepth::Eight, name, spacing, alpha).map(Some)
    }

    fn decode_version6(&mut self, version: AbrVersion) -> Result<Vec<BrushImage>, AbrError> {
        let minor = self.reader.read_i16()?;
        let layout = SampleLayout::from_minor(version, minor)?;

        let index = BrushSectionIndex::parse(&mut self.reader)?;
        let mut brushes = Vec::with_capacity(index.descriptors().len());

        let Some(sample_offset) = index.sample_section_offset() else {
            tracing::warn!("[ABR] No samp section found");
            return Ok(brushes);
        };
        if index.is_empty() {
            tracing::warn!("[ABR] No sampled brush descriptors found");
            return Ok(brushes);
        }

        self.reader.set_position(sample_offset)?;
        let section_length = self.reader.read_u32()? as u64;
        let section_end = self.reader.position() + section_length;

        while self.reader.position() < section_end {
            let record_length = self.reader.read_u32()? as u64;
            // Records are padded to 4-byte alignment
            let end = self.reader.position() + ((record_length + 3) & !3);

            self.read_sample_record(layout, &index, end, &mut brushes)?;

            if self.reader.position() < end {
                self.reader.set_position(end)?;
            }
        }

        Ok(brushes)
    }

    /// One record of the `samp` section, plus any scaled variants of it.
    fn read_sample_record(
        &mut self,
        layout: SampleLayout,
        index: &BrushSectionIndex,
        end: u64,
        brushes: &mut Vec<BrushImage>,
    ) -> Result<(), AbrError> {
        let reader = &mut self.reader;

        let tag = reader.read_pascal_string()?;
        reader.skip(layout.unused_bytes())?;

        let bounds = reader.read_rectangle()?;
        if bounds.is_empty() {
            tracing::warn!(
                "[ABR] Sample '{}' has invalid bounds {}x{}",
                tag,
                bounds.width,
                bounds.height
            );
            reader.set_position(end)?;
            return Ok(());
        }

        let raw_depth = reader.read_i16()?;
        let Some(depth) = BitDepth::from_i16(raw_depth) else {
            tracing::warn!("[ABR] Sample '{}' has unsupported depth {}", tag, raw_depth);
            reader.set_position(end)?;
            return Ok(());
        };

        let Some(master) = index.find_largest(&tag) else {
            tracing::warn!("[ABR] Sample '{}' has no matching brush preset", tag);
            return Ok(());
        };

        let compression = ImageCompression::from(reader.read_u8()?);
        let (width, height) = (bounds.width as u32, bounds.height as u32);

        let mut pixels = allocate_plane(reader, &bounds, depth)?;
        let row_bytes = width as usize * depth.bytes_per_sample();
        read_plane(reader, &mut pixels, row_bytes, height, compression)?;

        let alpha = match depth {
            BitDepth::Eight => pixels,
            BitDepth::Sixteen => remap_16bit(&pixels),
        };

        let image = BrushImage::new(
            width,
            height,
            depth,
            master.name.clone(),
            clamp_spacing(master.spacing),
            alpha,
        )?;

        // Smaller cached sizes of this brush are stored only once, at the
        // largest diameter
        let variants = index.smaller_variants(&tag, master.diameter);
        let mut scaled_brushes = Vec::with_capacity(variants.len());
        for variant in &variants {
            let (scaled_width, scaled_height) =
                compute_brush_size(bounds.width, bounds.height, variant.diameter);
            let scaled = self.resampler.resample(&image, scaled_width, scaled_height)?;

            scaled_brushes.push(BrushImage::new(
                scaled_width,
                scaled_height,
                depth,
                variant.name.clone(),
                clamp_spacing(variant.spacing),
                scaled,
            )?);
        }

        tracing::debug!(
            "[ABR] Sample '{}' {}x{} depth {} -> '{}' (+{} scaled)",
            tag,
            width,
            height,
            depth.bits(),
            image.name,
            scaled_brushes.len()
        );

        brushes.push(image);
        brushes.extend(scaled_brushes);

        Ok(())
    }
}

/// Zeroed pixel buffer for `bounds`, refusing sizes the remaining data
/// cannot possibly hold.
fn allocate_plane<R: ByteSource>(
    reader: &BigEndianReader<R>,
    bounds: &Rect,
    depth: BitDepth,
) -> Result<Vec<u8>, AbrError> {
    let size = (bounds.width as usize)
        .checked_mul(bounds.height as usize)
        .and_then(|n| n.checked_mul(depth.bytes_per_sample()))
        .ok_or(AbrError::ArithmeticOverflow)?;

    if size as u64 / MIN_RLE_RATIO > reader.remaining() {
        return Err(AbrError::UnexpectedEndOfData);
    }

    Ok(vec![0u8; size])
}

/// Fill `dest` with `rows` rows of `row_bytes` each.
fn read_plane<R: ByteSource>(
    reader: &mut BigEndianReader<R>,
    dest: &mut [u8],
    row_bytes: usize,
    rows: u32,
    compression: ImageCompression,
) -> Result<(), AbrError> {
    match compression {
        ImageCompression::Rle => {
            // Row byte counts; PackBits rows are self-delimiting
            reader.skip(rows as u64 * 2)?;
            for row in dest.chunks_exact_mut(row_bytes) {
                rle::decode_row(reader, row)?;
            }
            Ok(())
        }
        ImageCompression::Raw => reader.read_exact_into(dest),
    }
}

fn clamp_spacing(spacing: i32) -> i16 {
    spacing.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
