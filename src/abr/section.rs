//! Brush section index for version 6+ files
//!
//! After the minor version, a 6-family file is a run of `8BIM` sections.
//! The `desc` section holds the brush presets as an action descriptor; the
//! `samp` section holds the bitmaps, keyed by the `sampledData` tag of each
//! preset. Several presets may share one tag, each a cached size of the same
//! bitmap.

use super::descriptor::{parse_descriptor, Descriptor};
use super::error::AbrError;
use super::types::SampledBrushDescriptor;
use crate::io::{BigEndianReader, ByteSource};

const SECTION_SIGNATURE: &[u8; 4] = b"8BIM";

/// Spacing used when a preset carries no `Spcn` value
const DEFAULT_SPACING: i32 = 25;

/// Tag table plus the location of the sample section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrushSectionIndex {
    descriptors: Vec<SampledBrushDescriptor>,
    sample_section_offset: Option<u64>,
}

impl BrushSectionIndex {
    pub fn new(
        descriptors: Vec<SampledBrushDescriptor>,
        sample_section_offset: Option<u64>,
    ) -> Self {
        Self {
            descriptors,
            sample_section_offset,
        }
    }

    /// Scan the `8BIM` sections starting at the reader's position.
    ///
    /// Stops at end of data or at the first block without the signature.
    /// The reader is left at the point where scanning stopped.
    pub fn parse<R: ByteSource>(reader: &mut BigEndianReader<R>) -> Result<Self, AbrError> {
        let mut index = Self::default();

        while reader.remaining() >= 12 {
            let block_start = reader.position();
            let signature = reader.read_bytes(4)?;
            if signature.as_slice() != SECTION_SIGNATURE {
                tracing::debug!("[ABR] No 8BIM signature at {}, stopping scan", block_start);
                reader.set_position(block_start)?;
                break;
            }

            let key = reader.read_ascii_string(4)?;
            let length_offset = reader.position();
            let length = reader.read_u32()? as u64;
            let payload_start = reader.position();
            let section_end = payload_start + length;

            tracing::debug!(
                "[ABR] Section '{}' at {}, {} bytes",
                key,
                block_start,
                length
            );

            match key.as_str() {
                "samp" => index.sample_section_offset = Some(length_offset),
                "desc" => {
                    let descriptor = parse_descriptor(reader)?;
                    index.descriptors.extend(collect_sampled_brushes(&descriptor));
                }
                _ => {}
            }

            if section_end > reader.len() {
                tracing::warn!(
                    "[ABR] Section '{}' claims {} bytes past end of data",
                    key,
                    section_end - reader.len()
                );
                break;
            }
            reader.set_position(section_end)?;
        }

        tracing::debug!(
            "[ABR] Tag table: {} sampled descriptors, samp at {:?}",
            index.descriptors.len(),
            index.sample_section_offset
        );

        Ok(index)
    }

    pub fn descriptors(&self) -> &[SampledBrushDescriptor] {
        &self.descriptors
    }

    /// Offset of the sample section's u32 length field
    pub fn sample_section_offset(&self) -> Option<u64> {
        self.sample_section_offset
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// First descriptor with the strictly largest positive diameter for `tag`
    pub fn find_largest(&self, tag: &str) -> Option<&SampledBrushDescriptor> {
        let mut best: Option<&SampledBrushDescriptor> = None;
        let mut max_diameter = 0;

        for descriptor in self.descriptors.iter().filter(|d| d.tag == tag) {
            if descriptor.diameter > max_diameter {
                max_diameter = descriptor.diameter;
                best = Some(descriptor);
            }
        }

        best
    }

    /// Descriptors for `tag` smaller than `diameter`, largest first
    pub fn smaller_variants(&self, tag: &str, diameter: i32) -> Vec<&SampledBrushDescriptor> {
        let mut variants: Vec<_> = self
            .descriptors
            .iter()
            .filter(|d| d.tag == tag && d.diameter < diameter)
            .collect();
        variants.sort_by(|a, b| b.diameter.cmp(&a.diameter));
        variants
    }
}

/// Pull sampled presets out of the `desc` descriptor's `Brsh` list
fn collect_sampled_brushes(root: &Descriptor) -> Vec<SampledBrushDescriptor> {
    let Some(presets) = root.get("Brsh").and_then(|v| v.as_list()) else {
        tracing::warn!("[ABR] desc section has no Brsh list");
        return Vec::new();
    };

    presets
        .iter()
        .filter_map(|preset| preset.as_descriptor())
        .filter_map(|preset| {
            let name = preset
                .get("Nm  ")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let brush = preset.get("Brsh").and_then(|v| v.as_descriptor())?;
            // Computed presets have no sampledData
            let tag = brush.get("sampledData").and_then(|v| v.as_str())?;

            let diameter = brush
                .get("Dmtr")
                .and_then(|v| v.as_number())
                .map_or(0, |d| d as i32);
            let spacing = brush
                .get("Spcn")
                .and_then(|v| v.as_number())
                .map_or(DEFAULT_SPACING, |s| s as i32);

            Some(SampledBrushDescriptor {
                name,
                tag: tag.to_string(),
                diameter,
                spacing,
            })
        })
        .collect()
}
