//! ABR (Adobe Brush) file decoder and encoder
//!
//! Reads the sampled brushes of Photoshop ABR files into alpha-only brush
//! images, and writes layered documents back as sampled brushes.
//!
//! # Supported Versions
//!
//! - V1/V2: Old format (Photoshop 4-6), decode and encode
//! - V6/V7/V10: Modern format (Photoshop 7+), decode only
//!
//! # Example
//!
//! ```ignore
//! use sutu_abr::abr::{self, SaveOptions};
//!
//! let document = abr::load_file("brushes.abr")?;
//! for layer in &document.layers {
//!     println!("Brush: {} (spacing {:?})", layer.name, layer.spacing_metadata());
//! }
//!
//! abr::save_file(&document, "copy.abr", SaveOptions::default(), |_| {})?;
//! ```

pub mod decoder;
pub mod descriptor;
pub mod document;
pub mod encoder;
pub mod error;
pub mod options;
pub mod rle;
pub mod scale;
pub mod section;
pub mod types;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use decoder::AbrDecoder;
pub use document::{BrushDocument, BrushLayer, SPACING_METADATA_KEY};
pub use encoder::AbrEncoder;
pub use error::AbrError;
pub use options::{AbrFileVersion, SaveOptions};
pub use scale::{BrushResampler, SupersamplingResampler};
pub use section::BrushSectionIndex;
pub use types::{AbrVersion, BitDepth, BrushImage, SampledBrushDescriptor};

use crate::io::{ByteSink, ByteSource};

/// Decode all brushes from `source`
pub fn decode<R: ByteSource>(source: R) -> Result<Vec<BrushImage>, AbrError> {
    AbrDecoder::new(source)?.decode()
}

/// Decode `source` and lay the brushes out as a document
pub fn load<R: ByteSource>(source: R) -> Result<BrushDocument, AbrError> {
    BrushDocument::from_brushes(decode(source)?)
}

/// Encode `document` into `sink`. Returns the number of brushes written.
pub fn save<W: ByteSink>(
    document: &BrushDocument,
    sink: W,
    options: SaveOptions,
    progress: impl FnMut(f64),
) -> Result<usize, AbrError> {
    AbrEncoder::new(sink, options).encode(document, progress)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<BrushDocument, AbrError> {
    let path = path.as_ref();
    tracing::debug!("[ABR] Loading {}", path.display());
    load(File::open(path)?)
}

pub fn save_file(
    document: &BrushDocument,
    path: impl AsRef<Path>,
    options: SaveOptions,
    progress: impl FnMut(f64),
) -> Result<usize, AbrError> {
    let path = path.as_ref();
    tracing::debug!("[ABR] Saving {}", path.display());
    save(document, BufWriter::new(File::create(path)?), options, progress)
}
