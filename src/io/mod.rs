//! Big-endian binary I/O
//!
//! Buffered reader and endian-correct writer shared by the ABR decoder and
//! encoder. Both sit on top of any seekable `std::io` stream.

mod reader;
mod source;
mod writer;

pub use reader::{BigEndianReader, MAX_BUFFER_SIZE};
pub use source::{ByteSink, ByteSource};
pub use writer::{BigEndianWriter, LengthScope};
