//! Seekable byte stream abstractions

use std::io::{self, Read, Seek, SeekFrom, Write};

/// A readable, position-addressable stream of known length.
pub trait ByteSource: Read + Seek {
    /// Total length of the stream in bytes. The current position is preserved.
    fn byte_len(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if current != end {
            self.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }
}

impl<T: Read + Seek> ByteSource for T {}

/// A writable, position-addressable stream (needed for backpatching).
pub trait ByteSink: Write + Seek {}

impl<T: Write + Seek> ByteSink for T {}
