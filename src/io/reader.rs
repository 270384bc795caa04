//! Buffered big-endian reader
//!
//! Photoshop formats are read a few bytes at a time (an i16 here, a Pascal
//! string there), so every primitive read is served from a single reusable
//! buffer and the underlying stream is only touched when the buffer runs dry.
//! Large reads bypass the buffer and go straight to the stream.

use std::io::{ErrorKind, SeekFrom};

use byteorder::{BigEndian, ByteOrder};

use super::source::ByteSource;
use crate::abr::error::AbrError;
use crate::abr::types::Rect;

/// Upper bound of the internal buffer.
pub const MAX_BUFFER_SIZE: usize = 4096;

/// Seekable big-endian reader with an internal read-ahead window.
///
/// The reader owns its cursor state; it is meant to be passed by `&mut`
/// through one decode call. After an error the position is unspecified.
pub struct BigEndianReader<R> {
    inner: R,
    buffer: Vec<u8>,
    read_offset: usize,
    read_len: usize,
    /// Position of `inner`, i.e. the end of the buffered window.
    stream_pos: u64,
    length: u64,
}

impl<R: ByteSource> BigEndianReader<R> {
    /// Wrap a source. Reading starts at the source's current position.
    pub fn new(mut inner: R) -> Result<Self, AbrError> {
        let length = inner.byte_len()?;
        let stream_pos = inner.stream_position()?;
        let buffer_size = length.min(MAX_BUFFER_SIZE as u64) as usize;

        Ok(Self {
            inner,
            buffer: vec![0; buffer_size],
            read_offset: 0,
            read_len: 0,
            stream_pos,
            length,
        })
    }

    /// Total length of the underlying source.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Size of the internal buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Current logical read position.
    pub fn position(&self) -> u64 {
        self.stream_pos - self.read_len as u64 + self.read_offset as u64
    }

    /// Bytes left between the current position and the end of the source.
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position())
    }

    /// Move the read position. Targets inside the buffered window are
    /// satisfied without touching the underlying source.
    pub fn set_position(&mut self, position: u64) -> Result<(), AbrError> {
        let current = self.position();
        if position == current {
            return Ok(());
        }

        let window_start = current - self.read_offset as u64;
        let window_end = window_start + self.read_len as u64;

        if position >= window_start && position <= window_end {
            self.read_offset = (position - window_start) as usize;
        } else {
            self.read_offset = 0;
            self.read_len = 0;
            self.stream_pos = self.inner.seek(SeekFrom::Start(position))?;
        }

        Ok(())
    }

    /// Advance the read position by `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<(), AbrError> {
        let target = self
            .position()
            .checked_add(count)
            .ok_or(AbrError::ArithmeticOverflow)?;
        self.set_position(target)
    }

    pub fn read_u8(&mut self) -> Result<u8, AbrError> {
        if self.read_offset < self.read_len {
            let value = self.buffer[self.read_offset];
            self.read_offset += 1;
            return Ok(value);
        }

        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_i8(&mut self) -> Result<i8, AbrError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, AbrError> {
        Ok(BigEndian::read_u16(&self.read_array::<2>()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, AbrError> {
        Ok(BigEndian::read_i16(&self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, AbrError> {
        Ok(BigEndian::read_u32(&self.read_array::<4>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, AbrError> {
        Ok(BigEndian::read_i32(&self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, AbrError> {
        Ok(BigEndian::read_u64(&self.read_array::<8>()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, AbrError> {
        Ok(BigEndian::read_i64(&self.read_array::<8>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, AbrError> {
        Ok(BigEndian::read_f32(&self.read_array::<4>()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, AbrError> {
        Ok(BigEndian::read_f64(&self.read_array::<8>()?))
    }

    /// Fill `dest` completely or fail with `UnexpectedEndOfData`.
    pub fn read_exact_into(&mut self, dest: &mut [u8]) -> Result<(), AbrError> {
        let count = dest.len();
        if count == 0 {
            return Ok(());
        }

        if self.read_offset + count <= self.read_len {
            dest.copy_from_slice(&self.buffer[self.read_offset..self.read_offset + count]);
            self.read_offset += count;
            return Ok(());
        }

        if count < self.buffer.len() {
            if !self.fill_buffer(count)? {
                return Err(AbrError::UnexpectedEndOfData);
            }
            dest.copy_from_slice(&self.buffer[..count]);
            self.read_offset = count;
            return Ok(());
        }

        // Too large for the buffer: drain what is buffered, then read directly.
        let unread = self.read_len - self.read_offset;
        dest[..unread].copy_from_slice(&self.buffer[self.read_offset..self.read_len]);
        self.read_offset = 0;
        self.read_len = 0;

        self.inner.read_exact(&mut dest[unread..])?;
        self.stream_pos += (count - unread) as u64;

        Ok(())
    }

    /// Read exactly `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, AbrError> {
        if count as u64 > self.remaining() {
            return Err(AbrError::UnexpectedEndOfData);
        }
        let mut bytes = vec![0u8; count];
        self.read_exact_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a fixed-length ASCII string, dropping trailing NULs.
    pub fn read_ascii_string(&mut self, length: usize) -> Result<String, AbrError> {
        if length == 0 {
            return Ok(String::new());
        }

        let bytes = self.read_bytes(length)?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);

        Ok(bytes[..end]
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect())
    }

    /// Read a string prefixed by a single length byte.
    pub fn read_pascal_string(&mut self) -> Result<String, AbrError> {
        let length = self.read_u8()?;
        self.read_ascii_string(length as usize)
    }

    /// Read a UTF-16BE string prefixed by an i32 character count.
    pub fn read_unicode_string(&mut self) -> Result<String, AbrError> {
        let length = self.read_i32()?;
        if length < 0 {
            return Err(AbrError::InvalidArgument(format!(
                "negative string length {}",
                length
            )));
        }
        if length == 0 {
            return Ok(String::new());
        }

        let byte_len = (length as usize)
            .checked_mul(2)
            .ok_or(AbrError::ArithmeticOverflow)?;
        let bytes = self.read_bytes(byte_len)?;

        let mut units: Vec<u16> = bytes.chunks_exact(2).map(BigEndian::read_u16).collect();
        while units.last() == Some(&0) {
            units.pop();
        }

        String::from_utf16(&units).map_err(|e| AbrError::StringDecode(e.to_string()))
    }

    /// Read four i32 edges ordered top, left, bottom, right.
    pub fn read_rectangle(&mut self) -> Result<Rect, AbrError> {
        let top = self.read_i32()?;
        let left = self.read_i32()?;
        let bottom = self.read_i32()?;
        let right = self.read_i32()?;

        Ok(Rect::from_edges(top, left, bottom, right))
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], AbrError> {
        if self.read_offset + N > self.read_len && !self.fill_buffer(N)? {
            return Err(AbrError::UnexpectedEndOfData);
        }

        let mut out = [0u8; N];
        out.copy_from_slice(&self.buffer[self.read_offset..self.read_offset + N]);
        self.read_offset += N;
        Ok(out)
    }

    /// Move unread bytes to the front and top the buffer up from the source.
    /// Returns `false` if the source ends before `min_bytes` are available.
    fn fill_buffer(&mut self, min_bytes: usize) -> Result<bool, AbrError> {
        let unread = self.read_len - self.read_offset;
        if unread > 0 {
            self.buffer.copy_within(self.read_offset..self.read_len, 0);
        }
        self.read_offset = 0;
        self.read_len = unread;

        while self.read_len < min_bytes {
            let n = match self.inner.read(&mut self.buffer[self.read_len..]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(false);
            }
            self.read_len += n;
            self.stream_pos += n as u64;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    /// Counts calls to `read` so buffering can be observed.
    struct CountingSource {
        inner: Cursor<Vec<u8>>,
        reads: usize,
    }

    impl Read for CountingSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            self.inner.read(buf)
        }
    }

    impl std::io::Seek for CountingSource {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn reader(data: Vec<u8>) -> BigEndianReader<Cursor<Vec<u8>>> {
        BigEndianReader::new(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_buffer_size_is_capped_by_length() {
        assert_eq!(reader(vec![0; 10]).buffer_size(), 10);
        assert_eq!(reader(vec![0; 10_000]).buffer_size(), MAX_BUFFER_SIZE);
    }

    #[test]
    fn test_big_endian_primitives() {
        let mut r = reader(vec![
            0x12, 0x34, // u16
            0xFF, 0xFE, // i16 = -2
            0xDE, 0xAD, 0xBE, 0xEF, // u32
            0x3F, 0x80, 0x00, 0x00, // f32 = 1.0
            0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18, // f64 = pi
            0x80, 0, 0, 0, 0, 0, 0, 1, // i64
        ]);

        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_f32().unwrap(), 1.0);
        assert_eq!(r.read_f64().unwrap(), std::f64::consts::PI);
        assert_eq!(r.read_i64().unwrap(), i64::MIN + 1);
        assert_eq!(r.position(), 28);
        assert!(matches!(r.read_u8(), Err(AbrError::UnexpectedEndOfData)));
    }

    #[test]
    fn test_read_straddling_buffer_boundary() {
        let data = patterned(10_000);
        let mut r = reader(data.clone());

        // Fill the window with offsets 0..4096, then read across its end.
        assert_eq!(r.read_u8().unwrap(), data[0]);
        r.set_position(4090).unwrap();
        let span = r.read_bytes(20).unwrap();
        assert_eq!(span, &data[4090..4110]);
        assert_eq!(r.position(), 4110);

        r.set_position(0).unwrap();
        assert_eq!(r.read_u8().unwrap(), data[0]);
        r.set_position(4095).unwrap();
        let word = r.read_u32().unwrap();
        assert_eq!(word, BigEndian::read_u32(&data[4095..4099]));
    }

    #[test]
    fn test_large_read_bypasses_buffer() {
        let data = patterned(20_000);
        let mut r = reader(data.clone());

        assert_eq!(r.read_u8().unwrap(), data[0]);
        let big = r.read_bytes(9_000).unwrap();
        assert_eq!(big, &data[1..9_001]);
        assert_eq!(r.position(), 9_001);
        assert_eq!(r.read_u16().unwrap(), BigEndian::read_u16(&data[9_001..9_003]));
    }

    #[test]
    fn test_seek_within_window_does_not_touch_source() {
        let data = patterned(100);
        let mut r = BigEndianReader::new(CountingSource {
            inner: Cursor::new(data.clone()),
            reads: 0,
        })
        .unwrap();

        r.read_u32().unwrap();
        let reads_after_fill = r.get_ref().reads;

        r.set_position(50).unwrap();
        assert_eq!(r.read_u8().unwrap(), data[50]);
        r.set_position(0).unwrap();
        assert_eq!(r.read_u8().unwrap(), data[0]);

        assert_eq!(r.get_ref().reads, reads_after_fill);
    }

    #[test]
    fn test_seek_outside_window_refills() {
        let data = patterned(10_000);
        let mut r = reader(data.clone());

        r.read_u8().unwrap();
        r.set_position(9_000).unwrap();
        assert_eq!(r.position(), 9_000);
        assert_eq!(r.read_u8().unwrap(), data[9_000]);
        r.set_position(1).unwrap();
        assert_eq!(r.read_u8().unwrap(), data[1]);
    }

    #[test]
    fn test_read_bytes_past_end_fails() {
        let mut r = reader(vec![1, 2, 3]);
        assert!(matches!(
            r.read_bytes(4),
            Err(AbrError::UnexpectedEndOfData)
        ));
    }

    #[test]
    fn test_strings() {
        let mut data = vec![5, b'h', b'e', b'l', b'l', b'o'];
        data.extend_from_slice(b"ab\0\0");
        // "Hi" + terminator as UTF-16BE with a count of 3
        data.extend_from_slice(&[0, 0, 0, 3, 0, b'H', 0, b'i', 0, 0]);

        let mut r = reader(data);
        assert_eq!(r.read_pascal_string().unwrap(), "hello");
        assert_eq!(r.read_ascii_string(4).unwrap(), "ab");
        assert_eq!(r.read_unicode_string().unwrap(), "Hi");
    }

    #[test]
    fn test_negative_unicode_length_is_invalid() {
        let mut r = reader(vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            r.read_unicode_string(),
            Err(AbrError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_read_rectangle() {
        let mut data = Vec::new();
        for v in [10i32, 20, 50, 120] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let rect = reader(data).read_rectangle().unwrap();
        assert_eq!((rect.y, rect.x), (10, 20));
        assert_eq!((rect.height, rect.width), (40, 100));
    }
}
