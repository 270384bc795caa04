//! Big-endian writer
//!
//! Unbuffered: every call goes straight to the sink, which keeps stream
//! positions exact for backpatching. Wrap the sink in a `BufWriter` if the
//! sink itself is slow.

use std::io::SeekFrom;
use std::ops::{Deref, DerefMut};

use byteorder::{BigEndian, WriteBytesExt};

use super::source::ByteSink;
use crate::abr::error::AbrError;
use crate::abr::types::Rect;

/// Placeholder written before a length field is patched.
const LENGTH_PLACEHOLDER: u32 = 0xFEED_FEED;

/// Endian-correct writer over a seekable sink.
pub struct BigEndianWriter<W> {
    inner: W,
}

impl<W: ByteSink> BigEndianWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Current byte offset in the sink.
    pub fn position(&mut self) -> Result<u64, AbrError> {
        Ok(self.inner.stream_position()?)
    }

    pub fn set_position(&mut self, position: u64) -> Result<(), AbrError> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), AbrError> {
        Ok(self.inner.write_u8(value)?)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), AbrError> {
        Ok(self.inner.write_i16::<BigEndian>(value)?)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), AbrError> {
        Ok(self.inner.write_u16::<BigEndian>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), AbrError> {
        Ok(self.inner.write_i32::<BigEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), AbrError> {
        Ok(self.inner.write_u32::<BigEndian>(value)?)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), AbrError> {
        Ok(self.inner.write_i64::<BigEndian>(value)?)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), AbrError> {
        Ok(self.inner.write_u64::<BigEndian>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), AbrError> {
        Ok(self.inner.write_f32::<BigEndian>(value)?)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), AbrError> {
        Ok(self.inner.write_f64::<BigEndian>(value)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), AbrError> {
        Ok(self.inner.write_all(bytes)?)
    }

    /// Write top, left, bottom, right as i16. Fails if an edge does not fit.
    pub fn write_rectangle16(&mut self, rect: &Rect) -> Result<(), AbrError> {
        for edge in [rect.top(), rect.left(), rect.bottom(), rect.right()] {
            let edge = i16::try_from(edge).map_err(|_| {
                AbrError::UnsupportedDocumentSize(format!("edge {} exceeds i16 range", edge))
            })?;
            self.write_i16(edge)?;
        }
        Ok(())
    }

    /// Write top, left, bottom, right as i32.
    pub fn write_rectangle32(&mut self, rect: &Rect) -> Result<(), AbrError> {
        self.write_i32(rect.top())?;
        self.write_i32(rect.left())?;
        self.write_i32(rect.bottom())?;
        self.write_i32(rect.right())
    }

    /// Write `count + 1` as i32, the UTF-16BE code units, then a NUL unit.
    pub fn write_unicode_string(&mut self, value: &str) -> Result<(), AbrError> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let count = i32::try_from(units.len() + 1).map_err(|_| AbrError::ArithmeticOverflow)?;

        self.write_i32(count)?;
        for unit in units {
            self.write_u16(unit)?;
        }
        self.write_u16(0)
    }

    /// Write a u32 length placeholder; the returned guard patches it with
    /// the number of bytes written after it once the guard is finished or
    /// dropped.
    pub fn length_scope(&mut self) -> Result<LengthScope<'_, W>, AbrError> {
        let length_offset = self.position()?;
        self.write_u32(LENGTH_PLACEHOLDER)?;
        let start = self.position()?;

        Ok(LengthScope {
            writer: self,
            length_offset,
            start,
            finished: false,
        })
    }

    pub fn flush(&mut self) -> Result<(), AbrError> {
        Ok(self.inner.flush()?)
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Backpatched u32 length field.
///
/// Dereferences to the writer so the scoped content is written through it.
/// Prefer [`LengthScope::finish`] to observe patch errors; on any other exit
/// path (early return, `?`, unwinding) `Drop` patches the field.
pub struct LengthScope<'a, W: ByteSink> {
    writer: &'a mut BigEndianWriter<W>,
    length_offset: u64,
    start: u64,
    finished: bool,
}

impl<W: ByteSink> LengthScope<'_, W> {
    /// Patch the length field and return the length written.
    pub fn finish(mut self) -> Result<u32, AbrError> {
        self.finished = true;
        self.patch()
    }

    fn patch(&mut self) -> Result<u32, AbrError> {
        let end = self.writer.position()?;
        let length = end
            .checked_sub(self.start)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or(AbrError::ArithmeticOverflow)?;

        self.writer.set_position(self.length_offset)?;
        self.writer.write_u32(length)?;
        self.writer.set_position(end)?;

        Ok(length)
    }
}

impl<W: ByteSink> Deref for LengthScope<'_, W> {
    type Target = BigEndianWriter<W>;

    fn deref(&self) -> &Self::Target {
        &*self.writer
    }
}

impl<W: ByteSink> DerefMut for LengthScope<'_, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.writer
    }
}

impl<W: ByteSink> Drop for LengthScope<'_, W> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.patch() {
            tracing::warn!("Failed to patch length field at {}: {}", self.length_offset, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn writer() -> BigEndianWriter<Cursor<Vec<u8>>> {
        BigEndianWriter::new(Cursor::new(Vec::new()))
    }

    #[test]
    fn test_primitives_are_big_endian() {
        let mut w = writer();
        w.write_i16(-2).unwrap();
        w.write_u32(0xDEAD_BEEF).unwrap();
        w.write_f32(1.0).unwrap();
        w.write_u64(1).unwrap();

        assert_eq!(
            w.into_inner().into_inner(),
            vec![
                0xFF, 0xFE, 0xDE, 0xAD, 0xBE, 0xEF, 0x3F, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1
            ]
        );
    }

    #[test]
    fn test_unicode_string_is_null_terminated() {
        let mut w = writer();
        w.write_unicode_string("Hi").unwrap();
        assert_eq!(
            w.into_inner().into_inner(),
            vec![0, 0, 0, 3, 0, b'H', 0, b'i', 0, 0]
        );
    }

    #[test]
    fn test_rectangles() {
        let rect = Rect::new(2, 1, 4, 3);
        let mut w = writer();
        w.write_rectangle16(&rect).unwrap();
        w.write_rectangle32(&rect).unwrap();

        let bytes = w.into_inner().into_inner();
        assert_eq!(&bytes[..8], &[0, 1, 0, 2, 0, 4, 0, 6]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn test_rectangle16_rejects_wide_edges() {
        let rect = Rect::new(0, 0, 40_000, 1);
        assert!(matches!(
            writer().write_rectangle16(&rect),
            Err(AbrError::UnsupportedDocumentSize(_))
        ));
    }

    #[test]
    fn test_length_scope_finish() {
        let mut w = writer();
        w.write_u8(0xAA).unwrap();
        {
            let mut scope = w.length_scope().unwrap();
            scope.write_bytes(&[1, 2, 3, 4, 5]).unwrap();
            assert_eq!(scope.finish().unwrap(), 5);
        }
        w.write_u8(0xBB).unwrap();

        assert_eq!(
            w.into_inner().into_inner(),
            vec![0xAA, 0, 0, 0, 5, 1, 2, 3, 4, 5, 0xBB]
        );
    }

    #[test]
    fn test_length_scope_patches_on_early_exit() {
        fn write_then_fail(w: &mut BigEndianWriter<Cursor<Vec<u8>>>) -> Result<(), AbrError> {
            let mut scope = w.length_scope()?;
            scope.write_bytes(&[9, 9, 9])?;
            Err(AbrError::ArithmeticOverflow)
        }

        let mut w = writer();
        assert!(write_then_fail(&mut w).is_err());
        assert_eq!(w.position().unwrap(), 7);
        assert_eq!(w.into_inner().into_inner(), vec![0, 0, 0, 3, 9, 9, 9]);
    }

    #[test]
    fn test_sequential_scopes() {
        let mut w = writer();
        for payload in [&[1u8][..], &[2, 3][..]] {
            let mut scope = w.length_scope().unwrap();
            scope.write_bytes(payload).unwrap();
            scope.finish().unwrap();
        }
        assert_eq!(
            w.into_inner().into_inner(),
            vec![0, 0, 0, 1, 1, 0, 0, 0, 2, 2, 3]
        );
    }
}
