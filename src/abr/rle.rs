//! PackBits RLE compression/decompression
//!
//! Brush rows are compressed one scanline at a time.
//! Reference: Apple Technical Note TN1023
//!
//! Header byte rules:
//! - 0..=127: next N+1 bytes are literal
//! - 129..=255: next byte is repeated 257-N times (2..=128)
//! - 128: no operation

use std::convert::Infallible;
use std::io::{self, Write};

use super::error::AbrError;
use crate::io::{BigEndianReader, ByteSource};

const MAX_PACKET_LENGTH: usize = 128;

/// Packet being built while walking one row.
struct PacketState {
    repeat: bool,
    last: u8,
    start: usize,
    len: usize,
}

impl PacketState {
    fn begin(&mut self, index: usize, value: u8) {
        self.repeat = false;
        self.last = value;
        self.start = index;
        self.len = 1;
    }

    fn flush<E>(
        &mut self,
        row: &[u8],
        emit: &mut impl FnMut(u8, &[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        let len = std::mem::take(&mut self.len);
        if self.repeat {
            let header = (1 - len as i16) as u8;
            emit(header, std::slice::from_ref(&self.last))
        } else {
            emit((len - 1) as u8, &row[self.start..self.start + len])
        }
    }
}

/// Walk a row and emit `(header, payload)` packets.
fn encode_packets<E>(
    row: &[u8],
    mut emit: impl FnMut(u8, &[u8]) -> Result<(), E>,
) -> Result<(), E> {
    let mut state = PacketState {
        repeat: false,
        last: 0,
        start: 0,
        len: 0,
    };

    for (i, &value) in row.iter().enumerate() {
        if state.len == 0 {
            state.begin(i, value);
        } else if state.len == 1 {
            // Second byte decides the packet kind.
            state.repeat = value == state.last;
            state.last = value;
            state.len = 2;
        } else if state.len == MAX_PACKET_LENGTH {
            state.flush(row, &mut emit)?;
            state.begin(i, value);
        } else if state.repeat {
            if value == state.last {
                state.len += 1;
            } else {
                state.flush(row, &mut emit)?;
                state.begin(i, value);
            }
        } else if value != state.last {
            state.last = value;
            state.len += 1;
        } else {
            // A literal packet hit a repeat: emit it without its last byte
            // and open a two-byte repeat packet with that byte.
            state.len -= 1;
            state.flush(row, &mut emit)?;
            state.repeat = true;
            state.len = 2;
            state.last = value;
        }
    }

    if state.len > 0 {
        state.flush(row, &mut emit)?;
    }

    Ok(())
}

/// Encode a single row into `out` and return the number of bytes written.
pub fn encode_row<W: Write>(row: &[u8], out: &mut W) -> io::Result<usize> {
    let mut written = 0;
    encode_packets(row, |header, payload| {
        out.write_all(&[header])?;
        out.write_all(payload)?;
        written += 1 + payload.len();
        Ok::<(), io::Error>(())
    })?;
    Ok(written)
}

/// Encode a row into a new buffer.
pub fn packbits_encode(row: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(row.len() + row.len() / MAX_PACKET_LENGTH + 1);
    let result = encode_packets(row, |header, payload| {
        output.push(header);
        output.extend_from_slice(payload);
        Ok::<(), Infallible>(())
    });
    match result {
        Ok(()) => output,
        Err(never) => match never {},
    }
}

/// Decode packets from `reader` until `dest` is full.
///
/// Never writes past `dest`; a packet overrunning the row is consumed but
/// only its leading bytes are kept.
pub fn decode_row<R: ByteSource>(
    reader: &mut BigEndianReader<R>,
    dest: &mut [u8],
) -> Result<(), AbrError> {
    let mut count = 0;

    while count < dest.len() {
        let header = reader.read_u8()?;
        let remaining = dest.len() - count;

        if header < 128 {
            let len = header as usize + 1;
            let take = len.min(remaining);
            reader.read_exact_into(&mut dest[count..count + take])?;
            if take < len {
                reader.skip((len - take) as u64)?;
            }
            count += take;
        } else if header > 128 {
            let len = (header ^ 0xFF) as usize + 2;
            let value = reader.read_u8()?;
            let take = len.min(remaining);
            dest[count..count + take].fill(value);
            count += take;
        }
        // 128 is a no-op
    }

    Ok(())
}

/// Decode a complete buffer of packets into `expected_len` bytes.
pub fn packbits_decode(input: &[u8], expected_len: usize) -> Result<Vec<u8>, AbrError> {
    let mut reader = BigEndianReader::new(io::Cursor::new(input))?;
    let mut output = vec![0u8; expected_len];
    decode_row(&mut reader, &mut output)?;
    Ok(output)
}
