//! LEB128 varint codec used by the invalid-jumpdest table.
//!
//! Each output byte carries 7 value bits, least significant group first. The
//! high bit is set on every byte except the last.

use crate::{error::Result, ChunkError};

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded.
pub const fn encoded_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    (bits + 6) / 7
}

/// Append the encoding of `value` to `out`, returning the number of bytes written.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) -> usize {
    let start = out.len();
    loop {
        let part = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(part);
            break;
        }
        out.push(part | 0x80);
    }
    out.len() - start
}

/// Encode `value` into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    write_varint(&mut out, value);
    out
}

/// Decode one varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        let part = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        // The tenth byte may only contribute the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && part > 1 {
            return Err(ChunkError::MalformedVarint { offset: i });
        }
        value |= part << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    let offset = buf.len().min(MAX_VARINT_LEN).saturating_sub(1);
    Err(ChunkError::MalformedVarint { offset })
}
