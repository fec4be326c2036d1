//! Unsigned LEB128 varints, as used by CAR section prefixes.

use crate::error::{CodecError, CodecResult};

/// Longest encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Reads a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`CodecError::InvalidVarint`] if the input ends mid-varint or the
/// value does not fit in 64 bits.
pub fn read_uvarint(data: &[u8]) -> CodecResult<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate().take(MAX_VARINT_LEN) {
        let low = u64::from(byte & 0x7f);
        if i == MAX_VARINT_LEN - 1 && low > 1 {
            return Err(CodecError::InvalidVarint);
        }
        value |= low << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CodecError::InvalidVarint)
}

/// Appends the varint encoding of `value` to `out`.
#[allow(clippy::cast_possible_truncation)]
pub fn write_uvarint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
