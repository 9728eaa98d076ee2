//! Record header and varint codec.
//!
//! | Shape | Bytes |
//! |---|---|
//! | square, side < 254 | `side` |
//! | square, side >= 254 | `255`, varint(side) |
//! | not square | `254`, varint(width), varint(height) |
//!
//! Varints are little-endian base-128: seven value bits per byte, high bit
//! set on every byte but the last.

use super::StoreError;

const NON_SQUARE: u8 = 254;
const LARGE_SQUARE: u8 = 255;

/// Append `value` as a LEB128 varint.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Read a varint from the start of `bytes`. Returns the value and the number
/// of bytes consumed.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize), StoreError> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift >= 64 || (shift == 63 && byte > 1) {
            return Err(StoreError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(StoreError::Truncated("varint"))
}

fn read_varint_u32(bytes: &[u8]) -> Result<(u32, usize), StoreError> {
    let (value, len) = read_varint(bytes)?;
    let value = u32::try_from(value).map_err(|_| StoreError::VarintOverflow)?;
    Ok((value, len))
}

/// Append the header for a `width` × `height` bitmap.
pub fn write_header(out: &mut Vec<u8>, width: u32, height: u32) {
    if width == height {
        if width < u32::from(NON_SQUARE) {
            out.push(width as u8);
        } else {
            out.push(LARGE_SQUARE);
            write_varint(out, u64::from(width));
        }
    } else {
        out.push(NON_SQUARE);
        write_varint(out, u64::from(width));
        write_varint(out, u64::from(height));
    }
}

/// Decode a header. Returns `(width, height)` and the header length.
pub fn read_header(bytes: &[u8]) -> Result<((u32, u32), usize), StoreError> {
    let (&tag, rest) = bytes
        .split_first()
        .ok_or(StoreError::Truncated("header"))?;
    match tag {
        LARGE_SQUARE => {
            let (side, len) = read_varint_u32(rest)?;
            Ok(((side, side), 1 + len))
        }
        NON_SQUARE => {
            let (width, w_len) = read_varint_u32(rest)?;
            let (height, h_len) = read_varint_u32(&rest[w_len..])?;
            Ok(((width, height), 1 + w_len + h_len))
        }
        side => Ok(((u32::from(side), u32::from(side)), 1)),
    }
}
