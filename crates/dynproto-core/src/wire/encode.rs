//! Wire value writers and their size functions.
//!
//! Every writer has a matching `*_len` function so callers can size the output
//! buffer exactly before the single write pass.

use super::WireType;
use bytes::BufMut;

/// Writes `value` as a base-128 varint (1 to 10 bytes).
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`
#[inline]
pub fn encoded_len_varint(value: u64) -> usize {
    // Each byte carries 7 bits; `| 1` makes zero occupy one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Writes a tag for `number` and `wire_type`
#[inline]
pub fn encode_tag(number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint(u64::from((number << 3) | wire_type as u32), buf);
}

/// Encoded length of a tag carrying `number`
#[inline]
pub fn tag_len(number: u32) -> usize {
    encoded_len_varint(u64::from(number << 3))
}

/// Writes the little-endian bytes of a 32-bit value
#[inline]
pub fn encode_fixed32(value: u32, buf: &mut impl BufMut) {
    buf.put_u32_le(value);
}

/// Writes the little-endian bytes of a 64-bit value
#[inline]
pub fn encode_fixed64(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_le(value);
}

/// Writes `varint(len) || payload`
#[inline]
pub fn encode_length_delimited(payload: &[u8], buf: &mut impl BufMut) {
    encode_varint(payload.len() as u64, buf);
    buf.put_slice(payload);
}

/// Encoded length of a length-delimited value whose payload is `len` bytes
#[inline]
pub fn length_delimited_len(len: usize) -> usize {
    encoded_len_varint(len as u64) + len
}
