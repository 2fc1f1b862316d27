//! Protobuf wire format codec.
//!
//! This module knows nothing about descriptors. It encodes and decodes the
//! primitive wire values every field is made of.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated groups, still accepted)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Writers take any [`bytes::BufMut`]; the reader borrows a byte slice and
//! never allocates.

mod decode;
mod encode;

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use bytes::BufMut;

pub use decode::WireReader;
pub use encode::{
    encode_fixed32, encode_fixed64, encode_length_delimited, encode_tag, encode_varint,
    encoded_len_varint, length_delimited_len, tag_len,
};

/// Maximum encoded length of a varint
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    /// Decodes the low three bits of a tag
    pub fn from_bits(value: u8, offset: usize) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_type(offset, value)),
        }
    }
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        WireType::from_bits(value, 0)
    }
}

/// A field number paired with a wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Field number, in `1..=MAX_FIELD_NUMBER`
    pub number: u32,
    /// Wire type of the value that follows
    pub wire_type: WireType,
}

impl Tag {
    /// Creates a new tag
    pub fn new(number: u32, wire_type: WireType) -> Self {
        debug_assert!((1..=MAX_FIELD_NUMBER).contains(&number));
        Self { number, wire_type }
    }

    /// Splits a raw tag varint, validating both halves
    pub fn from_raw(raw: u64, offset: usize) -> Result<Self> {
        let wire_type = WireType::from_bits((raw & 0x07) as u8, offset)?;
        let number = raw >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(Error::invalid_field_number(offset, number));
        }
        Ok(Self {
            number: number as u32,
            wire_type,
        })
    }

    /// The raw varint value `(number << 3) | wire_type`
    pub fn to_raw(self) -> u32 {
        (self.number << 3) | self.wire_type as u32
    }

    /// Writes the tag as a varint
    pub fn encode(self, buf: &mut impl BufMut) {
        encode_varint(u64::from(self.to_raw()), buf);
    }

    /// Encoded length of the tag in bytes
    pub fn encoded_len(self) -> usize {
        tag_len(self.number)
    }
}

/// Maps a signed 32-bit integer onto an unsigned one so small magnitudes stay small
#[inline]
pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`]
#[inline]
pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Maps a signed 64-bit integer onto an unsigned one so small magnitudes stay small
#[inline]
pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`]
#[inline]
pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::I64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::Len);
        assert_eq!(WireType::try_from(3).unwrap(), WireType::StartGroup);
        assert_eq!(WireType::try_from(4).unwrap(), WireType::EndGroup);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::I32);
        assert!(matches!(
            WireType::try_from(6),
            Err(Error::InvalidWireType { value: 6, .. })
        ));
        assert!(WireType::try_from(7).is_err());
    }

    #[test]
    fn test_zigzag_mapping() {
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode32(-2), 3);
        assert_eq!(zigzag_encode32(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag_encode32(i32::MIN), u32::MAX);

        assert_eq!(zigzag_encode64(0), 0);
        assert_eq!(zigzag_encode64(-1), 1);
        assert_eq!(zigzag_encode64(1), 2);
        assert_eq!(zigzag_encode64(-2), 3);
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
    }

    #[test]
    fn test_zigzag_inverse() {
        for v in [0, 1, -1, 2, -2, 63, -64, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode32(zigzag_encode32(v)), v);
        }
        for v in [0, 1, -1, i64::from(i32::MIN) - 1, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode64(zigzag_encode64(v)), v);
        }
    }

    #[test]
    fn test_tag_split() {
        let tag = Tag::from_raw(0x0A, 0).unwrap();
        assert_eq!(tag.number, 1);
        assert_eq!(tag.wire_type, WireType::Len);
        assert_eq!(tag.to_raw(), 0x0A);

        let max = Tag::from_raw((u64::from(MAX_FIELD_NUMBER) << 3) | 5, 0).unwrap();
        assert_eq!(max.number, MAX_FIELD_NUMBER);
        assert_eq!(max.encoded_len(), 5);
    }

    #[test]
    fn test_tag_rejects_bad_numbers() {
        assert!(matches!(
            Tag::from_raw(0x00, 3),
            Err(Error::InvalidFieldNumber { offset: 3, number: 0 })
        ));
        let too_big = (u64::from(MAX_FIELD_NUMBER) + 1) << 3;
        assert!(matches!(
            Tag::from_raw(too_big, 0),
            Err(Error::InvalidFieldNumber { .. })
        ));
        assert!(matches!(
            Tag::from_raw((1 << 3) | 7, 0),
            Err(Error::InvalidWireType { value: 7, .. })
        ));
    }
}
