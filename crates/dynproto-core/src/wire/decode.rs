//! Borrowing, allocation-free wire reader.

use super::{Tag, WireType, MAX_VARINT_LEN};
use crate::error::{Error, Result};
use std::ops::Range;

/// Cursor over a protobuf byte stream.
///
/// Offsets reported in errors and returned by [`WireReader::position`] are
/// absolute within the slice the reader was created from, including for
/// sub-readers produced by [`WireReader::limited`].
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    recursion_limit: u32,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over the whole slice
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
            recursion_limit: crate::DecodeConfig::DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Sets how deeply groups and nested messages may nest
    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// The nesting limit this reader enforces
    pub fn recursion_limit(&self) -> u32 {
        self.recursion_limit
    }

    /// Fails once `depth` exceeds the recursion limit
    pub fn check_depth(&self, depth: u32) -> Result<()> {
        if depth > self.recursion_limit {
            return Err(Error::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        Ok(())
    }

    /// Absolute offset of the next byte to be read
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the reader's limit
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// True once every byte up to the limit has been consumed
    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    /// Splits off a reader over the next `len` bytes and advances past them
    pub fn limited(&mut self, len: usize) -> Result<WireReader<'a>> {
        let start = self.pos;
        self.take(len)?;
        Ok(WireReader {
            data: self.data,
            pos: start,
            end: start + len,
            recursion_limit: self.recursion_limit,
        })
    }

    fn take(&mut self, len: usize) -> Result<Range<usize>> {
        if len > self.remaining() {
            return Err(Error::truncated(self.pos, len, self.remaining()));
        }
        let range = self.pos..self.pos + len;
        self.pos += len;
        Ok(range)
    }

    /// Reads a base-128 varint.
    ///
    /// Fails with `MalformedVarint` when no terminating byte appears within
    /// ten bytes, or when the tenth byte carries bits beyond 64.
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut result: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.data[..self.end].get(start + i) else {
                return Err(Error::truncated(start, i + 1, self.end - start));
            };

            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                return Err(Error::malformed_varint(start));
            }

            result |= u64::from(byte & 0x7F) << (7 * i);

            if byte & 0x80 == 0 {
                self.pos = start + i + 1;
                return Ok(result);
            }
        }

        Err(Error::malformed_varint(start))
    }

    /// Reads four little-endian bytes
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let range = self.take(4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[range]);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads eight little-endian bytes
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let range = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[range]);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads a length prefix and returns the absolute range of the payload
    pub fn read_length_delimited_range(&mut self) -> Result<Range<usize>> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::truncated(self.pos, usize::MAX, self.remaining()))?;
        self.take(len)
    }

    /// Reads a length prefix and returns the payload
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let range = self.read_length_delimited_range()?;
        Ok(&self.data[range])
    }

    /// Reads the next tag, or `None` at the end of the input
    pub fn read_tag(&mut self) -> Result<Option<Tag>> {
        if self.is_empty() {
            return Ok(None);
        }
        let offset = self.pos;
        let raw = self.read_varint()?;
        Tag::from_raw(raw, offset).map(Some)
    }

    /// Skips the value following `tag`.
    ///
    /// Groups are skipped up to their matching end-group tag. `depth` is the
    /// nesting depth of the caller; each group adds one level.
    pub fn skip_value(&mut self, tag: Tag, depth: u32) -> Result<()> {
        match tag.wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::I64 => {
                self.take(8)?;
            }
            WireType::Len => {
                self.read_length_delimited_range()?;
            }
            WireType::I32 => {
                self.take(4)?;
            }
            WireType::StartGroup => self.skip_group(tag.number, depth + 1)?,
            WireType::EndGroup => {
                return Err(Error::UnexpectedEndGroup {
                    offset: self.pos,
                    number: tag.number,
                })
            }
        }
        Ok(())
    }

    fn skip_group(&mut self, number: u32, depth: u32) -> Result<()> {
        self.check_depth(depth)?;

        loop {
            let offset = self.pos;
            let Some(inner) = self.read_tag()? else {
                return Err(Error::truncated(offset, 1, 0));
            };
            if inner.wire_type == WireType::EndGroup {
                if inner.number != number {
                    return Err(Error::UnexpectedEndGroup {
                        offset,
                        number: inner.number,
                    });
                }
                return Ok(());
            }
            self.skip_value(inner, depth)?;
        }
    }

    /// The bytes between two absolute offsets
    pub fn slice(&self, range: Range<usize>) -> &'a [u8] {
        &self.data[range]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_varint_single_byte() {
        let data = [0x08];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_varint().unwrap(), 8);
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_read_varint_multi_byte() {
        let data = [0xAC, 0x02];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_varint_max() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_varint().unwrap(), u64::MAX);
    }

    #[test]
    fn test_read_varint_too_long() {
        let data = [0xFF; 11];
        let mut reader = WireReader::new(&data);
        assert!(matches!(
            reader.read_varint(),
            Err(Error::MalformedVarint { offset: 0 })
        ));

        let mut data = [0x80; 11];
        data[10] = 0x00;
        let mut reader = WireReader::new(&data);
        assert!(matches!(
            reader.read_varint(),
            Err(Error::MalformedVarint { .. })
        ));
    }

    #[test]
    fn test_read_varint_overflowing_tenth_byte() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        let mut reader = WireReader::new(&data);
        assert!(matches!(
            reader.read_varint(),
            Err(Error::MalformedVarint { .. })
        ));
    }

    #[test]
    fn test_read_varint_truncated() {
        let data = [0x80, 0x80];
        let mut reader = WireReader::new(&data);
        assert!(matches!(
            reader.read_varint(),
            Err(Error::TruncatedMessage { offset: 0, .. })
        ));
    }

    #[test]
    fn test_read_length_delimited() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o', 0x01];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_length_delimited().unwrap(), b"hello");
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_read_length_delimited_truncated() {
        let data = [0x05, b'h', b'i'];
        let mut reader = WireReader::new(&data);
        assert!(matches!(
            reader.read_length_delimited(),
            Err(Error::TruncatedMessage {
                needed: 5,
                remaining: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_read_tag() {
        let data = [0x08, 0x96, 0x01];
        let mut reader = WireReader::new(&data);
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(tag, Tag::new(1, WireType::Varint));
        assert_eq!(reader.read_varint().unwrap(), 150);
        assert!(reader.read_tag().unwrap().is_none());
    }

    #[test]
    fn test_read_tag_invalid() {
        let mut reader = WireReader::new(&[0x00]);
        assert!(matches!(
            reader.read_tag(),
            Err(Error::InvalidFieldNumber { number: 0, .. })
        ));

        let mut reader = WireReader::new(&[0x0E]);
        assert!(matches!(
            reader.read_tag(),
            Err(Error::InvalidWireType { value: 6, .. })
        ));
    }

    #[test]
    fn test_fixed_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_fixed32().unwrap(), 0x0403_0201);
        assert!(matches!(
            reader.read_fixed64(),
            Err(Error::TruncatedMessage { offset: 4, .. })
        ));
    }

    #[test]
    fn test_limited_keeps_absolute_offsets() {
        let data = [0xFF, 0x02, 0x08, 0x01, 0x10];
        let mut reader = WireReader::new(&data);
        reader.take(1).unwrap();
        let len = reader.read_varint().unwrap() as usize;
        let mut sub = reader.limited(len).unwrap();
        assert_eq!(sub.position(), 2);
        assert_eq!(sub.read_tag().unwrap(), Some(Tag::new(1, WireType::Varint)));
        assert_eq!(sub.read_varint().unwrap(), 1);
        assert!(sub.is_empty());
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_skip_values() {
        // varint, fixed64, len, fixed32, group{ varint }
        let data = [
            0x08, 0x96, 0x01, //
            0x11, 1, 2, 3, 4, 5, 6, 7, 8, //
            0x1A, 0x02, b'h', b'i', //
            0x25, 1, 2, 3, 4, //
            0x2B, 0x08, 0x01, 0x2C,
        ];
        let mut reader = WireReader::new(&data);
        while let Some(tag) = reader.read_tag().unwrap() {
            reader.skip_value(tag, 0).unwrap();
        }
        assert!(reader.is_empty());
    }

    #[test]
    fn test_skip_group_mismatched_end() {
        // start group 5, end group 6
        let data = [0x2B, 0x34];
        let mut reader = WireReader::new(&data);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(matches!(
            reader.skip_value(tag, 0),
            Err(Error::UnexpectedEndGroup { number: 6, .. })
        ));
    }

    #[test]
    fn test_skip_group_depth_limit() {
        let mut data = vec![0x0B; 4];
        data.extend([0x0C; 4]);
        let mut reader = WireReader::new(&data).with_recursion_limit(2);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(matches!(
            reader.skip_value(tag, 0),
            Err(Error::RecursionLimitExceeded { limit: 2 })
        ));

        let mut reader = WireReader::new(&data).with_recursion_limit(4);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(reader.skip_value(tag, 0).is_ok());
    }
}
