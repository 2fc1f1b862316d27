use crate::wire::{Tag, WireType};
use bytes::{BufMut, Bytes};
use std::slice;

/// Wire data for one field the message descriptor does not know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    number: u32,
    wire_type: WireType,
    /// Tag and value, exactly as read
    raw: Bytes,
    value_offset: usize,
}

impl UnknownField {
    pub(crate) fn new(tag: Tag, raw: Bytes, value_offset: usize) -> Self {
        Self {
            number: tag.number,
            wire_type: tag.wire_type,
            raw,
            value_offset,
        }
    }

    /// Field number from the tag
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Wire type from the tag
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// The tag and value bytes, verbatim
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The value bytes following the tag (including any length prefix)
    pub fn value(&self) -> &[u8] {
        &self.raw[self.value_offset..]
    }
}

/// Unknown fields of a message, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFieldSet {
    fields: Vec<UnknownField>,
}

impl UnknownFieldSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of preserved fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing was preserved
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Preserved fields, in arrival order
    pub fn iter(&self) -> slice::Iter<'_, UnknownField> {
        self.fields.iter()
    }

    pub(crate) fn push(&mut self, field: UnknownField) {
        self.fields.push(field);
    }

    pub(crate) fn extend_from(&mut self, other: &UnknownFieldSet) {
        self.fields.extend(other.fields.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }

    /// Serialized size of every preserved field
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|field| field.raw.len()).sum()
    }

    /// Writes every preserved field back out, byte for byte
    pub fn encode(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            buf.put_slice(&field.raw);
        }
    }
}

impl<'a> IntoIterator for &'a UnknownFieldSet {
    type Item = &'a UnknownField;
    type IntoIter = slice::Iter<'a, UnknownField>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_split() {
        let raw = Bytes::from_static(&[0x1A, 0x02, b'h', b'i']);
        let field = UnknownField::new(Tag::new(3, WireType::Len), raw.clone(), 1);
        assert_eq!(field.number(), 3);
        assert_eq!(field.wire_type(), WireType::Len);
        assert_eq!(field.value(), [0x02, b'h', b'i']);

        let mut set = UnknownFieldSet::new();
        set.push(field);
        assert_eq!(set.encoded_len(), 4);
        let mut out = Vec::new();
        set.encode(&mut out);
        assert_eq!(out, raw);
    }
}
