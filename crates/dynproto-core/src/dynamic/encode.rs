//! Size computation and serialization.
//!
//! Sizes are computed first (and cached per message) so that the write pass
//! can reserve the output once and emit length prefixes without backtracking.

use super::{DynamicMessage, Value};
use crate::descriptor::{FieldDescriptor, KindIndex};
use crate::wire::{
    encode_fixed32, encode_fixed64, encode_length_delimited, encode_tag, encode_varint,
    encoded_len_varint, length_delimited_len, tag_len, zigzag_encode32, zigzag_encode64,
    WireType,
};
use bytes::BufMut;

impl DynamicMessage {
    /// Serialized size in bytes.
    ///
    /// The result is cached until the next mutation.
    pub fn encoded_len(&self) -> usize {
        if let Some(len) = self.cached_len() {
            return len;
        }
        let len = self
            .fields
            .values()
            .map(|entry| field_len(&entry.field, &entry.value))
            .sum::<usize>()
            + self.unknown.encoded_len();
        self.set_cached_len(len);
        len
    }

    /// Writes the message: set fields by ascending number, then unknown fields.
    ///
    /// # Panics
    ///
    /// Panics if `buf` cannot hold [`encoded_len`](Self::encoded_len) bytes.
    pub fn encode(&self, buf: &mut impl BufMut) {
        for entry in self.fields.values() {
            encode_field(&entry.field, &entry.value, buf);
        }
        self.unknown.encode(buf);
    }

    /// Serializes the message into a new, exactly-sized vector
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Serializes the message behind a varint length prefix
    pub fn encode_length_delimited_to_vec(&self) -> Vec<u8> {
        let len = self.encoded_len();
        let mut buf = Vec::with_capacity(length_delimited_len(len));
        encode_varint(len as u64, &mut buf);
        self.encode(&mut buf);
        buf
    }
}

fn field_len(field: &FieldDescriptor, value: &Value) -> usize {
    let kind = field.kind_index();
    match value {
        Value::List(values) if field.is_packed() => {
            if values.is_empty() {
                return 0;
            }
            let payload: usize = values.iter().map(|v| value_len(kind, v)).sum();
            tag_len(field.number()) + length_delimited_len(payload)
        }
        Value::List(values) => values
            .iter()
            .map(|v| single_len(field, kind, v))
            .sum(),
        value => single_len(field, kind, value),
    }
}

fn single_len(field: &FieldDescriptor, kind: KindIndex, value: &Value) -> usize {
    match value {
        Value::Message(message) if field.is_group() => {
            2 * tag_len(field.number()) + message.encoded_len()
        }
        value => tag_len(field.number()) + value_len(kind, value),
    }
}

/// Encoded size of a value without its tag
fn value_len(kind: KindIndex, value: &Value) -> usize {
    match value {
        Value::Bool(_) => 1,
        Value::I32(v) => match kind {
            KindIndex::Sint32 => encoded_len_varint(u64::from(zigzag_encode32(*v))),
            KindIndex::Sfixed32 => 4,
            // Negative int32 values are sign-extended to ten bytes.
            _ => encoded_len_varint(i64::from(*v) as u64),
        },
        Value::I64(v) => match kind {
            KindIndex::Sint64 => encoded_len_varint(zigzag_encode64(*v)),
            KindIndex::Sfixed64 => 8,
            _ => encoded_len_varint(*v as u64),
        },
        Value::U32(v) => match kind {
            KindIndex::Fixed32 => 4,
            _ => encoded_len_varint(u64::from(*v)),
        },
        Value::U64(v) => match kind {
            KindIndex::Fixed64 => 8,
            _ => encoded_len_varint(*v),
        },
        Value::F32(_) => 4,
        Value::F64(_) => 8,
        Value::EnumNumber(v) => encoded_len_varint(i64::from(*v) as u64),
        Value::String(v) => length_delimited_len(v.len()),
        Value::Bytes(v) => length_delimited_len(v.len()),
        Value::Message(message) => length_delimited_len(message.encoded_len()),
        // Lists never nest; validation rejects them as elements.
        Value::List(_) => 0,
    }
}

fn wire_type(kind: KindIndex) -> WireType {
    match kind {
        KindIndex::Double | KindIndex::Fixed64 | KindIndex::Sfixed64 => WireType::I64,
        KindIndex::Float | KindIndex::Fixed32 | KindIndex::Sfixed32 => WireType::I32,
        KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) | KindIndex::Pending => {
            WireType::Len
        }
        _ => WireType::Varint,
    }
}

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut impl BufMut) {
    let kind = field.kind_index();
    match value {
        Value::List(values) if field.is_packed() => {
            if values.is_empty() {
                return;
            }
            let payload: usize = values.iter().map(|v| value_len(kind, v)).sum();
            encode_tag(field.number(), WireType::Len, buf);
            encode_varint(payload as u64, buf);
            for v in values {
                encode_value(kind, v, buf);
            }
        }
        Value::List(values) => {
            for v in values {
                encode_single(field, kind, v, buf);
            }
        }
        value => encode_single(field, kind, value, buf),
    }
}

fn encode_single(field: &FieldDescriptor, kind: KindIndex, value: &Value, buf: &mut impl BufMut) {
    let number = field.number();
    match value {
        Value::Message(message) if field.is_group() => {
            encode_tag(number, WireType::StartGroup, buf);
            message.encode(buf);
            encode_tag(number, WireType::EndGroup, buf);
        }
        value => {
            encode_tag(number, wire_type(kind), buf);
            encode_value(kind, value, buf);
        }
    }
}

/// Writes a value without its tag
fn encode_value(kind: KindIndex, value: &Value, buf: &mut impl BufMut) {
    match value {
        Value::Bool(v) => encode_varint(u64::from(*v), buf),
        Value::I32(v) => match kind {
            KindIndex::Sint32 => encode_varint(u64::from(zigzag_encode32(*v)), buf),
            KindIndex::Sfixed32 => encode_fixed32(*v as u32, buf),
            _ => encode_varint(i64::from(*v) as u64, buf),
        },
        Value::I64(v) => match kind {
            KindIndex::Sint64 => encode_varint(zigzag_encode64(*v), buf),
            KindIndex::Sfixed64 => encode_fixed64(*v as u64, buf),
            _ => encode_varint(*v as u64, buf),
        },
        Value::U32(v) => match kind {
            KindIndex::Fixed32 => encode_fixed32(*v, buf),
            _ => encode_varint(u64::from(*v), buf),
        },
        Value::U64(v) => match kind {
            KindIndex::Fixed64 => encode_fixed64(*v, buf),
            _ => encode_varint(*v, buf),
        },
        Value::F32(v) => encode_fixed32(v.to_bits(), buf),
        Value::F64(v) => encode_fixed64(v.to_bits(), buf),
        Value::EnumNumber(v) => encode_varint(i64::from(*v) as u64, buf),
        Value::String(v) => encode_length_delimited(v.as_bytes(), buf),
        Value::Bytes(v) => encode_length_delimited(v, buf),
        Value::Message(message) => {
            encode_varint(message.encoded_len() as u64, buf);
            message.encode(buf);
        }
        Value::List(_) => {}
    }
}
