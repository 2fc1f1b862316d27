//! Descriptor-driven parsing.
//!
//! The input is copied once into a [`Bytes`] buffer; `bytes` field values and
//! preserved unknown fields are slices of that buffer rather than copies.

use super::{DecodeConfig, DynamicMessage, UnknownField, Value};
use crate::descriptor::{FieldDescriptor, Kind, KindIndex, MessageDescriptor};
use crate::error::{Error, Result};
use crate::wire::{
    encode_tag, encode_varint, zigzag_decode32, zigzag_decode64, Tag, WireReader, WireType,
};
use bytes::{Buf, Bytes};
use tracing::trace;

impl DynamicMessage {
    /// Parses a message of type `desc` with the default recursion limit
    pub fn decode(desc: MessageDescriptor, buf: impl Buf) -> Result<Self> {
        Self::decode_with_config(desc, buf, &DecodeConfig::default())
    }

    /// Parses a message of type `desc`.
    ///
    /// Fields the descriptor does not know, and known fields arriving with an
    /// unexpected wire type, are kept verbatim in the unknown-field set. Unset
    /// `required` fields fail with `MissingRequiredFields` unless the config
    /// allows partial messages.
    pub fn decode_with_config(
        desc: MessageDescriptor,
        mut buf: impl Buf,
        config: &DecodeConfig,
    ) -> Result<Self> {
        let mut message = DynamicMessage::new(desc);
        message.parse_into(&mut buf, config)?;
        Ok(message)
    }

    /// Parses `buf` and merges the result into this message
    pub fn merge_from(&mut self, buf: impl Buf) -> Result<()> {
        self.merge_from_with_config(buf, &DecodeConfig::default())
    }

    /// Parses `buf` and merges the result into this message.
    ///
    /// Fields are applied in wire order on top of the current values. On error
    /// the message is left unchanged.
    pub fn merge_from_with_config(&mut self, mut buf: impl Buf, config: &DecodeConfig) -> Result<()> {
        let mut staged = self.clone();
        staged.parse_into(&mut buf, config)?;
        *self = staged;
        Ok(())
    }

    fn parse_into(&mut self, buf: &mut impl Buf, config: &DecodeConfig) -> Result<()> {
        let bytes = buf.copy_to_bytes(buf.remaining());
        let mut reader = WireReader::new(&bytes).with_recursion_limit(config.recursion_limit);
        merge_fields(self, &bytes, &mut reader, 0, None)?;

        if !config.allow_partial {
            let missing = self.missing_required_fields();
            if !missing.is_empty() {
                return Err(Error::missing_required(self.desc.full_name(), missing));
            }
        }
        Ok(())
    }
}

/// Reads fields into `message` until the input ends, or until the end-group
/// tag matching `group` when parsing a group body.
fn merge_fields(
    message: &mut DynamicMessage,
    source: &Bytes,
    reader: &mut WireReader<'_>,
    depth: u32,
    group: Option<u32>,
) -> Result<()> {
    message.invalidate();
    loop {
        let start = reader.position();
        let Some(tag) = reader.read_tag()? else {
            return match group {
                Some(_) => Err(Error::truncated(start, 1, 0)),
                None => Ok(()),
            };
        };

        if tag.wire_type == WireType::EndGroup {
            return match group {
                Some(number) if number == tag.number => Ok(()),
                _ => Err(Error::UnexpectedEndGroup {
                    offset: start,
                    number: tag.number,
                }),
            };
        }

        let desc = message.descriptor();
        let field = desc
            .get_field(tag.number)
            .or_else(|| desc.get_extension(tag.number));

        match field {
            Some(field) if accepts(&field, tag.wire_type) => {
                merge_field(message, &field, tag, source, reader, depth, start)?;
            }
            _ => {
                let value_offset = reader.position() - start;
                reader.skip_value(tag, depth)?;
                trace!(
                    message = message.desc.full_name(),
                    number = tag.number,
                    wire_type = ?tag.wire_type,
                    "preserving unknown field"
                );
                let raw = source.slice(start..reader.position());
                message.unknown.push(UnknownField::new(tag, raw, value_offset));
            }
        }
    }
}

fn merge_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    tag: Tag,
    source: &Bytes,
    reader: &mut WireReader<'_>,
    depth: u32,
    start: usize,
) -> Result<()> {
    let kind = field.kind_index();
    match kind {
        KindIndex::Message(index) => {
            let desc = MessageDescriptor::new(field.parent_pool().clone(), index);
            let mut child = if field.is_list() {
                DynamicMessage::new(desc)
            } else {
                message.take_message(field, &desc)
            };
            reader.check_depth(depth + 1)?;
            if field.is_group() {
                merge_fields(&mut child, source, reader, depth + 1, Some(tag.number))?;
            } else {
                let len = read_len(reader)?;
                let mut body = reader.limited(len)?;
                merge_fields(&mut child, source, &mut body, depth + 1, None)?;
            }
            insert(message, field, Value::Message(child));
        }
        KindIndex::String => {
            let range = reader.read_length_delimited_range()?;
            let text = std::str::from_utf8(&source[range]).map_err(|_| Error::InvalidUtf8 {
                field: field.full_name().to_string(),
            })?;
            insert(message, field, Value::String(text.to_owned()));
        }
        KindIndex::Bytes => {
            let range = reader.read_length_delimited_range()?;
            insert(message, field, Value::Bytes(source.slice(range)));
        }
        _ if tag.wire_type == WireType::Len => {
            let len = read_len(reader)?;
            let mut packed = reader.limited(len)?;
            while !packed.is_empty() {
                let value = read_scalar(&mut packed, kind)?;
                match undeclared_enum_number(field, &value) {
                    Some(number) => message.unknown.push(unpacked_unknown(field, number)),
                    None => message.push_element(field, value),
                }
            }
        }
        _ => {
            let value_offset = reader.position() - start;
            let value = read_scalar(reader, kind)?;
            if undeclared_enum_number(field, &value).is_some() {
                let raw = source.slice(start..reader.position());
                message.unknown.push(UnknownField::new(tag, raw, value_offset));
            } else {
                insert(message, field, value);
            }
        }
    }
    Ok(())
}

/// True if a value arriving with `wire_type` can be stored in `field`
fn accepts(field: &FieldDescriptor, wire_type: WireType) -> bool {
    if field.is_list() && is_packable(field.kind_index()) && wire_type == WireType::Len {
        return true;
    }
    wire_type == field.wire_type()
}

fn is_packable(kind: KindIndex) -> bool {
    !matches!(
        kind,
        KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) | KindIndex::Pending
    )
}

fn insert(message: &mut DynamicMessage, field: &FieldDescriptor, value: Value) {
    if field.is_list() {
        message.push_element(field, value);
    } else {
        message.store(field, value);
    }
}

fn read_len(reader: &mut WireReader<'_>) -> Result<usize> {
    let len = reader.read_varint()?;
    usize::try_from(len).map_err(|_| Error::truncated(reader.position(), usize::MAX, reader.remaining()))
}

fn read_scalar(reader: &mut WireReader<'_>, kind: KindIndex) -> Result<Value> {
    Ok(match kind {
        KindIndex::Double => Value::F64(f64::from_bits(reader.read_fixed64()?)),
        KindIndex::Float => Value::F32(f32::from_bits(reader.read_fixed32()?)),
        KindIndex::Int64 => Value::I64(reader.read_varint()? as i64),
        KindIndex::Uint64 => Value::U64(reader.read_varint()?),
        KindIndex::Int32 => Value::I32(reader.read_varint()? as i32),
        KindIndex::Fixed64 => Value::U64(reader.read_fixed64()?),
        KindIndex::Fixed32 => Value::U32(reader.read_fixed32()?),
        KindIndex::Bool => Value::Bool(reader.read_varint()? != 0),
        KindIndex::Uint32 => Value::U32(reader.read_varint()? as u32),
        KindIndex::Sfixed32 => Value::I32(reader.read_fixed32()? as i32),
        KindIndex::Sfixed64 => Value::I64(reader.read_fixed64()? as i64),
        KindIndex::Sint32 => Value::I32(zigzag_decode32(reader.read_varint()? as u32)),
        KindIndex::Sint64 => Value::I64(zigzag_decode64(reader.read_varint()?)),
        KindIndex::Enum(_) => Value::EnumNumber(reader.read_varint()? as i32),
        KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) | KindIndex::Pending => {
            unreachable!("length-delimited kinds are decoded by the caller")
        }
    })
}

/// The number carried by `value` when `field` is a closed enum that does not
/// declare it
fn undeclared_enum_number(field: &FieldDescriptor, value: &Value) -> Option<i32> {
    match (field.kind(), value) {
        (Kind::Enum(desc), Value::EnumNumber(number))
            if desc.is_closed() && desc.get_value(*number).is_none() =>
        {
            Some(*number)
        }
        _ => None,
    }
}

/// An unknown varint field for one element lifted out of a packed run
fn unpacked_unknown(field: &FieldDescriptor, number: i32) -> UnknownField {
    let tag = Tag::new(field.number(), WireType::Varint);
    let mut raw = Vec::new();
    encode_tag(tag.number, tag.wire_type, &mut raw);
    let value_offset = raw.len();
    encode_varint(i64::from(number) as u64, &mut raw);
    UnknownField::new(tag, Bytes::from(raw), value_offset)
}
