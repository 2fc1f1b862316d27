use super::DynamicMessage;
use crate::descriptor::{DefaultValue, FieldDescriptor, Kind};
use crate::error::{Error, Result};
use bytes::Bytes;

/// A field value held by a [`DynamicMessage`]
#[derive(Debug, Clone)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32`
    I32(i32),
    /// `int64`, `sint64`, `sfixed64`
    I64(i64),
    /// `uint32`, `fixed32`
    U32(u32),
    /// `uint64`, `fixed64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// `string`
    String(String),
    /// `bytes`
    Bytes(Bytes),
    /// An enum value by number, declared or not
    EnumNumber(i32),
    /// An embedded message or group
    Message(DynamicMessage),
    /// The elements of a repeated field
    List(Vec<Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            // Bitwise, so NaN payloads and negative zero survive a round trip.
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::EnumNumber(a), Value::EnumNumber(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// The value a field reads as when unset.
    ///
    /// Repeated fields default to an empty list; singular fields use their
    /// declared default, or the zero value of their kind.
    pub fn default_for(field: &FieldDescriptor) -> Value {
        if field.is_list() {
            return Value::List(Vec::new());
        }
        match field.default_value_raw() {
            Some(default) => Value::from_default(default),
            None => Value::default_for_kind(&field.kind()),
        }
    }

    /// The zero value of `kind`
    pub fn default_for_kind(kind: &Kind) -> Value {
        match kind {
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(0),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
            Kind::Enum(desc) => Value::EnumNumber(desc.default_value().number()),
            Kind::Message(desc) => Value::Message(DynamicMessage::new(desc.clone())),
        }
    }

    fn from_default(default: &DefaultValue) -> Value {
        match default {
            DefaultValue::Bool(v) => Value::Bool(*v),
            DefaultValue::I32(v) => Value::I32(*v),
            DefaultValue::I64(v) => Value::I64(*v),
            DefaultValue::U32(v) => Value::U32(*v),
            DefaultValue::U64(v) => Value::U64(*v),
            DefaultValue::F32(v) => Value::F32(*v),
            DefaultValue::F64(v) => Value::F64(*v),
            DefaultValue::String(v) => Value::String(v.clone()),
            DefaultValue::Bytes(v) => Value::Bytes(v.clone()),
            DefaultValue::EnumNumber(v) => Value::EnumNumber(*v),
        }
    }

    /// True if this value may be stored in `field`
    pub fn is_valid_for(&self, field: &FieldDescriptor) -> bool {
        self.check(field).is_ok()
    }

    /// Validates this value against `field`'s kind and cardinality
    pub(crate) fn check(&self, field: &FieldDescriptor) -> Result<()> {
        let kind = field.kind();
        if !field.is_list() {
            return self.check_element(field, &kind);
        }
        match self {
            Value::List(values) => values
                .iter()
                .try_for_each(|value| value.check_element(field, &kind)),
            other => Err(Error::type_mismatch(
                field.full_name(),
                format!("list of {}", kind.name()),
                other.type_name(),
            )),
        }
    }

    /// Validates one singular value or list element against `kind`
    pub(crate) fn check_element(&self, field: &FieldDescriptor, kind: &Kind) -> Result<()> {
        let matches = match (self, kind) {
            (Value::Bool(_), Kind::Bool) => true,
            (Value::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32) => true,
            (Value::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64) => true,
            (Value::U32(_), Kind::Uint32 | Kind::Fixed32) => true,
            (Value::U64(_), Kind::Uint64 | Kind::Fixed64) => true,
            (Value::F32(_), Kind::Float) => true,
            (Value::F64(_), Kind::Double) => true,
            (Value::String(_), Kind::String) => true,
            (Value::Bytes(_), Kind::Bytes) => true,
            (Value::Message(message), Kind::Message(desc)) => message.descriptor() == desc,
            (Value::EnumNumber(number), Kind::Enum(desc)) => {
                if desc.is_closed() && desc.get_value(*number).is_none() {
                    return Err(Error::type_mismatch(
                        field.full_name(),
                        format!("a declared value of closed enum {}", desc.full_name()),
                        format!("undeclared number {number}"),
                    ));
                }
                true
            }
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(Error::type_mismatch(
                field.full_name(),
                kind.name(),
                self.type_name(),
            ))
        }
    }

    /// True for the zero value of a scalar kind.
    ///
    /// Fields without presence do not store these values.
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::I32(v) | Value::EnumNumber(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Message(_) => false,
            Value::List(v) => v.is_empty(),
        }
    }

    /// Short description of the value's type, used in error messages
    pub fn type_name(&self) -> &str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum number",
            Value::Message(message) => message.descriptor().full_name(),
            Value::List(_) => "list",
        }
    }

    /// Returns the value if it is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is an `I32`
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is an `I64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is a `U32`
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is a `U64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is an `F32`
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is an `F64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if it is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value if it is `Bytes`
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the number if the value is an `EnumNumber`
    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            Value::EnumNumber(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the message if the value is a `Message`
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the elements if the value is a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<DynamicMessage> for Value {
    fn from(value: DynamicMessage) -> Self {
        Value::Message(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_ne!(Value::F32(1.0), Value::F64(1.0));
    }

    #[test]
    fn test_is_zero() {
        assert!(Value::I32(0).is_zero());
        assert!(Value::String(String::new()).is_zero());
        assert!(Value::F64(0.0).is_zero());
        assert!(!Value::F64(-0.0).is_zero());
        assert!(!Value::Bool(true).is_zero());
        assert!(!Value::EnumNumber(3).is_zero());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(7i32).as_i32(), Some(7));
        assert_eq!(Value::from(7i32).as_i64(), None);
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(vec![Value::Bool(true)]).as_list().map(<[_]>::len), Some(1));
        assert_eq!(Value::U64(1).type_name(), "u64");
    }
}
