//! Descriptor model.
//!
//! Descriptors are immutable views into a [`DescriptorPool`]. Each handle is a
//! pool snapshot plus an index, so handles are cheap to clone, `Send + Sync`,
//! and stay valid for as long as any handle keeps the snapshot alive.
//!
//! ## Construction
//!
//! Descriptors are created by [`DescriptorPool::add_file`] from a
//! `FileDescriptorProto` in two passes:
//!
//! 1. **Raw**: every element is instantiated and registered in the symbol
//!    table; type references stay textual.
//! 2. **Cross-linked**: textual references are resolved through the pool's
//!    scoped lookup, and cross-element invariants are validated.
//!
//! A file is only published to the pool once both passes succeed.

pub(crate) mod build;

use crate::error::{Error, Result};
use crate::pool::DescriptorPool;
use crate::wire::WireType;
use bytes::Bytes;
use prost_types::FileDescriptorProto;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;

pub(crate) type FileIndex = u32;
pub(crate) type MessageIndex = u32;
pub(crate) type FieldIndex = u32;
pub(crate) type OneofIndex = u32;
pub(crate) type EnumIndex = u32;
pub(crate) type EnumValueIndex = u32;
pub(crate) type ServiceIndex = u32;
pub(crate) type MethodIndex = u32;

/// Proto syntax version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// Proto2 syntax
    Proto2,
    /// Proto3 syntax
    Proto3,
}

impl Syntax {
    /// Returns the syntax declaration string
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl TryFrom<&str> for Syntax {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "" | "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            _ => Err(Error::UnsupportedSyntax {
                syntax: value.to_string(),
            }),
        }
    }
}

/// How many values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Zero or one value
    Optional,
    /// Exactly one value (proto2 only)
    Required,
    /// An ordered list of values
    Repeated,
}

/// The declared type of a field
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int64`
    Int64,
    /// `uint64`
    Uint64,
    /// `int32`
    Int32,
    /// `fixed64`
    Fixed64,
    /// `fixed32`
    Fixed32,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// `uint32`
    Uint32,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// A message type (also used for groups)
    Message(MessageDescriptor),
    /// An enum type
    Enum(EnumDescriptor),
}

impl Kind {
    /// Wire type used for a single, unpacked value of this kind
    pub fn wire_type(&self) -> WireType {
        match self {
            Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Bool
            | Kind::Enum(_) => WireType::Varint,
            Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::I64,
            Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::I32,
            Kind::String | Kind::Bytes | Kind::Message(_) => WireType::Len,
        }
    }

    /// True for kinds that may use packed repeated encoding
    pub fn is_packable(&self) -> bool {
        !matches!(self, Kind::String | Kind::Bytes | Kind::Message(_))
    }

    /// The message type, for message kinds
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Kind::Message(desc) => Some(desc),
            _ => None,
        }
    }

    /// The enum type, for enum kinds
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            Kind::Enum(desc) => Some(desc),
            _ => None,
        }
    }

    /// The name used in schema source for this kind
    pub fn name(&self) -> &str {
        match self {
            Kind::Double => "double",
            Kind::Float => "float",
            Kind::Int64 => "int64",
            Kind::Uint64 => "uint64",
            Kind::Int32 => "int32",
            Kind::Fixed64 => "fixed64",
            Kind::Fixed32 => "fixed32",
            Kind::Bool => "bool",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Uint32 => "uint32",
            Kind::Sfixed32 => "sfixed32",
            Kind::Sfixed64 => "sfixed64",
            Kind::Sint32 => "sint32",
            Kind::Sint64 => "sint64",
            Kind::Message(desc) => desc.full_name(),
            Kind::Enum(desc) => desc.full_name(),
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Message(desc) => write!(f, "Message({})", desc.full_name()),
            Kind::Enum(desc) => write!(f, "Enum({})", desc.full_name()),
            other => f.write_str(other.name()),
        }
    }
}

/// Index form of [`Kind`] stored inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindIndex {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
    Message(MessageIndex),
    Enum(EnumIndex),
    /// Message or enum reference not yet cross-linked
    Pending,
}

/// Parsed proto2 `[default = ...]` value
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DefaultValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    EnumNumber(i32),
}

#[derive(Debug, Clone)]
pub(crate) struct FileInner {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) syntax: Syntax,
    pub(crate) dependencies: Vec<FileIndex>,
    pub(crate) public_dependencies: Vec<FileIndex>,
    pub(crate) messages: Vec<MessageIndex>,
    pub(crate) enums: Vec<EnumIndex>,
    pub(crate) services: Vec<ServiceIndex>,
    pub(crate) extensions: Vec<FieldIndex>,
    pub(crate) proto: FileDescriptorProto,
}

#[derive(Debug, Clone)]
pub(crate) struct MessageInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) file: FileIndex,
    pub(crate) parent: Option<MessageIndex>,
    pub(crate) fields: Vec<FieldIndex>,
    pub(crate) field_numbers: HashMap<u32, FieldIndex>,
    pub(crate) field_names: HashMap<String, FieldIndex>,
    pub(crate) nested_messages: Vec<MessageIndex>,
    pub(crate) nested_enums: Vec<EnumIndex>,
    pub(crate) oneofs: Vec<OneofIndex>,
    pub(crate) extension_ranges: Vec<Range<u32>>,
    pub(crate) extensions: Vec<FieldIndex>,
    pub(crate) extension_numbers: BTreeMap<u32, FieldIndex>,
    pub(crate) is_map_entry: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) json_name: String,
    pub(crate) number: u32,
    pub(crate) file: FileIndex,
    /// Declaring message for fields, extension scope for extensions
    pub(crate) parent: Option<MessageIndex>,
    /// Message whose instances hold this field (the extendee for extensions)
    pub(crate) containing: Option<MessageIndex>,
    pub(crate) is_extension: bool,
    pub(crate) kind: KindIndex,
    pub(crate) is_group: bool,
    pub(crate) cardinality: Cardinality,
    pub(crate) packed: bool,
    pub(crate) oneof: Option<OneofIndex>,
    pub(crate) proto3_optional: bool,
    pub(crate) default: Option<DefaultValue>,
}

#[derive(Debug, Clone)]
pub(crate) struct OneofInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) message: MessageIndex,
    pub(crate) fields: Vec<FieldIndex>,
    pub(crate) synthetic: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) file: FileIndex,
    pub(crate) parent: Option<MessageIndex>,
    pub(crate) values: Vec<EnumValueIndex>,
    pub(crate) value_numbers: HashMap<i32, EnumValueIndex>,
    pub(crate) value_names: HashMap<String, EnumValueIndex>,
    pub(crate) closed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumValueInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: i32,
    pub(crate) parent: EnumIndex,
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) file: FileIndex,
    pub(crate) methods: Vec<MethodIndex>,
}

#[derive(Debug, Clone)]
pub(crate) struct MethodInner {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) service: ServiceIndex,
    /// Resolved during cross-linking
    pub(crate) input: Option<MessageIndex>,
    pub(crate) output: Option<MessageIndex>,
    pub(crate) client_streaming: bool,
    pub(crate) server_streaming: bool,
}

macro_rules! descriptor_handle {
    ($(#[$meta:meta])* $name:ident, $inner:ident, $table:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            pool: DescriptorPool,
            index: u32,
        }

        impl $name {
            pub(crate) fn new(pool: DescriptorPool, index: u32) -> Self {
                Self { pool, index }
            }

            fn inner(&self) -> &$inner {
                &self.pool.inner().$table[self.index as usize]
            }

            pub(crate) fn index(&self) -> u32 {
                self.index
            }

            /// The pool this descriptor belongs to
            pub fn parent_pool(&self) -> &DescriptorPool {
                &self.pool
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.index == other.index && self.pool.id() == other.pool.id()
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.pool.id().hash(state);
                self.index.hash(state);
            }
        }
    };
}

descriptor_handle!(
    /// A `.proto` file registered in a pool
    FileDescriptor,
    FileInner,
    files
);
descriptor_handle!(
    /// A message type
    MessageDescriptor,
    MessageInner,
    messages
);
descriptor_handle!(
    /// A field of a message, or an extension
    FieldDescriptor,
    FieldInner,
    fields
);
descriptor_handle!(
    /// A oneof group of a message
    OneofDescriptor,
    OneofInner,
    oneofs
);
descriptor_handle!(
    /// An enum type
    EnumDescriptor,
    EnumInner,
    enums
);
descriptor_handle!(
    /// One named value of an enum
    EnumValueDescriptor,
    EnumValueInner,
    enum_values
);
descriptor_handle!(
    /// An RPC service
    ServiceDescriptor,
    ServiceInner,
    services
);
descriptor_handle!(
    /// One method of a service
    MethodDescriptor,
    MethodInner,
    methods
);

impl FileDescriptor {
    /// File name, as given in the descriptor proto
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Package name (may be empty)
    pub fn package_name(&self) -> &str {
        &self.inner().package
    }

    /// Syntax the file was declared with
    pub fn syntax(&self) -> Syntax {
        self.inner().syntax
    }

    /// Imported files, in declaration order
    pub fn dependencies(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        self.inner()
            .dependencies
            .iter()
            .map(|&i| FileDescriptor::new(self.pool.clone(), i))
    }

    /// Imported files re-exported with `import public`
    pub fn public_dependencies(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        self.inner()
            .public_dependencies
            .iter()
            .map(|&i| FileDescriptor::new(self.pool.clone(), i))
    }

    /// Top-level messages, in declaration order
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        self.inner()
            .messages
            .iter()
            .map(|&i| MessageDescriptor::new(self.pool.clone(), i))
    }

    /// Top-level enums, in declaration order
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        self.inner()
            .enums
            .iter()
            .map(|&i| EnumDescriptor::new(self.pool.clone(), i))
    }

    /// Services, in declaration order
    pub fn services(&self) -> impl ExactSizeIterator<Item = ServiceDescriptor> + '_ {
        self.inner()
            .services
            .iter()
            .map(|&i| ServiceDescriptor::new(self.pool.clone(), i))
    }

    /// Top-level extensions, in declaration order
    pub fn extensions(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .extensions
            .iter()
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// The descriptor proto this file was built from
    pub fn proto(&self) -> &FileDescriptorProto {
        &self.inner().proto
    }
}

impl MessageDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name, without a leading dot
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The file declaring this message
    pub fn parent_file(&self) -> FileDescriptor {
        FileDescriptor::new(self.pool.clone(), self.inner().file)
    }

    /// The enclosing message, for nested types
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.inner()
            .parent
            .map(|i| MessageDescriptor::new(self.pool.clone(), i))
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Declared field with the given number
    pub fn get_field(&self, number: u32) -> Option<FieldDescriptor> {
        self.inner()
            .field_numbers
            .get(&number)
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Declared field with the given short name
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.inner()
            .field_names
            .get(name)
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Extension of this message with the given number, as known to this snapshot
    pub fn get_extension(&self, number: u32) -> Option<FieldDescriptor> {
        self.inner()
            .extension_numbers
            .get(&number)
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Extensions of this message known to this snapshot, by ascending number
    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .extension_numbers
            .values()
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Extensions declared inside this message's scope
    pub fn declared_extensions(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .extensions
            .iter()
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// Nested message types, in declaration order
    pub fn nested_messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        self.inner()
            .nested_messages
            .iter()
            .map(|&i| MessageDescriptor::new(self.pool.clone(), i))
    }

    /// Nested enum types, in declaration order
    pub fn nested_enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        self.inner()
            .nested_enums
            .iter()
            .map(|&i| EnumDescriptor::new(self.pool.clone(), i))
    }

    /// Oneofs, in declaration order (synthetic ones included)
    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        self.inner()
            .oneofs
            .iter()
            .map(|&i| OneofDescriptor::new(self.pool.clone(), i))
    }

    /// Extension ranges as half-open `[start, end)` intervals
    pub fn extension_ranges(&self) -> &[Range<u32>] {
        &self.inner().extension_ranges
    }

    /// True if `number` falls inside an extension range
    pub fn is_extension_number(&self, number: u32) -> bool {
        self.inner()
            .extension_ranges
            .iter()
            .any(|range| range.contains(&number))
    }

    /// True for the synthetic entry type of a map field
    pub fn is_map_entry(&self) -> bool {
        self.inner().is_map_entry
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("full_name", &self.full_name())
            .field("fields", &self.inner().fields.len())
            .finish()
    }
}

impl FieldDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// JSON name (explicit, or lowerCamelCase of the name)
    pub fn json_name(&self) -> &str {
        &self.inner().json_name
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.inner().number
    }

    /// The file declaring this field
    pub fn parent_file(&self) -> FileDescriptor {
        FileDescriptor::new(self.pool.clone(), self.inner().file)
    }

    /// The message instances of which hold this field.
    ///
    /// For extensions this is the extended message.
    pub fn containing_message(&self) -> MessageDescriptor {
        let index = self
            .inner()
            .containing
            .unwrap_or_else(|| unreachable!("extendees are resolved before publication"));
        MessageDescriptor::new(self.pool.clone(), index)
    }

    /// The message an extension was declared inside, if any
    pub fn extension_scope(&self) -> Option<MessageDescriptor> {
        let inner = self.inner();
        if !inner.is_extension {
            return None;
        }
        inner
            .parent
            .map(|i| MessageDescriptor::new(self.pool.clone(), i))
    }

    /// True for extensions
    pub fn is_extension(&self) -> bool {
        self.inner().is_extension
    }

    /// Declared type
    pub fn kind(&self) -> Kind {
        let pool = self.pool.clone();
        match self.inner().kind {
            KindIndex::Double => Kind::Double,
            KindIndex::Float => Kind::Float,
            KindIndex::Int64 => Kind::Int64,
            KindIndex::Uint64 => Kind::Uint64,
            KindIndex::Int32 => Kind::Int32,
            KindIndex::Fixed64 => Kind::Fixed64,
            KindIndex::Fixed32 => Kind::Fixed32,
            KindIndex::Bool => Kind::Bool,
            KindIndex::String => Kind::String,
            KindIndex::Bytes => Kind::Bytes,
            KindIndex::Uint32 => Kind::Uint32,
            KindIndex::Sfixed32 => Kind::Sfixed32,
            KindIndex::Sfixed64 => Kind::Sfixed64,
            KindIndex::Sint32 => Kind::Sint32,
            KindIndex::Sint64 => Kind::Sint64,
            KindIndex::Message(i) => Kind::Message(MessageDescriptor::new(pool, i)),
            KindIndex::Enum(i) => Kind::Enum(EnumDescriptor::new(pool, i)),
            KindIndex::Pending => unreachable!("field kinds are resolved before publication"),
        }
    }

    /// Cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.inner().cardinality
    }

    /// True for repeated fields (map fields included)
    pub fn is_list(&self) -> bool {
        self.inner().cardinality == Cardinality::Repeated
    }

    /// True for repeated fields whose entry type is a map entry
    pub fn is_map(&self) -> bool {
        let inner = self.inner();
        match inner.kind {
            KindIndex::Message(i) => {
                inner.cardinality == Cardinality::Repeated
                    && self.pool.inner().messages[i as usize].is_map_entry
            }
            _ => false,
        }
    }

    /// True if repeated values are written as one packed run
    pub fn is_packed(&self) -> bool {
        self.inner().packed
    }

    /// True for proto2 groups
    pub fn is_group(&self) -> bool {
        self.inner().is_group
    }

    /// Wire type of a single unpacked value
    pub fn wire_type(&self) -> WireType {
        let inner = self.inner();
        if inner.is_group {
            return WireType::StartGroup;
        }
        match inner.kind {
            KindIndex::Message(_) => WireType::Len,
            KindIndex::Enum(_) => WireType::Varint,
            _ => self.kind().wire_type(),
        }
    }

    /// The oneof this field belongs to, synthetic oneofs included
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.inner()
            .oneof
            .map(|i| OneofDescriptor::new(self.pool.clone(), i))
    }

    /// True for proto3 `optional` fields
    pub fn is_proto3_optional(&self) -> bool {
        self.inner().proto3_optional
    }

    /// True if the field tracks presence explicitly.
    ///
    /// Fields without presence treat their default value as unset.
    pub fn has_presence(&self) -> bool {
        let inner = self.inner();
        if inner.cardinality == Cardinality::Repeated {
            return false;
        }
        if inner.is_extension || inner.oneof.is_some() {
            return true;
        }
        if matches!(inner.kind, KindIndex::Message(_)) {
            return true;
        }
        self.pool.inner().files[inner.file as usize].syntax == Syntax::Proto2
    }

    pub(crate) fn default_value_raw(&self) -> Option<&DefaultValue> {
        self.inner().default.as_ref()
    }

    pub(crate) fn kind_index(&self) -> KindIndex {
        self.inner().kind
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("full_name", &self.full_name())
            .field("number", &self.number())
            .field("kind", &self.kind())
            .field("cardinality", &self.cardinality())
            .finish()
    }
}

impl OneofDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The message declaring this oneof
    pub fn parent_message(&self) -> MessageDescriptor {
        MessageDescriptor::new(self.pool.clone(), self.inner().message)
    }

    /// Member fields, in declaration order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.inner()
            .fields
            .iter()
            .map(|&i| FieldDescriptor::new(self.pool.clone(), i))
    }

    /// True for the single-member oneof backing a proto3 `optional` field
    pub fn is_synthetic(&self) -> bool {
        self.inner().synthetic
    }
}

impl fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneofDescriptor")
            .field("full_name", &self.full_name())
            .finish()
    }
}

impl EnumDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The file declaring this enum
    pub fn parent_file(&self) -> FileDescriptor {
        FileDescriptor::new(self.pool.clone(), self.inner().file)
    }

    /// The enclosing message, for nested enums
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.inner()
            .parent
            .map(|i| MessageDescriptor::new(self.pool.clone(), i))
    }

    /// Values, in declaration order
    pub fn values(&self) -> impl ExactSizeIterator<Item = EnumValueDescriptor> + '_ {
        self.inner()
            .values
            .iter()
            .map(|&i| EnumValueDescriptor::new(self.pool.clone(), i))
    }

    /// The first declared value with this number
    pub fn get_value(&self, number: i32) -> Option<EnumValueDescriptor> {
        self.inner()
            .value_numbers
            .get(&number)
            .map(|&i| EnumValueDescriptor::new(self.pool.clone(), i))
    }

    /// The value with this short name
    pub fn get_value_by_name(&self, name: &str) -> Option<EnumValueDescriptor> {
        self.inner()
            .value_names
            .get(name)
            .map(|&i| EnumValueDescriptor::new(self.pool.clone(), i))
    }

    /// The first declared value, which is the enum's default
    pub fn default_value(&self) -> EnumValueDescriptor {
        // Empty enums are rejected at construction.
        EnumValueDescriptor::new(self.pool.clone(), self.inner().values[0])
    }

    /// True if numbers outside the declared values are rejected (proto2)
    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumDescriptor")
            .field("full_name", &self.full_name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EnumValueDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name (scoped as a sibling of its enum)
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Numeric value
    pub fn number(&self) -> i32 {
        self.inner().number
    }

    /// The enum declaring this value
    pub fn parent_enum(&self) -> EnumDescriptor {
        EnumDescriptor::new(self.pool.clone(), self.inner().parent)
    }
}

impl fmt::Debug for EnumValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.full_name(), self.number())
    }
}

impl ServiceDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The file declaring this service
    pub fn parent_file(&self) -> FileDescriptor {
        FileDescriptor::new(self.pool.clone(), self.inner().file)
    }

    /// Methods, in declaration order
    pub fn methods(&self) -> impl ExactSizeIterator<Item = MethodDescriptor> + '_ {
        self.inner()
            .methods
            .iter()
            .map(|&i| MethodDescriptor::new(self.pool.clone(), i))
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("full_name", &self.full_name())
            .finish()
    }
}

impl MethodDescriptor {
    /// Short name
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// Fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// The service declaring this method
    pub fn parent_service(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.pool.clone(), self.inner().service)
    }

    /// Request message type
    pub fn input(&self) -> MessageDescriptor {
        let index = self
            .inner()
            .input
            .unwrap_or_else(|| unreachable!("method types are resolved before publication"));
        MessageDescriptor::new(self.pool.clone(), index)
    }

    /// Response message type
    pub fn output(&self) -> MessageDescriptor {
        let index = self
            .inner()
            .output
            .unwrap_or_else(|| unreachable!("method types are resolved before publication"));
        MessageDescriptor::new(self.pool.clone(), index)
    }

    /// True if the client sends a stream of requests
    pub fn is_client_streaming(&self) -> bool {
        self.inner().client_streaming
    }

    /// True if the server sends a stream of responses
    pub fn is_server_streaming(&self) -> bool {
        self.inner().server_streaming
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("full_name", &self.full_name())
            .finish()
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.name())
            .field("package", &self.package_name())
            .finish()
    }
}
