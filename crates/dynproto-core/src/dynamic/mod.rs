//! Descriptor-driven messages.
//!
//! A [`DynamicMessage`] stores field values keyed by field number and consults
//! its [`MessageDescriptor`] for everything else: value validation, presence,
//! oneof exclusivity and the wire representation of each field.
//!
//! ## Example
//!
//! ```no_run
//! use dynproto_core::{DescriptorPool, DynamicMessage, Value};
//!
//! # fn example(pool: &DescriptorPool, bytes: &[u8]) -> dynproto_core::Result<()> {
//! let desc = pool.get_message_by_name("acme.Order").expect("registered");
//! let mut order = DynamicMessage::decode(desc.clone(), bytes)?;
//!
//! let id = desc.get_field_by_name("id").expect("declared");
//! order.set(&id, Value::U64(42))?;
//!
//! let encoded = order.encode_to_vec();
//! # Ok(())
//! # }
//! ```

mod decode;
mod encode;
mod unknown;
mod value;

pub use unknown::{UnknownField, UnknownFieldSet};
pub use value::Value;

use crate::descriptor::{Cardinality, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor};
use crate::error::{Error, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sentinel for "encoded length not computed"
const UNKNOWN_LEN: usize = usize::MAX;

/// Configuration for decoding
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Maximum nesting of messages and groups
    pub recursion_limit: u32,
    /// Accept messages that leave `required` fields unset
    pub allow_partial: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: Self::DEFAULT_RECURSION_LIMIT,
            allow_partial: false,
        }
    }
}

impl DecodeConfig {
    /// Default nesting limit for messages and groups
    pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

    /// Creates a new decode config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting of messages and groups
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Sets whether unset `required` fields are accepted
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldEntry {
    field: FieldDescriptor,
    value: Value,
}

/// A message whose shape is only known at run time
pub struct DynamicMessage {
    desc: MessageDescriptor,
    fields: BTreeMap<u32, FieldEntry>,
    unknown: UnknownFieldSet,
    cached_len: AtomicUsize,
}

impl DynamicMessage {
    /// Creates an empty message of type `desc`
    pub fn new(desc: MessageDescriptor) -> Self {
        Self {
            desc,
            fields: BTreeMap::new(),
            unknown: UnknownFieldSet::new(),
            cached_len: AtomicUsize::new(UNKNOWN_LEN),
        }
    }

    /// The message type
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.desc
    }

    /// True if `field` holds a value.
    ///
    /// Repeated fields count as set when non-empty.
    pub fn has(&self, field: &FieldDescriptor) -> bool {
        self.entry(field).is_some()
    }

    /// The value of `field`, or its default when unset
    pub fn get(&self, field: &FieldDescriptor) -> Cow<'_, Value> {
        match self.entry(field) {
            Some(entry) => Cow::Borrowed(&entry.value),
            None => Cow::Owned(Value::default_for(field)),
        }
    }

    /// Sets `field` to `value`.
    ///
    /// Fails with `TypeMismatch` when the value does not fit the field's kind
    /// or cardinality. Setting a oneof member clears the other members, and
    /// setting a field without presence to its zero value clears it.
    pub fn set(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_field(field)?;
        value.check(field)?;
        self.store(field, value);
        Ok(())
    }

    /// Appends `value` to the repeated field `field`
    pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_field(field)?;
        if !field.is_list() {
            return Err(Error::not_repeated(field.full_name()));
        }
        value.check_element(field, &field.kind())?;
        self.push_element(field, value);
        Ok(())
    }

    /// Clears `field`
    pub fn clear(&mut self, field: &FieldDescriptor) {
        if self.entry(field).is_some() {
            self.fields.remove(&field.number());
            self.invalidate();
        }
    }

    /// Clears every field and the unknown-field set
    pub fn clear_all(&mut self) {
        self.fields.clear();
        self.unknown.clear();
        self.invalidate();
    }

    /// Mutable access to a singular message field, creating it if unset
    pub fn message_mut(&mut self, field: &FieldDescriptor) -> Result<&mut DynamicMessage> {
        self.check_field(field)?;
        let kind = field.kind();
        let desc = match (&kind, field.is_list()) {
            (Kind::Message(desc), false) => desc.clone(),
            _ => {
                return Err(Error::type_mismatch(
                    field.full_name(),
                    "a singular message field",
                    kind.name(),
                ))
            }
        };

        self.invalidate();
        self.clear_oneof_siblings(field);
        let entry = self
            .fields
            .entry(field.number())
            .or_insert_with(|| FieldEntry {
                field: field.clone(),
                value: Value::Message(DynamicMessage::new(desc)),
            });
        match &mut entry.value {
            Value::Message(message) => Ok(message),
            other => Err(Error::type_mismatch(
                field.full_name(),
                "a message",
                other.type_name(),
            )),
        }
    }

    /// The member of `oneof` currently holding a value
    pub fn which_oneof(&self, oneof: &OneofDescriptor) -> Option<FieldDescriptor> {
        oneof.fields().find(|field| self.has(field))
    }

    /// Set fields and their values, by ascending field number
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> + '_ {
        self.fields
            .values()
            .map(|entry| (&entry.field, &entry.value))
    }

    /// True when every `required` field is set, here and in nested messages
    pub fn is_initialized(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    /// Paths of unset `required` fields, e.g. `shipping.city` or `items[2].id`
    pub fn missing_required_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        self.collect_missing("", &mut missing);
        missing
    }

    fn collect_missing(&self, prefix: &str, missing: &mut Vec<String>) {
        for field in self.desc.fields() {
            if field.cardinality() == Cardinality::Required && !self.has(&field) {
                missing.push(format!("{}{}", prefix, field.name()));
            }
        }

        for entry in self.fields.values() {
            let name = if entry.field.is_extension() {
                format!("{}({})", prefix, entry.field.full_name())
            } else {
                format!("{}{}", prefix, entry.field.name())
            };
            match &entry.value {
                Value::Message(message) => message.collect_missing(&format!("{}.", name), missing),
                Value::List(values) => {
                    for (i, value) in values.iter().enumerate() {
                        if let Value::Message(message) = value {
                            message.collect_missing(&format!("{}[{}].", name, i), missing);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Fields preserved from the wire without a matching descriptor
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    /// Merges `other` into this message.
    ///
    /// Singular fields set in `other` overwrite, except message fields which
    /// merge recursively. Repeated fields and unknown fields are appended, and
    /// map entries replace entries with the same key.
    pub fn merge(&mut self, other: &DynamicMessage) -> Result<()> {
        if self.desc != other.desc {
            return Err(Error::type_mismatch(
                self.desc.full_name(),
                self.desc.full_name(),
                other.desc.full_name(),
            ));
        }
        self.merge_unchecked(other);
        Ok(())
    }

    fn merge_unchecked(&mut self, other: &DynamicMessage) {
        for entry in other.fields.values() {
            let field = &entry.field;
            match &entry.value {
                Value::List(values) => {
                    for value in values {
                        self.push_element(field, value.clone());
                    }
                }
                Value::Message(incoming) => match self.fields.get_mut(&field.number()) {
                    Some(FieldEntry {
                        value: Value::Message(existing),
                        ..
                    }) => existing.merge_unchecked(incoming),
                    _ => self.store(field, Value::Message(incoming.clone())),
                },
                value => self.store(field, value.clone()),
            }
        }
        self.unknown.extend_from(&other.unknown);
        self.invalidate();
    }

    fn entry(&self, field: &FieldDescriptor) -> Option<&FieldEntry> {
        self.fields
            .get(&field.number())
            .filter(|entry| entry.field == *field)
    }

    fn check_field(&self, field: &FieldDescriptor) -> Result<()> {
        if field.containing_message() == self.desc {
            Ok(())
        } else {
            Err(Error::FieldNotInMessage {
                field: field.full_name().to_string(),
                message: self.desc.full_name().to_string(),
            })
        }
    }

    /// Stores an already-validated value, applying oneof and presence rules
    pub(crate) fn store(&mut self, field: &FieldDescriptor, value: Value) {
        self.invalidate();
        self.clear_oneof_siblings(field);
        if !field.has_presence() && value.is_zero() {
            self.fields.remove(&field.number());
            return;
        }
        self.fields.insert(
            field.number(),
            FieldEntry {
                field: field.clone(),
                value,
            },
        );
    }

    /// Appends an already-validated element to a repeated field.
    ///
    /// For map fields an entry with the same key is removed first.
    pub(crate) fn push_element(&mut self, field: &FieldDescriptor, value: Value) {
        self.invalidate();
        let entry = self
            .fields
            .entry(field.number())
            .or_insert_with(|| FieldEntry {
                field: field.clone(),
                value: Value::List(Vec::new()),
            });
        if let Value::List(values) = &mut entry.value {
            if field.is_map() {
                if let Some(key) = map_key(&value) {
                    values.retain(|existing| map_key(existing).as_ref() != Some(&key));
                }
            }
            values.push(value);
        }
    }

    /// Removes and returns the message stored in `field`, or a new empty one
    pub(crate) fn take_message(&mut self, field: &FieldDescriptor, desc: &MessageDescriptor) -> DynamicMessage {
        match self.fields.remove(&field.number()) {
            Some(FieldEntry {
                value: Value::Message(message),
                ..
            }) => message,
            _ => DynamicMessage::new(desc.clone()),
        }
    }

    fn clear_oneof_siblings(&mut self, field: &FieldDescriptor) {
        if let Some(oneof) = field.containing_oneof() {
            for member in oneof.fields() {
                if member.number() != field.number() {
                    self.fields.remove(&member.number());
                }
            }
        }
    }

    fn invalidate(&mut self) {
        *self.cached_len.get_mut() = UNKNOWN_LEN;
    }

    pub(crate) fn cached_len(&self) -> Option<usize> {
        match self.cached_len.load(Ordering::Relaxed) {
            UNKNOWN_LEN => None,
            len => Some(len),
        }
    }

    pub(crate) fn set_cached_len(&self, len: usize) {
        self.cached_len.store(len, Ordering::Relaxed);
    }
}

/// The key of a map entry message
fn map_key(entry: &Value) -> Option<Value> {
    let Value::Message(entry) = entry else {
        return None;
    };
    let key = entry.desc.get_field(1)?;
    Some(entry.get(&key).into_owned())
}

impl Clone for DynamicMessage {
    fn clone(&self) -> Self {
        Self {
            desc: self.desc.clone(),
            fields: self.fields.clone(),
            unknown: self.unknown.clone(),
            cached_len: AtomicUsize::new(self.cached_len.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields && self.unknown == other.unknown
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.desc.full_name());
        for entry in self.fields.values() {
            s.field(entry.field.name(), &entry.value);
        }
        if !self.unknown.is_empty() {
            s.field("unknown_fields", &self.unknown.len());
        }
        s.finish()
    }
}
