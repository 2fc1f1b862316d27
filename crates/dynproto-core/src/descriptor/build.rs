//! Two-pass construction of descriptors from a `FileDescriptorProto`.
//!
//! The raw pass instantiates every element, validates what can be checked
//! locally and registers names in the symbol table. Type references are kept
//! as text in side tables. The cross-link pass then resolves those references
//! with the pool's scoped lookup and validates the invariants that span
//! elements: field numbers, extension ranges, oneof membership, defaults.
//!
//! Both passes write into a staging copy of the pool, so an error at any point
//! simply drops the copy.

use super::{
    Cardinality, DefaultValue, EnumIndex, EnumInner, EnumValueInner, FieldIndex, FieldInner,
    FileIndex, FileInner, KindIndex, MessageIndex, MessageInner, MethodIndex, MethodInner,
    OneofIndex, OneofInner, ServiceIndex, ServiceInner, Syntax,
};
use crate::error::{DescriptorError, DescriptorErrorKind, Result};
use crate::pool::{PoolInner, SymbolFilter, SymbolIndex};
use crate::MAX_FIELD_NUMBER;
use bytes::Bytes;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use tracing::trace;

type BuildResult<T> = std::result::Result<T, DescriptorError>;

/// Field numbers reserved for the protocol buffer implementation
const RESERVED_NUMBERS: Range<i32> = 19_000..20_000;

/// Builds `proto` into `pool` and returns the new file's index
pub(crate) fn build_file(pool: &mut PoolInner, proto: FileDescriptorProto) -> Result<FileIndex> {
    let syntax = Syntax::try_from(proto.syntax())?;
    let mut builder = FileBuilder::new(pool, &proto, syntax)?;
    builder.build_raw(&proto)?;
    builder.cross_link()?;
    let index = builder.file;
    pool.files[index as usize].proto = proto;
    Ok(index)
}

struct FileBuilder<'a> {
    pool: &'a mut PoolInner,
    file: FileIndex,
    file_name: String,
    syntax: Syntax,
    /// Files whose symbols this file may reference
    visible: HashSet<FileIndex>,
    first_oneof: OneofIndex,
    messages: Vec<PendingMessage>,
    fields: Vec<PendingField>,
    methods: Vec<PendingMethod>,
}

struct PendingMessage {
    message: MessageIndex,
    reserved_ranges: Vec<Range<i32>>,
    reserved_names: Vec<String>,
}

struct PendingField {
    field: FieldIndex,
    declared: Option<Type>,
    type_name: Option<String>,
    extendee: Option<String>,
    default: Option<String>,
    packed: Option<bool>,
    oneof: Option<OneofIndex>,
}

struct PendingMethod {
    method: MethodIndex,
    input: String,
    output: String,
}

impl<'a> FileBuilder<'a> {
    fn new(pool: &'a mut PoolInner, proto: &FileDescriptorProto, syntax: Syntax) -> BuildResult<Self> {
        let file_name = proto.name().to_string();
        let file = pool.files.len() as FileIndex;
        let error = |kind| DescriptorError::new(file_name.clone(), file_name.clone(), kind);

        let mut dependencies = Vec::with_capacity(proto.dependency.len());
        for dependency in &proto.dependency {
            match pool.file_names.get(dependency) {
                Some(&index) => dependencies.push(index),
                None => return Err(error(DescriptorErrorKind::MissingDependency(dependency.clone()))),
            }
        }

        let mut public_dependencies = Vec::with_capacity(proto.public_dependency.len());
        for &position in &proto.public_dependency {
            let index = usize::try_from(position)
                .ok()
                .and_then(|p| dependencies.get(p))
                .copied()
                .ok_or_else(|| {
                    error(DescriptorErrorKind::Other(format!(
                        "invalid public dependency index {position}"
                    )))
                })?;
            public_dependencies.push(index);
        }

        let mut visible = HashSet::from([file]);
        let mut stack = dependencies.clone();
        while let Some(index) = stack.pop() {
            if visible.insert(index) {
                stack.extend(pool.files[index as usize].public_dependencies.iter().copied());
            }
        }

        let package = proto.package().to_string();
        if !package.is_empty() && !package.split('.').all(is_identifier) {
            return Err(DescriptorError::new(
                file_name.clone(),
                package.clone(),
                DescriptorErrorKind::InvalidName { name: package },
            ));
        }

        pool.files.push(FileInner {
            name: file_name.clone(),
            package: package.clone(),
            syntax,
            dependencies,
            public_dependencies,
            messages: Vec::new(),
            enums: Vec::new(),
            services: Vec::new(),
            extensions: Vec::new(),
            proto: FileDescriptorProto::default(),
        });
        pool.file_names.insert(file_name.clone(), file);
        pool.add_package(&package, file)
            .map_err(|kind| DescriptorError::new(file_name.clone(), package.clone(), kind))?;

        Ok(Self {
            first_oneof: pool.oneofs.len() as OneofIndex,
            pool,
            file,
            file_name,
            syntax,
            visible,
            messages: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        })
    }

    fn error(&self, element: &str, kind: DescriptorErrorKind) -> DescriptorError {
        DescriptorError::new(self.file_name.clone(), element, kind)
    }

    fn other(&self, element: &str, message: impl Into<String>) -> DescriptorError {
        self.error(element, DescriptorErrorKind::Other(message.into()))
    }

    fn add_symbol(&mut self, full_name: &str, symbol: SymbolIndex) -> BuildResult<()> {
        self.pool
            .add_symbol(full_name, symbol, self.file)
            .map_err(|kind| self.error(full_name, kind))
    }

    fn check_name(&self, name: &str, full_name: &str) -> BuildResult<()> {
        if is_identifier(name) {
            Ok(())
        } else {
            Err(self.error(
                full_name,
                DescriptorErrorKind::InvalidName {
                    name: name.to_string(),
                },
            ))
        }
    }

    // Raw pass

    fn build_raw(&mut self, proto: &FileDescriptorProto) -> BuildResult<()> {
        let package = proto.package().to_string();
        let file = self.file as usize;

        for message in &proto.message_type {
            let index = self.build_message(message, &package, None)?;
            self.pool.files[file].messages.push(index);
        }
        for enum_proto in &proto.enum_type {
            let index = self.build_enum(enum_proto, &package, None)?;
            self.pool.files[file].enums.push(index);
        }
        for extension in &proto.extension {
            let index = self.build_field(extension, &package, None, true, None)?;
            self.pool.files[file].extensions.push(index);
        }
        for service in &proto.service {
            let index = self.build_service(service, &package)?;
            self.pool.files[file].services.push(index);
        }
        Ok(())
    }

    fn build_message(
        &mut self,
        proto: &DescriptorProto,
        scope: &str,
        parent: Option<MessageIndex>,
    ) -> BuildResult<MessageIndex> {
        let name = proto.name();
        let full_name = join(scope, name);
        self.check_name(name, &full_name)?;

        let extension_ranges = self.extension_ranges(proto, &full_name)?;
        let index = self.pool.messages.len() as MessageIndex;
        self.pool.messages.push(MessageInner {
            name: name.to_string(),
            full_name: full_name.clone(),
            file: self.file,
            parent,
            fields: Vec::with_capacity(proto.field.len()),
            field_numbers: HashMap::new(),
            field_names: HashMap::new(),
            nested_messages: Vec::new(),
            nested_enums: Vec::new(),
            oneofs: Vec::with_capacity(proto.oneof_decl.len()),
            extension_ranges,
            extensions: Vec::new(),
            extension_numbers: BTreeMap::new(),
            is_map_entry: proto
                .options
                .as_ref()
                .and_then(|options| options.map_entry)
                .unwrap_or(false),
        });
        self.add_symbol(&full_name, SymbolIndex::Message(index))?;
        self.messages.push(PendingMessage {
            message: index,
            reserved_ranges: proto
                .reserved_range
                .iter()
                .map(|range| range.start()..range.end())
                .collect(),
            reserved_names: proto.reserved_name.clone(),
        });

        let mut oneofs = Vec::with_capacity(proto.oneof_decl.len());
        for oneof in &proto.oneof_decl {
            let oneof_full_name = join(&full_name, oneof.name());
            self.check_name(oneof.name(), &oneof_full_name)?;
            let oneof_index = self.pool.oneofs.len() as OneofIndex;
            self.pool.oneofs.push(OneofInner {
                name: oneof.name().to_string(),
                full_name: oneof_full_name.clone(),
                message: index,
                fields: Vec::new(),
                synthetic: false,
            });
            self.add_symbol(&oneof_full_name, SymbolIndex::Oneof(oneof_index))?;
            oneofs.push(oneof_index);
        }
        self.pool.messages[index as usize].oneofs = oneofs.clone();

        for field in &proto.field {
            let oneof = match field.oneof_index {
                Some(position) => Some(
                    usize::try_from(position)
                        .ok()
                        .and_then(|p| oneofs.get(p))
                        .copied()
                        .ok_or_else(|| {
                            self.other(
                                &join(&full_name, field.name()),
                                format!("oneof index {position} is out of range"),
                            )
                        })?,
                ),
                None => None,
            };
            let field_index = self.build_field(field, &full_name, Some(index), false, oneof)?;
            self.pool.messages[index as usize].fields.push(field_index);
        }

        for nested in &proto.nested_type {
            let nested_index = self.build_message(nested, &full_name, Some(index))?;
            self.pool.messages[index as usize]
                .nested_messages
                .push(nested_index);
        }
        for enum_proto in &proto.enum_type {
            let enum_index = self.build_enum(enum_proto, &full_name, Some(index))?;
            self.pool.messages[index as usize].nested_enums.push(enum_index);
        }
        for extension in &proto.extension {
            let field_index = self.build_field(extension, &full_name, Some(index), true, None)?;
            self.pool.messages[index as usize].extensions.push(field_index);
        }

        Ok(index)
    }

    fn extension_ranges(&self, proto: &DescriptorProto, full_name: &str) -> BuildResult<Vec<Range<u32>>> {
        let mut ranges: Vec<Range<u32>> = Vec::with_capacity(proto.extension_range.len());
        for range in &proto.extension_range {
            let (start, end) = (range.start(), range.end());
            if start < 1 {
                return Err(self.error(
                    full_name,
                    DescriptorErrorKind::InvalidFieldNumber {
                        number: start,
                        reason: "extension numbers must be positive integers".into(),
                    },
                ));
            }
            if i64::from(end) > i64::from(MAX_FIELD_NUMBER) + 1 {
                return Err(self.error(
                    full_name,
                    DescriptorErrorKind::InvalidFieldNumber {
                        number: end - 1,
                        reason: format!("extension numbers cannot be greater than {MAX_FIELD_NUMBER}"),
                    },
                ));
            }
            if start >= end {
                return Err(self.other(full_name, "extension range end number must be greater than start number"));
            }

            let range = start as u32..end as u32;
            if let Some(existing) = ranges
                .iter()
                .find(|existing| range.start < existing.end && existing.start < range.end)
            {
                return Err(self.error(
                    full_name,
                    DescriptorErrorKind::ExtensionRangeConflict(format!(
                        "extension range {} to {} overlaps with already-defined range {} to {}",
                        range.start,
                        range.end - 1,
                        existing.start,
                        existing.end - 1
                    )),
                ));
            }
            ranges.push(range);
        }
        Ok(ranges)
    }

    fn build_field(
        &mut self,
        proto: &FieldDescriptorProto,
        scope: &str,
        parent: Option<MessageIndex>,
        is_extension: bool,
        oneof: Option<OneofIndex>,
    ) -> BuildResult<FieldIndex> {
        let name = proto.name();
        let full_name = join(scope, name);
        self.check_name(name, &full_name)?;
        let number = self.check_field_number(proto.number(), &full_name)?;

        let cardinality = match proto.label.map(Label::try_from).transpose() {
            Ok(None | Some(Label::Optional)) => Cardinality::Optional,
            Ok(Some(Label::Repeated)) => Cardinality::Repeated,
            Ok(Some(Label::Required)) if self.syntax == Syntax::Proto3 => {
                return Err(self.other(&full_name, "required fields are not allowed in proto3"));
            }
            Ok(Some(Label::Required)) => Cardinality::Required,
            Err(_) => return Err(self.other(&full_name, "invalid field label")),
        };

        let declared = proto
            .r#type
            .map(Type::try_from)
            .transpose()
            .map_err(|_| self.other(&full_name, "invalid field type"))?;
        let kind = declared.and_then(scalar_kind).unwrap_or(KindIndex::Pending);

        let extendee = proto.extendee.clone().filter(|e| !e.is_empty());
        if is_extension {
            if extendee.is_none() {
                return Err(self.other(&full_name, "extension is missing its extendee"));
            }
            if proto.oneof_index.is_some() {
                return Err(self.other(&full_name, "extensions cannot be part of a oneof"));
            }
        } else if extendee.is_some() {
            return Err(self.other(&full_name, "extendee set for a non-extension field"));
        }

        let proto3_optional = proto.proto3_optional();
        if proto3_optional && oneof.is_none() {
            return Err(self.other(&full_name, "proto3 optional fields must be in a synthetic oneof"));
        }
        if oneof.is_some() && cardinality != Cardinality::Optional {
            return Err(self.other(&full_name, "fields in oneofs must not have labels (required / repeated)"));
        }

        let index = self.pool.fields.len() as FieldIndex;
        self.pool.fields.push(FieldInner {
            name: name.to_string(),
            full_name: full_name.clone(),
            json_name: proto
                .json_name
                .clone()
                .unwrap_or_else(|| to_lower_camel_case(name)),
            number,
            file: self.file,
            parent,
            containing: if is_extension { None } else { parent },
            is_extension,
            kind,
            is_group: declared == Some(Type::Group),
            cardinality,
            packed: false,
            oneof: None,
            proto3_optional,
            default: None,
        });
        self.add_symbol(&full_name, SymbolIndex::Field(index))?;

        self.fields.push(PendingField {
            field: index,
            declared,
            type_name: proto.type_name.clone().filter(|t| !t.is_empty()),
            extendee,
            default: proto.default_value.clone(),
            packed: proto.options.as_ref().and_then(|options| options.packed),
            oneof,
        });
        Ok(index)
    }

    fn check_field_number(&self, number: i32, full_name: &str) -> BuildResult<u32> {
        let reason = if number <= 0 {
            "field numbers must be positive integers".to_string()
        } else if number as u32 > MAX_FIELD_NUMBER {
            format!("field numbers cannot be greater than {MAX_FIELD_NUMBER}")
        } else if RESERVED_NUMBERS.contains(&number) {
            "field numbers 19000 through 19999 are reserved for the protocol buffer library implementation".to_string()
        } else {
            return Ok(number as u32);
        };
        Err(self.error(
            full_name,
            DescriptorErrorKind::InvalidFieldNumber { number, reason },
        ))
    }

    fn build_enum(
        &mut self,
        proto: &EnumDescriptorProto,
        scope: &str,
        parent: Option<MessageIndex>,
    ) -> BuildResult<EnumIndex> {
        let name = proto.name();
        let full_name = join(scope, name);
        self.check_name(name, &full_name)?;

        if proto.value.is_empty() {
            return Err(self.error(&full_name, DescriptorErrorKind::EmptyEnum));
        }
        if self.syntax == Syntax::Proto3 && proto.value[0].number() != 0 {
            return Err(self.other(&full_name, "the first enum value must be zero in proto3"));
        }

        let index = self.pool.enums.len() as EnumIndex;
        self.pool.enums.push(EnumInner {
            name: name.to_string(),
            full_name: full_name.clone(),
            file: self.file,
            parent,
            values: Vec::with_capacity(proto.value.len()),
            value_numbers: HashMap::with_capacity(proto.value.len()),
            value_names: HashMap::with_capacity(proto.value.len()),
            closed: self.syntax == Syntax::Proto2,
        });
        self.add_symbol(&full_name, SymbolIndex::Enum(index))?;

        for value in &proto.value {
            // Enum values are siblings of their enum, not children of it.
            let value_full_name = join(scope, value.name());
            self.check_name(value.name(), &value_full_name)?;

            let value_index = self.pool.enum_values.len() as u32;
            self.pool.enum_values.push(EnumValueInner {
                name: value.name().to_string(),
                full_name: value_full_name.clone(),
                number: value.number(),
                parent: index,
            });
            self.add_symbol(&value_full_name, SymbolIndex::EnumValue(value_index))?;

            let enum_inner = &mut self.pool.enums[index as usize];
            enum_inner.values.push(value_index);
            enum_inner
                .value_names
                .insert(value.name().to_string(), value_index);
            self.pool.add_enum_value_by_number(value_index);
        }

        Ok(index)
    }

    fn build_service(&mut self, proto: &ServiceDescriptorProto, scope: &str) -> BuildResult<ServiceIndex> {
        let name = proto.name();
        let full_name = join(scope, name);
        self.check_name(name, &full_name)?;

        let index = self.pool.services.len() as ServiceIndex;
        self.pool.services.push(ServiceInner {
            name: name.to_string(),
            full_name: full_name.clone(),
            file: self.file,
            methods: Vec::with_capacity(proto.method.len()),
        });
        self.add_symbol(&full_name, SymbolIndex::Service(index))?;

        for method in &proto.method {
            let method_full_name = join(&full_name, method.name());
            self.check_name(method.name(), &method_full_name)?;

            let method_index = self.pool.methods.len() as MethodIndex;
            self.pool.methods.push(MethodInner {
                name: method.name().to_string(),
                full_name: method_full_name.clone(),
                service: index,
                input: None,
                output: None,
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
            });
            self.add_symbol(&method_full_name, SymbolIndex::Method(method_index))?;
            self.pool.services[index as usize].methods.push(method_index);
            self.methods.push(PendingMethod {
                method: method_index,
                input: method.input_type().to_string(),
                output: method.output_type().to_string(),
            });
        }

        Ok(index)
    }

    // Cross-link pass

    fn cross_link(&mut self) -> BuildResult<()> {
        let fields = std::mem::take(&mut self.fields);
        for pending in &fields {
            self.link_field(pending)?;
        }

        let messages = std::mem::take(&mut self.messages);
        for pending in &messages {
            self.index_fields(pending)?;
        }

        for oneof in self.first_oneof as usize..self.pool.oneofs.len() {
            let inner = &self.pool.oneofs[oneof];
            match inner.fields.as_slice() {
                [] => return Err(self.other(&inner.full_name, "oneof must have at least one field")),
                [only] => {
                    let synthetic = self.pool.fields[*only as usize].proto3_optional;
                    self.pool.oneofs[oneof].synthetic = synthetic;
                }
                _ => {}
            }
        }

        let methods = std::mem::take(&mut self.methods);
        for pending in &methods {
            let full_name = self.pool.methods[pending.method as usize].full_name.clone();
            let input = self.resolve_message(&pending.input, &full_name)?;
            let output = self.resolve_message(&pending.output, &full_name)?;
            let method = &mut self.pool.methods[pending.method as usize];
            method.input = Some(input);
            method.output = Some(output);
        }
        Ok(())
    }

    /// Resolves a type reference from inside `relative_to`, enforcing imports
    fn resolve_type(&self, name: &str, relative_to: &str) -> BuildResult<SymbolIndex> {
        let Some((resolved, symbol)) = self
            .pool
            .lookup_symbol(name, relative_to, SymbolFilter::Types)
        else {
            return Err(self.error(
                relative_to,
                DescriptorErrorKind::UnresolvedType {
                    name: name.to_string(),
                },
            ));
        };
        if !SymbolFilter::Types.accepts(symbol) {
            return Err(self.error(
                relative_to,
                DescriptorErrorKind::InvalidType {
                    name: name.to_string(),
                    expected: "a type",
                },
            ));
        }
        let file = self.pool.symbol_file(symbol);
        if !self.visible.contains(&file) {
            return Err(self.error(
                relative_to,
                DescriptorErrorKind::NotImported {
                    name: name.to_string(),
                    file: self.pool.files[file as usize].name.clone(),
                },
            ));
        }
        trace!(from = relative_to, name, resolved = %resolved, "resolved type reference");
        Ok(symbol)
    }

    fn resolve_message(&self, name: &str, relative_to: &str) -> BuildResult<MessageIndex> {
        match self.resolve_type(name, relative_to)? {
            SymbolIndex::Message(index) => Ok(index),
            _ => Err(self.error(
                relative_to,
                DescriptorErrorKind::InvalidType {
                    name: name.to_string(),
                    expected: "a message type",
                },
            )),
        }
    }

    fn link_field(&mut self, pending: &PendingField) -> BuildResult<()> {
        let index = pending.field as usize;
        let full_name = self.pool.fields[index].full_name.clone();

        if let Some(extendee) = &pending.extendee {
            let target = self.resolve_message(extendee, &full_name)?;
            self.link_extension(pending.field, target, &full_name)?;
        }

        let kind = match (&pending.type_name, pending.declared) {
            (Some(_), Some(declared)) if scalar_kind(declared).is_some() => {
                return Err(self.other(&full_name, "field with primitive type has type_name"));
            }
            (Some(type_name), declared) => {
                match (self.resolve_type(type_name, &full_name)?, declared) {
                    (SymbolIndex::Message(m), None | Some(Type::Message | Type::Group)) => {
                        KindIndex::Message(m)
                    }
                    (SymbolIndex::Enum(e), None | Some(Type::Enum)) => KindIndex::Enum(e),
                    (_, Some(Type::Enum)) => {
                        return Err(self.error(
                            &full_name,
                            DescriptorErrorKind::InvalidType {
                                name: type_name.clone(),
                                expected: "an enum type",
                            },
                        ));
                    }
                    _ => {
                        return Err(self.error(
                            &full_name,
                            DescriptorErrorKind::InvalidType {
                                name: type_name.clone(),
                                expected: "a message type",
                            },
                        ));
                    }
                }
            }
            (None, Some(declared)) => match scalar_kind(declared) {
                Some(kind) => kind,
                None => {
                    return Err(self.other(&full_name, "field with message or enum type is missing type_name"));
                }
            },
            (None, None) => {
                return Err(self.other(&full_name, "field has neither a type nor a type_name"));
            }
        };

        if let KindIndex::Enum(e) = kind {
            let field = &self.pool.fields[index];
            if !field.is_extension
                && self.syntax == Syntax::Proto3
                && self.pool.enums[e as usize].closed
            {
                return Err(self.other(
                    &full_name,
                    format!(
                        "enum type \"{}\" is not a proto3 enum, but is used in a proto3 message",
                        self.pool.enums[e as usize].full_name
                    ),
                ));
            }
        }

        let field = &self.pool.fields[index];
        let repeated = field.cardinality == Cardinality::Repeated;
        let packable = repeated && !field.is_group && is_packable(kind);
        if pending.packed == Some(true) && !packable {
            return Err(self.other(&full_name, "[packed = true] can only be specified for repeated primitive fields"));
        }
        let packed = packable
            && match self.syntax {
                Syntax::Proto2 => pending.packed == Some(true),
                Syntax::Proto3 => pending.packed != Some(false),
            };

        let default = match &pending.default {
            Some(text) => Some(self.parse_default(kind, repeated, text, &full_name)?),
            None => None,
        };

        let field = &mut self.pool.fields[index];
        field.kind = kind;
        field.packed = packed;
        field.default = default;
        if let Some(oneof) = pending.oneof {
            field.oneof = Some(oneof);
            self.pool.oneofs[oneof as usize].fields.push(pending.field);
        }
        Ok(())
    }

    fn link_extension(&mut self, field: FieldIndex, target: MessageIndex, full_name: &str) -> BuildResult<()> {
        let number = self.pool.fields[field as usize].number;
        let extendee = &self.pool.messages[target as usize];
        if !extendee.extension_ranges.iter().any(|r| r.contains(&number)) {
            return Err(self.error(
                full_name,
                DescriptorErrorKind::ExtensionNumberOutOfRange {
                    extendee: extendee.full_name.clone(),
                    number,
                },
            ));
        }

        let existing = extendee.extension_numbers.get(&number).copied();
        if let Some(existing) = existing {
            return Err(self.error(
                full_name,
                DescriptorErrorKind::DuplicateFieldNumber {
                    number,
                    message: extendee.full_name.clone(),
                    existing: self.pool.fields[existing as usize].full_name.clone(),
                },
            ));
        }

        self.pool.messages[target as usize]
            .extension_numbers
            .insert(number, field);
        self.pool.fields[field as usize].containing = Some(target);
        trace!(extension = full_name, number, "linked extension");
        Ok(())
    }

    /// Builds the per-message number and name indexes
    fn index_fields(&mut self, pending: &PendingMessage) -> BuildResult<()> {
        let message = &self.pool.messages[pending.message as usize];
        let mut numbers = HashMap::with_capacity(message.fields.len());
        let mut names = HashMap::with_capacity(message.fields.len());

        for &index in &message.fields {
            let field = &self.pool.fields[index as usize];
            if let Some(&existing) = numbers.get(&field.number) {
                let existing: &FieldInner = &self.pool.fields[existing as usize];
                return Err(self.error(
                    &field.full_name,
                    DescriptorErrorKind::DuplicateFieldNumber {
                        number: field.number,
                        message: message.full_name.clone(),
                        existing: existing.name.clone(),
                    },
                ));
            }
            if let Some(range) = message
                .extension_ranges
                .iter()
                .find(|range| range.contains(&field.number))
            {
                return Err(self.error(
                    &message.full_name,
                    DescriptorErrorKind::ExtensionRangeConflict(format!(
                        "extension range {} to {} includes field \"{}\" ({})",
                        range.start,
                        range.end - 1,
                        field.name,
                        field.number
                    )),
                ));
            }
            if pending
                .reserved_ranges
                .iter()
                .any(|range| range.contains(&(field.number as i32)))
            {
                return Err(self.other(
                    &field.full_name,
                    format!("field \"{}\" uses reserved number {}", field.name, field.number),
                ));
            }
            if pending.reserved_names.iter().any(|name| *name == field.name) {
                return Err(self.other(
                    &field.full_name,
                    format!("field name \"{}\" is reserved", field.name),
                ));
            }
            numbers.insert(field.number, index);
            names.insert(field.name.clone(), index);
        }

        let message = &mut self.pool.messages[pending.message as usize];
        message.field_numbers = numbers;
        message.field_names = names;
        Ok(())
    }

    fn parse_default(
        &self,
        kind: KindIndex,
        repeated: bool,
        text: &str,
        full_name: &str,
    ) -> BuildResult<DefaultValue> {
        let invalid = |reason: &str| {
            self.error(
                full_name,
                DescriptorErrorKind::InvalidDefault {
                    value: text.to_string(),
                    reason: reason.to_string(),
                },
            )
        };

        if self.syntax == Syntax::Proto3 {
            return Err(invalid("explicit default values are not allowed in proto3"));
        }
        if repeated {
            return Err(invalid("repeated fields can't have default values"));
        }

        let value = match kind {
            KindIndex::Int32 | KindIndex::Sint32 | KindIndex::Sfixed32 => parse_integer(text)
                .and_then(|v| i32::try_from(v).ok())
                .map(DefaultValue::I32),
            KindIndex::Int64 | KindIndex::Sint64 | KindIndex::Sfixed64 => parse_integer(text)
                .and_then(|v| i64::try_from(v).ok())
                .map(DefaultValue::I64),
            KindIndex::Uint32 | KindIndex::Fixed32 => parse_integer(text)
                .and_then(|v| u32::try_from(v).ok())
                .map(DefaultValue::U32),
            KindIndex::Uint64 | KindIndex::Fixed64 => parse_integer(text)
                .and_then(|v| u64::try_from(v).ok())
                .map(DefaultValue::U64),
            KindIndex::Float => parse_float(text).map(|v| DefaultValue::F32(v as f32)),
            KindIndex::Double => parse_float(text).map(DefaultValue::F64),
            KindIndex::Bool => match text {
                "true" => Some(DefaultValue::Bool(true)),
                "false" => Some(DefaultValue::Bool(false)),
                _ => None,
            },
            KindIndex::String => Some(DefaultValue::String(text.to_string())),
            KindIndex::Bytes => unescape_bytes(text).map(|b| DefaultValue::Bytes(Bytes::from(b))),
            KindIndex::Enum(e) => {
                let enum_inner = &self.pool.enums[e as usize];
                match enum_inner.value_names.get(text) {
                    Some(&value) => Some(DefaultValue::EnumNumber(
                        self.pool.enum_values[value as usize].number,
                    )),
                    None => {
                        return Err(invalid(&format!(
                            "enum \"{}\" has no value with this name",
                            enum_inner.full_name
                        )));
                    }
                }
            }
            KindIndex::Message(_) | KindIndex::Pending => {
                return Err(invalid("messages can't have default values"));
            }
        };
        value.ok_or_else(|| invalid("not a valid value for the field type"))
    }
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn scalar_kind(ty: Type) -> Option<KindIndex> {
    Some(match ty {
        Type::Double => KindIndex::Double,
        Type::Float => KindIndex::Float,
        Type::Int64 => KindIndex::Int64,
        Type::Uint64 => KindIndex::Uint64,
        Type::Int32 => KindIndex::Int32,
        Type::Fixed64 => KindIndex::Fixed64,
        Type::Fixed32 => KindIndex::Fixed32,
        Type::Bool => KindIndex::Bool,
        Type::String => KindIndex::String,
        Type::Bytes => KindIndex::Bytes,
        Type::Uint32 => KindIndex::Uint32,
        Type::Sfixed32 => KindIndex::Sfixed32,
        Type::Sfixed64 => KindIndex::Sfixed64,
        Type::Sint32 => KindIndex::Sint32,
        Type::Sint64 => KindIndex::Sint64,
        Type::Group | Type::Message | Type::Enum => return None,
    })
}

fn is_packable(kind: KindIndex) -> bool {
    !matches!(
        kind,
        KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) | KindIndex::Pending
    )
}

/// Convert a snake_case name to lowerCamelCase
fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Parses a decimal, `0x` hexadecimal or `0` octal integer
fn parse_integer(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i128::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Reverses C-style escaping of a `bytes` default
fn unescape_bytes(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }

        let escape = *bytes.get(i)?;
        i += 1;
        let value = match escape {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'v' => 0x0B,
            b'\\' | b'\'' | b'"' | b'?' => escape,
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                for _ in 0..2 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                u8::try_from(value).ok()?
            }
            b'x' | b'X' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match bytes.get(i).and_then(|&d| char::from(d).to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            i += 1;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return None;
                }
                value as u8
            }
            _ => return None,
        };
        out.push(value);
    }

    Some(out)
}
