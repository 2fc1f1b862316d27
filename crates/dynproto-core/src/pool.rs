//! Descriptor pool: the symbol table every descriptor lives in.
//!
//! A [`DescriptorPool`] is a cheap, clonable handle over an immutable snapshot.
//! Registration takes `&mut self`, builds the new file into a private copy of
//! the snapshot, and swaps the copy in only when the whole file (or file set)
//! built and cross-linked successfully. Clones taken earlier keep seeing the
//! old snapshot; descriptor handles stay valid because the pool is append-only.
//!
//! ## Example
//!
//! ```no_run
//! use dynproto_core::DescriptorPool;
//!
//! # fn example(bytes: &[u8]) -> dynproto_core::Result<()> {
//! let mut pool = DescriptorPool::new();
//! pool.decode_file_descriptor_set(bytes)?;
//!
//! if let Some(message) = pool.get_message_by_name("acme.Order") {
//!     for field in message.fields() {
//!         println!("{} = {}", field.name(), field.number());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::descriptor::{
    build, EnumDescriptor, EnumInner, EnumValueDescriptor, EnumValueInner, FieldDescriptor,
    FieldInner, FileDescriptor, FileIndex, FileInner, MessageDescriptor, MessageInner,
    MethodDescriptor, MethodInner, OneofDescriptor, OneofInner, ServiceDescriptor, ServiceInner,
};
use crate::error::{DescriptorError, DescriptorErrorKind, Result};
use bytes::Buf;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, trace};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A pool of cross-linked descriptors
#[derive(Clone)]
pub struct DescriptorPool {
    inner: Arc<PoolInner>,
}

/// Index form of a registered symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolIndex {
    Package(FileIndex),
    Message(u32),
    Field(u32),
    Oneof(u32),
    Enum(u32),
    EnumValue(u32),
    Service(u32),
    Method(u32),
}

impl SymbolIndex {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            SymbolIndex::Package(_) => "a package",
            SymbolIndex::Message(_) => "a message type",
            SymbolIndex::Field(_) => "a field",
            SymbolIndex::Oneof(_) => "a oneof",
            SymbolIndex::Enum(_) => "an enum type",
            SymbolIndex::EnumValue(_) => "an enum value",
            SymbolIndex::Service(_) => "a service",
            SymbolIndex::Method(_) => "a method",
        }
    }
}

/// Which kinds of symbol a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolFilter {
    All,
    /// Messages and enums
    Types,
    /// Symbols that may contain other symbols
    Aggregates,
}

impl SymbolFilter {
    pub(crate) fn accepts(self, symbol: SymbolIndex) -> bool {
        match self {
            SymbolFilter::All => true,
            SymbolFilter::Types => {
                matches!(symbol, SymbolIndex::Message(_) | SymbolIndex::Enum(_))
            }
            SymbolFilter::Aggregates => matches!(
                symbol,
                SymbolIndex::Package(_)
                    | SymbolIndex::Message(_)
                    | SymbolIndex::Enum(_)
                    | SymbolIndex::Service(_)
            ),
        }
    }
}

/// Snapshot storage shared by every handle into one pool version
#[derive(Debug, Clone, Default)]
pub(crate) struct PoolInner {
    pub(crate) id: u64,
    pub(crate) files: Vec<FileInner>,
    pub(crate) messages: Vec<MessageInner>,
    pub(crate) fields: Vec<FieldInner>,
    pub(crate) oneofs: Vec<OneofInner>,
    pub(crate) enums: Vec<EnumInner>,
    pub(crate) enum_values: Vec<EnumValueInner>,
    pub(crate) services: Vec<ServiceInner>,
    pub(crate) methods: Vec<MethodInner>,
    pub(crate) symbols: HashMap<String, SymbolIndex>,
    pub(crate) file_names: HashMap<String, FileIndex>,
}

impl PoolInner {
    /// File that declares `symbol`
    pub(crate) fn symbol_file(&self, symbol: SymbolIndex) -> FileIndex {
        match symbol {
            SymbolIndex::Package(file) => file,
            SymbolIndex::Message(i) => self.messages[i as usize].file,
            SymbolIndex::Field(i) => self.fields[i as usize].file,
            SymbolIndex::Oneof(i) => {
                let message = self.oneofs[i as usize].message;
                self.messages[message as usize].file
            }
            SymbolIndex::Enum(i) => self.enums[i as usize].file,
            SymbolIndex::EnumValue(i) => {
                let parent = self.enum_values[i as usize].parent;
                self.enums[parent as usize].file
            }
            SymbolIndex::Service(i) => self.services[i as usize].file,
            SymbolIndex::Method(i) => {
                let service = self.methods[i as usize].service;
                self.services[service as usize].file
            }
        }
    }

    /// Binds `name` to `symbol`.
    ///
    /// Every kind shares one namespace; the only tolerated collision is a
    /// package declared again by another file.
    pub(crate) fn add_symbol(
        &mut self,
        name: &str,
        symbol: SymbolIndex,
        file: FileIndex,
    ) -> std::result::Result<(), DescriptorErrorKind> {
        if let Some(&existing) = self.symbols.get(name) {
            if matches!(
                (existing, symbol),
                (SymbolIndex::Package(_), SymbolIndex::Package(_))
            ) {
                return Ok(());
            }
            let owner = self.symbol_file(existing);
            let defined_in = (owner != file).then(|| self.files[owner as usize].name.clone());
            return Err(DescriptorErrorKind::DuplicateSymbol {
                name: name.to_string(),
                defined_in,
            });
        }
        trace!(name, kind = symbol.describe(), "registered symbol");
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Registers `package` and each of its parent packages
    pub(crate) fn add_package(
        &mut self,
        package: &str,
        file: FileIndex,
    ) -> std::result::Result<(), DescriptorErrorKind> {
        if package.is_empty() {
            return Ok(());
        }
        let mut end = 0;
        for part in package.split('.') {
            end += part.len();
            self.add_symbol(&package[..end], SymbolIndex::Package(file), file)?;
            end += 1;
        }
        Ok(())
    }

    /// Records `value` under its number unless an earlier value already claimed it
    pub(crate) fn add_enum_value_by_number(&mut self, value: u32) {
        let inner = &self.enum_values[value as usize];
        let (parent, number) = (inner.parent, inner.number);
        self.enums[parent as usize]
            .value_numbers
            .entry(number)
            .or_insert(value);
    }

    pub(crate) fn find(&self, name: &str, filter: SymbolFilter) -> Option<SymbolIndex> {
        self.symbols
            .get(name)
            .copied()
            .filter(|&symbol| filter.accepts(symbol))
    }

    /// Resolves `name` as written inside the scope `relative_to`.
    ///
    /// A leading dot makes the name fully qualified. Otherwise each enclosing
    /// scope of `relative_to` is tried from the innermost outward. For a
    /// compound name `A.B.C` the walk stops at the first scope defining an
    /// aggregate `A`, and only that scope is searched for the full name.
    /// Returns the resolved fully-qualified name with the symbol.
    pub(crate) fn lookup_symbol(
        &self,
        name: &str,
        relative_to: &str,
        filter: SymbolFilter,
    ) -> Option<(String, SymbolIndex)> {
        if let Some(full_name) = name.strip_prefix('.') {
            return self
                .find(full_name, filter)
                .map(|symbol| (full_name.to_string(), symbol));
        }

        let (first_part, compound) = match name.find('.') {
            Some(dot) => (&name[..dot], true),
            None => (name, false),
        };

        let mut scope = relative_to.to_string();
        loop {
            let Some(dot) = scope.rfind('.') else {
                return self.find(name, filter).map(|symbol| (name.to_string(), symbol));
            };

            scope.truncate(dot + 1);
            scope.push_str(first_part);
            if let Some(found) = self.find(&scope, SymbolFilter::Aggregates) {
                if !compound {
                    // The caller reports a kind mismatch; shadowing still applies.
                    return Some((scope, found));
                }
                scope.truncate(dot + 1);
                scope.push_str(name);
                return self.find(&scope, filter).map(|symbol| (scope, symbol));
            }
            scope.truncate(dot);
        }
    }

    /// Registers one file into this (staging) snapshot
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            files: self.files.len(),
            messages: self.messages.len(),
            fields: self.fields.len(),
            oneofs: self.oneofs.len(),
            enums: self.enums.len(),
            enum_values: self.enum_values.len(),
            services: self.services.len(),
            methods: self.methods.len(),
        }
    }

    /// Drops everything registered after `checkpoint`
    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.files.truncate(checkpoint.files);
        self.messages.truncate(checkpoint.messages);
        self.fields.truncate(checkpoint.fields);
        self.oneofs.truncate(checkpoint.oneofs);
        self.enums.truncate(checkpoint.enums);
        self.enum_values.truncate(checkpoint.enum_values);
        self.services.truncate(checkpoint.services);
        self.methods.truncate(checkpoint.methods);

        self.file_names
            .retain(|_, file| (*file as usize) < checkpoint.files);
        self.symbols.retain(|_, symbol| checkpoint.contains(*symbol));
        // Extensions of older messages may have been linked before the failure.
        for message in &mut self.messages {
            message
                .extension_numbers
                .retain(|_, field| (*field as usize) < checkpoint.fields);
        }
    }

    fn register_file(&mut self, proto: FileDescriptorProto) -> Result<FileIndex> {
        if let Some(&existing) = self.file_names.get(proto.name()) {
            if self.files[existing as usize].proto == proto {
                trace!(file = proto.name(), "file already registered");
                return Ok(existing);
            }
            let name = proto.name().to_string();
            return Err(DescriptorError::new(
                name.clone(),
                name.clone(),
                DescriptorErrorKind::DuplicateFile(name),
            )
            .into());
        }
        Ok(build::build_file(self, proto)?)
    }
}

/// Table lengths recorded before an in-place build
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    files: usize,
    messages: usize,
    fields: usize,
    oneofs: usize,
    enums: usize,
    enum_values: usize,
    services: usize,
    methods: usize,
}

impl Checkpoint {
    /// True if `symbol` was registered before the checkpoint
    fn contains(&self, symbol: SymbolIndex) -> bool {
        let (index, len) = match symbol {
            SymbolIndex::Package(file) => (file, self.files),
            SymbolIndex::Message(i) => (i, self.messages),
            SymbolIndex::Field(i) => (i, self.fields),
            SymbolIndex::Oneof(i) => (i, self.oneofs),
            SymbolIndex::Enum(i) => (i, self.enums),
            SymbolIndex::EnumValue(i) => (i, self.enum_values),
            SymbolIndex::Service(i) => (i, self.services),
            SymbolIndex::Method(i) => (i, self.methods),
        };
        (index as usize) < len
    }
}

/// A symbol resolved from the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// A package name
    Package(String),
    /// A message type
    Message(MessageDescriptor),
    /// A field or extension
    Field(FieldDescriptor),
    /// A oneof
    Oneof(OneofDescriptor),
    /// An enum type
    Enum(EnumDescriptor),
    /// An enum value
    EnumValue(EnumValueDescriptor),
    /// A service
    Service(ServiceDescriptor),
    /// A service method
    Method(MethodDescriptor),
}

/// Descriptor types that can be extracted from a [`Symbol`]
pub trait FromSymbol: Sized {
    /// Returns the descriptor if the symbol has this type
    fn from_symbol(symbol: Symbol) -> Option<Self>;
}

macro_rules! impl_from_symbol {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromSymbol for $ty {
                fn from_symbol(symbol: Symbol) -> Option<Self> {
                    match symbol {
                        Symbol::$variant(desc) => Some(desc),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_symbol!(
    Message => MessageDescriptor,
    Field => FieldDescriptor,
    Oneof => OneofDescriptor,
    Enum => EnumDescriptor,
    EnumValue => EnumValueDescriptor,
    Service => ServiceDescriptor,
    Method => MethodDescriptor,
);

impl DescriptorPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                ..PoolInner::default()
            }),
        }
    }

    /// Creates a pool holding every file of `set`
    pub fn from_file_descriptor_set(set: FileDescriptorSet) -> Result<Self> {
        let mut pool = Self::new();
        pool.add_file_descriptor_set(set)?;
        Ok(pool)
    }

    pub(crate) fn inner(&self) -> &PoolInner {
        &self.inner
    }

    /// Runs `build` against the pool's tables so that it takes effect only on success.
    ///
    /// When no handle shares the current snapshot the tables are extended in
    /// place and truncated again on failure. Otherwise `build` works on a copy
    /// that replaces the snapshot once it succeeds, leaving existing handles on
    /// the old one.
    fn stage<T>(&mut self, build: impl FnOnce(&mut PoolInner) -> Result<T>) -> Result<T> {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            let checkpoint = inner.checkpoint();
            return build(inner).map_err(|err| {
                inner.rollback(checkpoint);
                err
            });
        }

        let mut staged = (*self.inner).clone();
        let value = build(&mut staged)?;
        self.inner = Arc::new(staged);
        Ok(value)
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Builds, cross-links and registers one file.
    ///
    /// Every import must already be registered. Adding a file identical to a
    /// registered one returns the existing descriptor.
    pub fn add_file(&mut self, proto: FileDescriptorProto) -> Result<FileDescriptor> {
        let name = proto.name().to_string();
        let index = self.stage(|inner| inner.register_file(proto))?;
        debug!(file = %name, "registered file");
        Ok(FileDescriptor::new(self.clone(), index))
    }

    /// Decodes a serialized `FileDescriptorProto` and registers it
    pub fn add_serialized_file(&mut self, bytes: &[u8]) -> Result<FileDescriptor> {
        let proto = FileDescriptorProto::decode(bytes)?;
        self.add_file(proto)
    }

    /// Registers every file of `set`.
    ///
    /// Files are registered in dependency order regardless of their order in
    /// the set. Either all files are registered or none are.
    pub fn add_file_descriptor_set(&mut self, set: FileDescriptorSet) -> Result<Vec<FileDescriptor>> {
        let order = dependency_order(&set.file)?;
        let mut slots: Vec<Option<FileDescriptorProto>> = set.file.into_iter().map(Some).collect();

        let indices = self.stage(|inner| {
            let mut indices = Vec::with_capacity(order.len());
            for position in order {
                if let Some(proto) = slots[position].take() {
                    indices.push(inner.register_file(proto)?);
                }
            }
            Ok(indices)
        })?;
        debug!(files = indices.len(), "registered file descriptor set");

        Ok(indices
            .into_iter()
            .map(|index| FileDescriptor::new(self.clone(), index))
            .collect())
    }

    /// Decodes a serialized `FileDescriptorSet` and registers its files
    pub fn decode_file_descriptor_set(&mut self, buf: impl Buf) -> Result<()> {
        let set = FileDescriptorSet::decode(buf)?;
        self.add_file_descriptor_set(set)?;
        Ok(())
    }

    /// Registered files, in registration order
    pub fn files(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        (0..self.inner.files.len() as u32).map(|i| FileDescriptor::new(self.clone(), i))
    }

    /// Every message type, nested ones included, in registration order
    pub fn all_messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len() as u32).map(|i| MessageDescriptor::new(self.clone(), i))
    }

    /// Every enum type, nested ones included, in registration order
    pub fn all_enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        (0..self.inner.enums.len() as u32).map(|i| EnumDescriptor::new(self.clone(), i))
    }

    /// Every extension, in registration order
    pub fn all_extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.inner
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_extension)
            .map(|(i, _)| FieldDescriptor::new(self.clone(), i as u32))
    }

    /// Looks up a file by name
    pub fn get_file_by_name(&self, name: &str) -> Option<FileDescriptor> {
        self.inner
            .file_names
            .get(name)
            .map(|&i| FileDescriptor::new(self.clone(), i))
    }

    /// Looks up a message by fully-qualified name
    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        self.find(name)
    }

    /// Looks up an enum by fully-qualified name
    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        self.find(name)
    }

    /// Looks up an extension by fully-qualified name
    pub fn get_extension_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.find::<FieldDescriptor>(name)
            .filter(FieldDescriptor::is_extension)
    }

    /// Looks up a service by fully-qualified name
    pub fn get_service_by_name(&self, name: &str) -> Option<ServiceDescriptor> {
        self.find(name)
    }

    /// Looks up any symbol by fully-qualified name (no leading dot)
    pub fn find_symbol(&self, name: &str) -> Option<Symbol> {
        self.inner
            .find(name, SymbolFilter::All)
            .map(|symbol| self.to_symbol(name, symbol))
    }

    /// Looks up a symbol of a specific descriptor type.
    ///
    /// Returns `None` both when the name is unbound and when it names a
    /// different kind of symbol.
    pub fn find<T: FromSymbol>(&self, name: &str) -> Option<T> {
        self.find_symbol(name).and_then(T::from_symbol)
    }

    /// Resolves `name` as if written inside the scope `relative_to`
    pub fn lookup_symbol(&self, name: &str, relative_to: &str) -> Option<Symbol> {
        self.inner
            .lookup_symbol(name, relative_to, SymbolFilter::All)
            .map(|(full_name, symbol)| self.to_symbol(&full_name, symbol))
    }

    /// Field of `message` with `number`: declared fields first, then extensions
    /// known to this pool.
    pub fn find_field_by_number(
        &self,
        message: &MessageDescriptor,
        number: u32,
    ) -> Option<FieldDescriptor> {
        let current = self.current(message);
        current
            .get_field(number)
            .or_else(|| current.get_extension(number))
    }

    /// First declared value of `enum_desc` with `number`
    pub fn find_enum_value_by_number(
        &self,
        enum_desc: &EnumDescriptor,
        number: i32,
    ) -> Option<EnumValueDescriptor> {
        enum_desc.get_value(number)
    }

    /// Re-targets a handle from an older snapshot of this pool at this snapshot
    fn current(&self, message: &MessageDescriptor) -> MessageDescriptor {
        if message.parent_pool().id() == self.id()
            && (message.index() as usize) < self.inner.messages.len()
        {
            MessageDescriptor::new(self.clone(), message.index())
        } else {
            message.clone()
        }
    }

    fn to_symbol(&self, name: &str, symbol: SymbolIndex) -> Symbol {
        let pool = self.clone();
        match symbol {
            SymbolIndex::Package(_) => Symbol::Package(name.to_string()),
            SymbolIndex::Message(i) => Symbol::Message(MessageDescriptor::new(pool, i)),
            SymbolIndex::Field(i) => Symbol::Field(FieldDescriptor::new(pool, i)),
            SymbolIndex::Oneof(i) => Symbol::Oneof(OneofDescriptor::new(pool, i)),
            SymbolIndex::Enum(i) => Symbol::Enum(EnumDescriptor::new(pool, i)),
            SymbolIndex::EnumValue(i) => Symbol::EnumValue(EnumValueDescriptor::new(pool, i)),
            SymbolIndex::Service(i) => Symbol::Service(ServiceDescriptor::new(pool, i)),
            SymbolIndex::Method(i) => Symbol::Method(MethodDescriptor::new(pool, i)),
        }
    }

    /// A snapshot of the process-wide pool
    pub fn global() -> DescriptorPool {
        global_pool()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decodes a serialized `FileDescriptorSet` into the process-wide pool
    pub fn decode_global_file_descriptor_set(buf: impl Buf) -> Result<()> {
        let mut pool = global_pool()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pool.decode_file_descriptor_set(buf)
    }

    /// Registers a serialized `FileDescriptorProto` in the process-wide pool
    pub fn add_global_serialized_file(bytes: &[u8]) -> Result<FileDescriptor> {
        let mut pool = global_pool()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pool.add_serialized_file(bytes)
    }
}

impl Default for DescriptorPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("files", &self.inner.files.len())
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .finish()
    }
}

fn global_pool() -> &'static Mutex<DescriptorPool> {
    static GLOBAL: OnceLock<Mutex<DescriptorPool>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(DescriptorPool::new()))
}

/// Orders `files` so that every file comes after the set members it imports.
///
/// Imports not present in the set are left for the pool to resolve.
fn dependency_order(files: &[FileDescriptorProto]) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Visiting,
        Done,
    }

    fn visit(
        position: usize,
        files: &[FileDescriptorProto],
        by_name: &HashMap<&str, usize>,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[position] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = stack.iter().position(|&p| p == position).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..]
                    .iter()
                    .map(|&p| files[p].name().to_string())
                    .collect();
                cycle.push(files[position].name().to_string());
                let name = files[position].name().to_string();
                return Err(DescriptorError::new(
                    name.clone(),
                    name,
                    DescriptorErrorKind::DependencyCycle(cycle),
                )
                .into());
            }
            Mark::New => {}
        }

        marks[position] = Mark::Visiting;
        stack.push(position);
        for dependency in &files[position].dependency {
            if let Some(&next) = by_name.get(dependency.as_str()) {
                visit(next, files, by_name, marks, stack, order)?;
            }
        }
        stack.pop();
        marks[position] = Mark::Done;
        order.push(position);
        Ok(())
    }

    let mut by_name = HashMap::with_capacity(files.len());
    for (position, file) in files.iter().enumerate() {
        by_name.entry(file.name()).or_insert(position);
    }

    let mut marks = vec![Mark::New; files.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(files.len());
    for position in 0..files.len() {
        visit(position, files, &by_name, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use prost_types::{field_descriptor_proto::Type, DescriptorProto, FieldDescriptorProto};

    fn file(name: &str, package: &str, deps: &[&str], messages: Vec<DescriptorProto>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some(package.to_string()),
            dependency: deps.iter().map(|d| d.to_string()).collect(),
            message_type: messages,
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }
    }

    fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(Type::Message as i32),
            type_name: Some(type_name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_lookup_innermost_scope_first() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file(
            "a.proto",
            "pkg",
            &[],
            vec![
                message("Inner", vec![]),
                DescriptorProto {
                    name: Some("Outer".into()),
                    nested_type: vec![message("Inner", vec![])],
                    ..Default::default()
                },
            ],
        ))
        .unwrap();

        let inner = pool.inner();
        let (name, _) = inner
            .lookup_symbol("Inner", "pkg.Outer.field", SymbolFilter::Types)
            .unwrap();
        assert_eq!(name, "pkg.Outer.Inner");

        let (name, _) = inner
            .lookup_symbol("Inner", "pkg.Other.field", SymbolFilter::Types)
            .unwrap();
        assert_eq!(name, "pkg.Inner");

        let (name, _) = inner
            .lookup_symbol(".pkg.Inner", "pkg.Outer.field", SymbolFilter::Types)
            .unwrap();
        assert_eq!(name, "pkg.Inner");
    }

    #[test]
    fn test_compound_lookup_commits_to_first_scope() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file(
            "a.proto",
            "pkg",
            &[],
            vec![
                DescriptorProto {
                    name: Some("A".into()),
                    nested_type: vec![message("B", vec![])],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Scope".into()),
                    nested_type: vec![message("A", vec![])],
                    ..Default::default()
                },
            ],
        ))
        .unwrap();

        // `Scope.A` shadows `pkg.A` and has no `B`, so the lookup fails rather
        // than falling back to `pkg.A.B`.
        assert!(pool.lookup_symbol("A.B", "pkg.Scope.field").is_none());
        assert!(matches!(
            pool.lookup_symbol("A.B", "pkg.Other.field"),
            Some(Symbol::Message(m)) if m.full_name() == "pkg.A.B"
        ));
    }

    #[test]
    fn test_failed_file_leaves_pool_untouched() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("base.proto", "pkg", &[], vec![message("Base", vec![])]))
            .unwrap();

        let broken = file(
            "broken.proto",
            "pkg",
            &["base.proto"],
            vec![
                message("Good", vec![]),
                message("Bad", vec![message_field("missing", 1, "DoesNotExist")]),
            ],
        );
        let err = pool.add_file(broken).unwrap_err();
        let descriptor_err = err.as_descriptor_error().unwrap();
        assert_eq!(descriptor_err.element, "pkg.Bad.missing");
        assert!(matches!(
            descriptor_err.kind,
            DescriptorErrorKind::UnresolvedType { .. }
        ));

        assert!(pool.get_message_by_name("pkg.Good").is_none());
        assert!(pool.get_file_by_name("broken.proto").is_none());
        assert!(pool.get_message_by_name("pkg.Base").is_some());
        assert_eq!(pool.files().len(), 1);
    }

    #[test]
    fn test_failed_file_can_be_registered_again() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("base.proto", "pkg", &[], vec![message("Base", vec![])]))
            .unwrap();

        let broken = file(
            "next.proto",
            "pkg.next",
            &["base.proto"],
            vec![message("Holder", vec![message_field("base", 1, "Missing")])],
        );
        assert!(pool.add_file(broken).is_err());
        assert!(pool.find_symbol("pkg.next").is_none());
        assert!(pool.find_symbol("pkg.next.Holder.base").is_none());

        let fixed = file(
            "next.proto",
            "pkg.next",
            &["base.proto"],
            vec![message("Holder", vec![message_field("base", 1, "pkg.Base")])],
        );
        let registered = pool.add_file(fixed).unwrap();
        assert_eq!(registered.name(), "next.proto");
        let holder = pool.get_message_by_name("pkg.next.Holder").unwrap();
        let base = holder.get_field_by_name("base").unwrap();
        assert_eq!(base.kind().as_message().unwrap().full_name(), "pkg.Base");
    }

    #[test]
    fn test_failed_file_unlinks_its_extensions() {
        let mut extendable = message("Base", vec![]);
        extendable
            .extension_range
            .push(prost_types::descriptor_proto::ExtensionRange {
                start: Some(10),
                end: Some(20),
                ..Default::default()
            });
        let mut base = file("base.proto", "pkg", &[], vec![extendable]);
        base.syntax = Some("proto2".to_string());
        let mut pool = DescriptorPool::new();
        pool.add_file(base).unwrap();

        let extension = |name: &str| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(10),
            r#type: Some(Type::Int32 as i32),
            extendee: Some(".pkg.Base".to_string()),
            ..Default::default()
        };
        let int_field = |name: &str| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(1),
            r#type: Some(Type::Int32 as i32),
            ..Default::default()
        };

        // The extension links before the duplicate field number is found.
        let mut broken = file(
            "ext.proto",
            "ext",
            &["base.proto"],
            vec![message("Dup", vec![int_field("a"), int_field("b")])],
        );
        broken.syntax = Some("proto2".to_string());
        broken.extension.push(extension("first"));
        assert!(pool.add_file(broken).is_err());

        let desc = pool.get_message_by_name("pkg.Base").unwrap();
        assert!(pool.find_field_by_number(&desc, 10).is_none());

        let mut fixed = file("ext.proto", "ext", &["base.proto"], vec![]);
        fixed.syntax = Some("proto2".to_string());
        fixed.extension.push(extension("second"));
        pool.add_file(fixed).unwrap();
        let desc = pool.get_message_by_name("pkg.Base").unwrap();
        assert_eq!(
            pool.find_field_by_number(&desc, 10).unwrap().full_name(),
            "ext.second"
        );
    }

    #[test]
    fn test_registration_keeps_snapshots_held_by_handles() {
        let mut pool = DescriptorPool::new();
        let base = pool
            .add_file(file("base.proto", "pkg", &[], vec![message("Base", vec![])]))
            .unwrap();
        pool.add_file(file("more.proto", "pkg", &[], vec![message("More", vec![])]))
            .unwrap();

        assert!(base.parent_pool().get_message_by_name("pkg.More").is_none());
        assert!(pool.get_message_by_name("pkg.More").is_some());
    }

    #[test]
    fn test_duplicate_symbol_across_files() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("a.proto", "pkg", &[], vec![message("Foo", vec![])]))
            .unwrap();
        let err = pool
            .add_file(file("b.proto", "pkg", &[], vec![message("Foo", vec![])]))
            .unwrap_err();
        assert_eq!(
            err.as_descriptor_error().unwrap().kind,
            DescriptorErrorKind::DuplicateSymbol {
                name: "pkg.Foo".into(),
                defined_in: Some("a.proto".into()),
            }
        );
    }

    #[test]
    fn test_package_conflicts_with_message() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("a.proto", "", &[], vec![message("pkg", vec![])]))
            .unwrap();
        let err = pool.add_file(file("b.proto", "pkg", &[], vec![])).unwrap_err();
        assert!(matches!(
            err.as_descriptor_error().unwrap().kind,
            DescriptorErrorKind::DuplicateSymbol { .. }
        ));
    }

    #[test]
    fn test_shared_package_across_files() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("a.proto", "acme.v1", &[], vec![message("A", vec![])]))
            .unwrap();
        pool.add_file(file("b.proto", "acme.v1", &[], vec![message("B", vec![])]))
            .unwrap();
        assert!(matches!(pool.find_symbol("acme"), Some(Symbol::Package(_))));
        assert!(matches!(pool.find_symbol("acme.v1"), Some(Symbol::Package(_))));
        assert!(pool.find::<MessageDescriptor>("acme.v1").is_none());
    }

    #[test]
    fn test_identical_readd_returns_existing() {
        let mut pool = DescriptorPool::new();
        let proto = file("a.proto", "pkg", &[], vec![message("A", vec![])]);
        let first = pool.add_file(proto.clone()).unwrap();
        let second = pool.add_file(proto.clone()).unwrap();
        assert_eq!(first, second);

        let mut changed = proto;
        changed.message_type.push(message("B", vec![]));
        let err = pool.add_file(changed).unwrap_err();
        assert!(matches!(
            err.as_descriptor_error().unwrap().kind,
            DescriptorErrorKind::DuplicateFile(_)
        ));
    }

    #[test]
    fn test_missing_dependency() {
        let mut pool = DescriptorPool::new();
        let err = pool
            .add_file(file("a.proto", "pkg", &["nope.proto"], vec![]))
            .unwrap_err();
        assert_eq!(
            err.as_descriptor_error().unwrap().kind,
            DescriptorErrorKind::MissingDependency("nope.proto".into())
        );
    }

    #[test]
    fn test_file_set_sorted_topologically() {
        let set = FileDescriptorSet {
            file: vec![
                file(
                    "top.proto",
                    "pkg",
                    &["mid.proto"],
                    vec![message("Top", vec![message_field("mid", 1, "Mid")])],
                ),
                file(
                    "mid.proto",
                    "pkg",
                    &["leaf.proto"],
                    vec![message("Mid", vec![message_field("leaf", 1, ".pkg.Leaf")])],
                ),
                file("leaf.proto", "pkg", &[], vec![message("Leaf", vec![])]),
            ],
        };
        let pool = DescriptorPool::from_file_descriptor_set(set).unwrap();
        let names: Vec<_> = pool.files().map(|f| f.name().to_string()).collect();
        assert_eq!(names, ["leaf.proto", "mid.proto", "top.proto"]);
    }

    #[test]
    fn test_file_set_cycle() {
        let set = FileDescriptorSet {
            file: vec![
                file("a.proto", "pkg", &["b.proto"], vec![]),
                file("b.proto", "pkg", &["a.proto"], vec![]),
            ],
        };
        let mut pool = DescriptorPool::new();
        let err = pool.add_file_descriptor_set(set).unwrap_err();
        match err {
            Error::DescriptorValidation(e) => {
                assert_eq!(
                    e.kind,
                    DescriptorErrorKind::DependencyCycle(vec![
                        "a.proto".into(),
                        "b.proto".into(),
                        "a.proto".into()
                    ])
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.files().len(), 0);
    }

    #[test]
    fn test_handles_equal_across_snapshots() {
        let mut pool = DescriptorPool::new();
        pool.add_file(file("a.proto", "pkg", &[], vec![message("A", vec![])]))
            .unwrap();
        let before = pool.get_message_by_name("pkg.A").unwrap();
        pool.add_file(file("b.proto", "pkg", &[], vec![message("B", vec![])]))
            .unwrap();
        let after = pool.get_message_by_name("pkg.A").unwrap();
        assert_eq!(before, after);

        let other = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: vec![file("a.proto", "pkg", &[], vec![message("A", vec![])])],
        })
        .unwrap();
        assert_ne!(before, other.get_message_by_name("pkg.A").unwrap());
    }

    #[test]
    fn test_global_pool() {
        let proto = file("global_test.proto", "global_test", &[], vec![message("G", vec![])]);
        let bytes = proto.encode_to_vec();
        DescriptorPool::add_global_serialized_file(&bytes).unwrap();
        // Re-adding the same bytes is a no-op.
        DescriptorPool::add_global_serialized_file(&bytes).unwrap();
        assert!(DescriptorPool::global()
            .get_message_by_name("global_test.G")
            .is_some());
    }
}
