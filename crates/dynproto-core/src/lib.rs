//! # dynproto-core
//!
//! A descriptor-driven Protocol Buffers engine: messages whose shape is only
//! known at run time, described by descriptors loaded from serialized
//! `FileDescriptorProto`s.
//!
//! This crate provides:
//! - The protobuf wire codec (varints, zigzag, fixed-width and length-delimited values)
//! - A descriptor model with two-pass building and cross-linking
//! - A descriptor pool with scoped symbol resolution
//! - Dynamic messages that parse, mutate and serialize against those descriptors
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Low-level wire format encoding and the borrowing [`wire::WireReader`]
//! - [`descriptor`]: Descriptor handles and the build/cross-link passes
//! - [`pool`]: The [`DescriptorPool`] symbol table
//! - [`dynamic`]: [`DynamicMessage`] and its field values
//! - [`frame`]: Length-prefixed message framing over byte streams
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use dynproto_core::{DescriptorPool, DynamicMessage};
//! use std::fs;
//!
//! // Load a descriptor set produced by `protoc --descriptor_set_out`
//! let mut pool = DescriptorPool::new();
//! pool.decode_file_descriptor_set(fs::read("./schema.binpb")?.as_slice())?;
//!
//! // Parse a message and write it back out
//! let desc = pool.get_message_by_name("acme.Order").ok_or("unknown type")?;
//! let message = DynamicMessage::decode(desc, fs::read("./order.bin")?.as_slice())?;
//! for (field, value) in message.fields() {
//!     println!("{} = {:?}", field.name(), value);
//! }
//! let bytes = message.encode_to_vec();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod dynamic;
pub mod error;
pub mod frame;
pub mod pool;
pub mod wire;

// Re-export primary types for convenience
pub use descriptor::{
    Cardinality, EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FileDescriptor, Kind,
    MessageDescriptor, MethodDescriptor, OneofDescriptor, ServiceDescriptor, Syntax,
};
pub use dynamic::{DecodeConfig, DynamicMessage, UnknownField, UnknownFieldSet, Value};
pub use error::{DescriptorError, DescriptorErrorKind, Error, Result};
pub use frame::{FrameConfig, FrameReader, FrameWriter};
pub use pool::{DescriptorPool, FromSymbol, Symbol};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
