//! Error types for the dynproto-core library.
//!
//! Everything fallible in the crate returns [`Error`]. Wire-level failures carry
//! the byte offset at which decoding stopped; descriptor validation failures are
//! boxed into a [`DescriptorError`] naming the offending file and element.

use thiserror::Error;

/// Result type alias for dynproto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all dynproto operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint ran past 10 bytes or overflowed 64 bits
    #[error("malformed varint at offset {offset}")]
    MalformedVarint {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// The input ended in the middle of a value
    #[error("truncated message at offset {offset}: need {needed} bytes, {remaining} remaining")]
    TruncatedMessage {
        /// Byte offset where the value started
        offset: usize,
        /// Number of bytes the value requires
        needed: usize,
        /// Number of bytes left in the input
        remaining: usize,
    },

    /// A tag carried wire type 6 or 7
    #[error("invalid wire type {value} at offset {offset}")]
    InvalidWireType {
        /// Byte offset of the tag
        offset: usize,
        /// The raw wire type bits
        value: u8,
    },

    /// A tag carried field number 0 or a number above the maximum
    #[error("invalid field number {number} at offset {offset}: must be between 1 and {max}", max = crate::MAX_FIELD_NUMBER)]
    InvalidFieldNumber {
        /// Byte offset of the tag
        offset: usize,
        /// The decoded field number
        number: u64,
    },

    /// An end-group tag appeared without a matching start-group
    #[error("unexpected end-group tag for field {number} at offset {offset}")]
    UnexpectedEndGroup {
        /// Byte offset of the tag
        offset: usize,
        /// Field number carried by the end-group tag
        number: u32,
    },

    /// Nested messages or groups went deeper than the configured limit
    #[error("recursion limit of {limit} exceeded while decoding nested message")]
    RecursionLimitExceeded {
        /// The configured limit
        limit: u32,
    },

    /// A string field did not contain valid UTF-8
    #[error("invalid UTF-8 in string field '{field}'")]
    InvalidUtf8 {
        /// Full name of the field
        field: String,
    },

    /// A parsed message left proto2 `required` fields unset
    #[error("message '{message}' is missing required fields: {}", .fields.join(", "))]
    MissingRequiredFields {
        /// Full name of the top-level message
        message: String,
        /// Paths of the unset fields, e.g. `items[0].id`
        fields: Vec<String>,
    },

    /// A descriptor failed validation or cross-linking
    #[error(transparent)]
    DescriptorValidation(Box<DescriptorError>),

    /// Failed to parse a serialized FileDescriptorProto or FileDescriptorSet
    #[error("failed to parse descriptor proto: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Unsupported proto syntax version
    #[error("unsupported proto syntax: '{syntax}'")]
    UnsupportedSyntax {
        /// The unsupported syntax string
        syntax: String,
    },

    /// A value's runtime type does not match the field's declared kind
    #[error("type mismatch for field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Full name of the field (or message, for merges)
        field: String,
        /// The kind the field accepts
        expected: String,
        /// The kind that was supplied
        found: String,
    },

    /// A repeated-only operation was applied to a singular field
    #[error("field '{field}' is not repeated")]
    NotRepeated {
        /// Full name of the field
        field: String,
    },

    /// A field descriptor was used with a message of a different type
    #[error("field '{field}' does not belong to message '{message}'")]
    FieldNotInMessage {
        /// Full name of the field
        field: String,
        /// Full name of the message
        message: String,
    },

    /// A length prefix announced a frame larger than allowed
    #[error("frame of {len} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge {
        /// Announced frame length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// I/O failure while reading or writing frames
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated message error
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::TruncatedMessage {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new invalid wire type error
    pub fn invalid_wire_type(offset: usize, value: u8) -> Self {
        Self::InvalidWireType { offset, value }
    }

    /// Creates a new invalid field number error
    pub fn invalid_field_number(offset: usize, number: u64) -> Self {
        Self::InvalidFieldNumber { offset, number }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new not-repeated error
    pub fn not_repeated(field: impl Into<String>) -> Self {
        Self::NotRepeated {
            field: field.into(),
        }
    }

    /// Creates a new missing required fields error
    pub fn missing_required(message: impl Into<String>, fields: Vec<String>) -> Self {
        Self::MissingRequiredFields {
            message: message.into(),
            fields,
        }
    }

    /// Returns the descriptor validation error, if this is one
    pub fn as_descriptor_error(&self) -> Option<&DescriptorError> {
        match self {
            Self::DescriptorValidation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the error was caused by malformed input bytes
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. }
                | Self::TruncatedMessage { .. }
                | Self::InvalidWireType { .. }
                | Self::InvalidFieldNumber { .. }
                | Self::UnexpectedEndGroup { .. }
                | Self::RecursionLimitExceeded { .. }
                | Self::InvalidUtf8 { .. }
                | Self::MissingRequiredFields { .. }
        )
    }

    /// Returns true if the error was caused by misuse of the dynamic message API
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::NotRepeated { .. } | Self::FieldNotInMessage { .. }
        )
    }
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Self {
        Self::DescriptorValidation(Box::new(err))
    }
}

/// A descriptor that failed to build or cross-link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid descriptor '{element}' in file '{file}': {kind}")]
pub struct DescriptorError {
    /// Name of the file being registered
    pub file: String,
    /// Full name of the offending element (or the file name)
    pub element: String,
    /// What went wrong
    pub kind: DescriptorErrorKind,
}

impl DescriptorError {
    /// Creates a new descriptor error
    pub fn new(
        file: impl Into<String>,
        element: impl Into<String>,
        kind: DescriptorErrorKind,
    ) -> Self {
        Self {
            file: file.into(),
            element: element.into(),
            kind,
        }
    }
}

/// The individual descriptor validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DescriptorErrorKind {
    /// A fully-qualified name is already bound to another descriptor
    #[error("\"{name}\" is already defined{}", .defined_in.as_ref().map(|f| format!(" in file \"{f}\"")).unwrap_or_default())]
    DuplicateSymbol {
        /// The colliding name
        name: String,
        /// File owning the earlier definition, when it is a different file
        defined_in: Option<String>,
    },

    /// A type reference did not resolve
    #[error("\"{name}\" is not defined")]
    UnresolvedType {
        /// The textual reference
        name: String,
    },

    /// A type reference resolved to a file that is not imported
    #[error("\"{name}\" seems to be defined in \"{file}\", which is not imported")]
    NotImported {
        /// The textual reference
        name: String,
        /// File declaring the symbol
        file: String,
    },

    /// An enum with no values
    #[error("enums must contain at least one value")]
    EmptyEnum,

    /// A name that is not a valid identifier
    #[error("\"{name}\" is not a valid identifier")]
    InvalidName {
        /// The offending name
        name: String,
    },

    /// A field or extension number outside the legal range
    #[error("field number {number} is invalid: {reason}")]
    InvalidFieldNumber {
        /// The offending number
        number: i32,
        /// Why it is invalid
        reason: String,
    },

    /// Two fields of one message share a number
    #[error("field number {number} has already been used in \"{message}\" by field \"{existing}\"")]
    DuplicateFieldNumber {
        /// The shared number
        number: u32,
        /// Full name of the message
        message: String,
        /// Name of the field registered first
        existing: String,
    },

    /// Extension ranges that overlap each other or declared fields
    #[error("extension range conflict: {0}")]
    ExtensionRangeConflict(String),

    /// An extension number outside every extension range of its extendee
    #[error("\"{extendee}\" does not declare {number} as an extension number")]
    ExtensionNumberOutOfRange {
        /// Full name of the extended message
        extendee: String,
        /// The extension's number
        number: u32,
    },

    /// Files that import each other
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// An import that is not registered in the pool
    #[error("import \"{0}\" has not been loaded")]
    MissingDependency(String),

    /// A different file with the same name is already registered
    #[error("a different file named \"{0}\" is already registered")]
    DuplicateFile(String),

    /// A type reference that resolved to the wrong kind of symbol
    #[error("\"{name}\" is not {expected}")]
    InvalidType {
        /// The textual reference
        name: String,
        /// What the reference should have named
        expected: &'static str,
    },

    /// A default value that could not be parsed or is not allowed
    #[error("invalid default value \"{value}\": {reason}")]
    InvalidDefault {
        /// The textual default
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Any other structural violation
    #[error("{0}")]
    Other(String),
}
