//! Error types for the ENVISAT reader.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Numeric error codes of the EPR C API, carried by [`Error::Epr`].
///
/// Only the codes this crate can raise are listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EprCode {
    IllegalArg = 2,
    IllegalState = 3,
    IndexOutOfRange = 5,
    IllegalConversion = 6,
    IllegalDataType = 7,
    FileReadError = 103,
    FileWriteError = 104,
    InvalidProductId = 203,
    InvalidRecord = 204,
    InvalidBand = 205,
    InvalidRaster = 206,
    InvalidDatasetName = 207,
    InvalidKeywordName = 208,
    InvalidValue = 209,
    FlagNotFound = 301,
    InvalidDddbFormat = 402,
}

impl EprCode {
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Error class, mirroring the categories callers match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid argument, out-of-range index, lookup failure, closed product
    Value,
    /// Wrong kind of argument (e.g. raster of the wrong data type)
    Type,
    /// Size or step outside the representable range
    Overflow,
    /// Product-format or bitmask evaluation failure with a numeric code
    Epr,
    /// Operation intentionally unsupported (writing header fields)
    NotImplemented,
    /// Write attempted on a read-only product
    NotWritable,
    /// Underlying storage failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Value => "ValueError",
            Self::Type => "TypeError",
            Self::Overflow => "OverflowError",
            Self::Epr => "EPRError",
            Self::NotImplemented => "NotImplementedError",
            Self::NotWritable => "NotWritable",
            Self::Io => "IOError",
        };
        f.write_str(s)
    }
}

/// Main error type for product operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File is truncated or a read runs past its end
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// The file is not a recognized ENVISAT product
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Operation on a product (or derived object) that has been closed
    #[error("I/O operation on closed product")]
    Closed,

    /// Index outside the valid range
    #[error("{what} index {index} out of range (count: {count})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        count: u64,
    },

    /// Lookup by name failed
    #[error("{what} not found: \"{name}\"")]
    NotFound { what: &'static str, name: String },

    /// Invalid argument value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Argument of the wrong kind
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Integer argument outside representable range
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Error with a numeric EPR code (bitmask evaluation, DDDB, format)
    #[error("EPR error {code}: {message}")]
    Epr { code: i32, message: String },

    /// Operation not supported on this object
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Product is not writable (opened read-only)
    #[error("Product is read-only")]
    ReadOnly,

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DDDB (JSON) decoding error
    #[error("Invalid DDDB: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an EPR error with the given code.
    pub fn epr(code: EprCode, msg: impl Into<String>) -> Self {
        Self::Epr {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a "not found" error.
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(what: &'static str, index: impl Into<u64>, count: impl Into<u64>) -> Self {
        Self::OutOfRange {
            what,
            index: index.into(),
            count: count.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Error class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Closed
            | Self::OutOfRange { .. }
            | Self::NotFound { .. }
            | Self::InvalidArgument(_)
            | Self::InvalidProduct(_) => ErrorKind::Value,
            Self::TypeMismatch { .. } => ErrorKind::Type,
            Self::Overflow(_) => ErrorKind::Overflow,
            Self::Epr { .. } | Self::Json(_) => ErrorKind::Epr,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::ReadOnly => ErrorKind::NotWritable,
            Self::FileNotFound(_) | Self::UnexpectedEof(_) | Self::MmapFailed(_) | Self::Io(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Numeric EPR code, if this error carries one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Epr { code, .. } => Some(*code),
            Self::Json(_) => Some(EprCode::InvalidDddbFormat.code()),
            _ => None,
        }
    }
}

/// Result type alias for product operations.
pub type Result<T> = std::result::Result<T, Error>;
