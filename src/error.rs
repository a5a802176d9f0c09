//! Error and warning types for the Paradox table parser.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when opening or reading a Paradox table.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred while reading the `.DB` or `.MB` file
    #[error("{}", io_message(path, cause))]
    Io { path: PathBuf, #[source] cause: io::Error },

    /// A structural invariant of the file format was violated
    #[error("Invalid Paradox table: {reason} (at offset {offset})")]
    BadFormat { reason: String, offset: u64 },

    /// The table is encrypted and no password was supplied
    #[error("table is password protected")]
    Encrypted,

    /// The supplied password's checksum does not match the header
    #[error("Incorrect password")]
    BadPassword,

    /// An operation was attempted on a closed handle
    #[error("operation on a closed handle, class 'pxdoc_t'")]
    InvalidHandle,

    /// An option had the wrong type or shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, cause: io::Error) -> Self {
        Error::Io { path: path.into(), cause }
    }

    pub(crate) fn bad_format(reason: impl Into<String>, offset: u64) -> Self {
        Error::BadFormat { reason: reason.into(), offset }
    }
}

/// Non-fatal conditions surfaced to the caller without aborting the operation
/// that produced them. Accumulated on the `Document` and retrievable via
/// `Document::warnings`.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The file declares blob fields but no companion `.MB` file was found
    MissingBlob,
    /// A blob's modifier did not match the index entry that should describe it
    BlobMismatch { field: String, record_index: u64 },
    /// The iterator's yielded record count didn't match the header's declared count
    RecordCountMismatch { declared: u32, actual: u32 },
    /// A field descriptor used a type code this decoder doesn't recognize
    UnknownFieldType { field: String, type_code: u8 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MissingBlob => write!(f, "blob fields present but no .MB file found"),
            Warning::BlobMismatch { field, record_index } => write!(
                f,
                "blob modifier mismatch in field '{field}' at record {record_index}"
            ),
            Warning::RecordCountMismatch { declared, actual } => write!(
                f,
                "header declared {declared} records but iteration yielded {actual}"
            ),
            Warning::UnknownFieldType { field, type_code } => write!(
                f,
                "unknown field type 0x{type_code:02x} for field '{field}'"
            ),
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

fn io_message(path: &std::path::Path, cause: &io::Error) -> String {
    if cause.kind() == io::ErrorKind::NotFound {
        format!("File not found: {}", path.display())
    } else {
        format!("I/O error on {}: {cause}", path.display())
    }
}
