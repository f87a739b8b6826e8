//! Error types for the CLD container library.

use std::path::PathBuf;
use thiserror::Error;

use crate::dataset::CellLevelDatasetType;

/// Main error type for CLD container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of a store file
    #[error("Invalid store file: bad magic bytes")]
    InvalidMagic,

    /// Unsupported store file version
    #[error("Unsupported store version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Container or dataset format/version mismatch. Fatal, non-recoverable.
    #[error("Unsupported file format: {0}")]
    UnsupportedFileFormat(String),

    /// Duplicate namespace/object-type/companion-group id.
    /// Fatal to the calling operation; the caller may retry with another id.
    #[error("Unique violation: id '{0}' already exists")]
    UniqueViolation(String),

    /// An object type, namespace, or tracking type from a different container
    /// or dataset was used where one from the current dataset is expected.
    #[error("Wrong dataset: {entity} {id} does not belong to dataset '{owner}'")]
    WrongDataset {
        entity: &'static str,
        id: String,
        owner: String,
    },

    /// A dataset of one kind was asked to convert to another.
    #[error("Dataset '{dataset_code}' is of type {actual:?}, not {requested:?}")]
    WrongDatasetType {
        actual: CellLevelDatasetType,
        requested: CellLevelDatasetType,
        dataset_code: String,
    },

    /// A namespace's recorded object count disagrees with a new write.
    #[error(
        "Wrong number of segmented objects for namespace '{namespace}' at \
         '{coordinate}': expected {expected}, got {actual}"
    )]
    WrongNumberOfSegmentedObjects {
        namespace: String,
        coordinate: String,
        expected: usize,
        actual: usize,
    },

    /// Bad argument to an operation, including "no data for this key" cases
    /// re-classified from raw storage not-found signals.
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Raw storage object absent. Dataset-level code catches this and
    /// re-classifies it as [`Error::IllegalArgument`] with context.
    #[error("Not found in store: {0}")]
    NotFound(String),

    /// Group/attribute/array has a different kind than requested.
    #[error("Store type mismatch at '{path}': expected {expected}, got {actual}")]
    StoreTypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// I/O error from the underlying file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error while reading strings
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an illegal-argument error from a message.
    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalArgument(msg.into())
    }

    /// Create a format error from a message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFileFormat(msg.into())
    }
}

/// Result type alias for CLD container operations.
pub type Result<T> = std::result::Result<T, Error>;
