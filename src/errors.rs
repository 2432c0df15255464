//! Raft Log Error Hierarchy
//!
//! Defines the error types of the replicated log storage core, categorized by
//! layer: configuration, log-level state violations, journal/storage failures
//! and codec failures.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, codec, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Builder or settings validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Log-level contract violations
    #[error(transparent)]
    Log(#[from] LogError),

    /// Unrecoverable failures requiring the owner to stop the log
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Truncation below the commit index would discard entries a quorum has stored
    #[error("Cannot delete entries after index {index}: commit index is {commit_index}")]
    TruncateCommitted { index: u64, commit_index: u64 },

    /// Narrowing accessor used against a different entry kind
    #[error("Expected {expected} entry but found {actual} entry at index {index}")]
    UnexpectedEntryType {
        index: u64,
        expected: &'static str,
        actual: &'static str,
    },

    /// `next` called on a reader without a pending entry
    #[error("No entry available at index {next_index}")]
    IteratorExhausted { next_index: u64 },

    /// ASQN resolved to an entry that is not yet committed
    #[error("Cannot seek to asqn {asqn}: resolved index {index} is greater than commit index {commit_index}")]
    UnsupportedSeek { asqn: i64, index: u64, commit_index: u64 },

    /// Operation attempted after `close`
    #[error("Raft log is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during journal operations
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure bound to a specific file
    #[error("Error occurred at path: {path}")]
    PathError { path: PathBuf, source: std::io::Error },

    /// Appended record does not continue the journal
    #[error("Invalid record index {actual}: expected {expected}")]
    InvalidIndex { expected: u64, actual: u64 },

    /// Checksum validation failures
    #[error("Checksum mismatch for record {index}: expected {expected:#010x}, computed {actual:#010x}")]
    InvalidChecksum { index: u64, expected: u64, actual: u64 },

    /// Record payload exceeds the configured maximum entry size
    #[error("Entry of {size} bytes exceeds maximum entry size {max_size}")]
    EntryTooLarge { size: usize, max_size: usize },

    /// Not enough free space to create a new segment
    #[error("Not enough disk space in {path}: {available} bytes available, {required} required")]
    InsufficientDiskSpace { path: PathBuf, available: u64, required: u64 },

    /// Unreadable frame found while scanning a segment
    #[error("Data corruption detected at {location}")]
    DataCorruption { location: String },

    /// Another process holds the journal directory
    #[error("Failed to acquire storage lock on {0}; ensure each log uses a distinct directory")]
    StorageLocked(PathBuf),

    /// Operation attempted on a closed journal
    #[error("Journal is closed")]
    JournalClosed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Caller-provided buffer cannot hold the encoded entry
    #[error("Buffer too small: need {required} bytes at offset {offset}, capacity {capacity}")]
    BufferTooSmall {
        required: usize,
        offset: usize,
        capacity: usize,
    },

    /// Input ended before the entry was complete
    #[error("Truncated entry: need {required} bytes, found {remaining}")]
    Truncated { required: usize, remaining: usize },

    #[error("Unsupported entry encoding version {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown entry kind {0}")]
    UnknownEntryKind(u8),

    #[error("Unknown member type {0}")]
    UnknownMemberType(u8),

    #[error("Member id is not valid UTF-8")]
    InvalidMemberId,

    /// Field length does not fit the fixed-width length prefix
    #[error("Field {field} of {len} bytes exceeds encodable length")]
    FieldTooLong { field: &'static str, len: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Entry encoding
    #[error("Entry codec error: {0}")]
    Codec(#[from] CodecError),

    //Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::System(SystemError::Codec(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Storage(StorageError::IoError(e)))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl Error {
    /// Shorthand used by config validation.
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Error::Config(ConfigError::Message(msg.into()))
    }

    /// Returns the log-level error if this is one.
    pub fn as_log_error(&self) -> Option<&LogError> {
        match self {
            Error::Log(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the storage-level error if this is one.
    pub fn as_storage_error(&self) -> Option<&StorageError> {
        match self {
            Error::System(SystemError::Storage(e)) => Some(e),
            _ => None,
        }
    }
}
