use std::path::PathBuf;

use super::*;

#[test]
fn test_error_fatal() {
    let err = Error::Fatal("delayed flush failed".to_string());
    assert_eq!(err.to_string(), "Fatal error: delayed flush failed");
}

#[test]
fn test_truncate_committed_message() {
    let err = LogError::TruncateCommitted {
        index: 1,
        commit_index: 2,
    };
    let msg = err.to_string();
    assert!(msg.contains("index 1"));
    assert!(msg.contains("commit index is 2"));
}

#[test]
fn test_unsupported_seek_message() {
    let err = LogError::UnsupportedSeek {
        asqn: 42,
        index: 7,
        commit_index: 5,
    };
    let msg = err.to_string();
    assert!(msg.contains("42"));
    assert!(msg.contains("7"));
    assert!(msg.contains("5"));
}

#[test]
fn test_storage_error_lifts_into_error() {
    let err: Error = StorageError::InvalidIndex { expected: 4, actual: 9 }.into();
    assert!(matches!(
        err.as_storage_error(),
        Some(StorageError::InvalidIndex { expected: 4, actual: 9 })
    ));
    assert!(err.as_log_error().is_none());
}

#[test]
fn test_codec_error_lifts_into_error() {
    let err: Error = CodecError::UnknownEntryKind(9).into();
    assert!(matches!(err, Error::System(SystemError::Codec(CodecError::UnknownEntryKind(9)))));
}

#[test]
fn test_io_error_lifts_into_storage_error() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "segment gone");
    let err: Error = io.into();
    assert!(matches!(err.as_storage_error(), Some(StorageError::IoError(_))));
    assert!(err.to_string().contains("segment gone"));
}

#[test]
fn test_insufficient_disk_space_message() {
    let err = StorageError::InsufficientDiskSpace {
        path: PathBuf::from("/data/raft"),
        available: 10,
        required: 100,
    };
    let msg = err.to_string();
    assert!(msg.contains("/data/raft"));
    assert!(msg.contains("100"));
}

#[test]
fn test_invalid_config_is_config_error() {
    let err = Error::invalid_config("max_segment_size must be greater than 0");
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("max_segment_size"));
}
