// -
// Record sentinels

/// ASQN value of records that carry no application sequence number.
pub const ASQN_IGNORE: i64 = -1;

// -
// Builder defaults

pub(crate) const DEFAULT_STORAGE_NAME: &str = "raft-partition";
pub(crate) const DEFAULT_DIRECTORY: &str = "./data/raft";
pub(crate) const DEFAULT_MAX_SEGMENT_SIZE: u64 = 32 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_ENTRY_SIZE: usize = 4 * 1024 * 1024;
pub(crate) const DEFAULT_MIN_FREE_DISK_SPACE: u64 = 1024 * 1024 * 1024;
pub(crate) const DEFAULT_INDEX_DENSITY: u64 = 100;
pub(crate) const DEFAULT_FLUSH_DELAY_MS: u64 = 5;

// -
// Segmented journal files

pub(crate) const SEGMENT_EXTENSION: &str = "log";
pub(crate) const META_FILE_EXTENSION: &str = "meta";
pub(crate) const LOCK_FILE_EXTENSION: &str = "lock";

/// Segment header: magic + first index.
pub(crate) const SEGMENT_MAGIC: u32 = 0x5241_4654;
pub(crate) const SEGMENT_HEADER_SIZE: u64 = 4 + 8;

/// Record frame prefix: length + crc32 + index + asqn.
pub(crate) const FRAME_HEADER_SIZE: usize = 4 + 4 + 8 + 8;
