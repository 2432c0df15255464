use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_DIRECTORY;
use crate::constants::DEFAULT_FLUSH_DELAY_MS;
use crate::constants::DEFAULT_INDEX_DENSITY;
use crate::constants::DEFAULT_MAX_ENTRY_SIZE;
use crate::constants::DEFAULT_MAX_SEGMENT_SIZE;
use crate::constants::DEFAULT_MIN_FREE_DISK_SPACE;
use crate::constants::DEFAULT_STORAGE_NAME;
use crate::constants::FRAME_HEADER_SIZE;
use crate::constants::SEGMENT_HEADER_SIZE;
use crate::Error;
use crate::Result;

/// Storage parameters of a raft log partition
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RaftLogConfig {
    /// Prefix of the journal files, unique per partition
    #[serde(default = "default_storage_name")]
    pub name: String,

    /// Directory holding the journal segments and the meta file
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Segment size in bytes after which the journal rolls over to a new segment
    #[serde(default = "default_max_segment_size")]
    pub max_segment_size: u64,

    /// Largest accepted serialized entry in bytes
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,

    /// Free bytes required on the volume before a new segment is created
    #[serde(default = "default_min_free_disk_space")]
    pub min_free_disk_space: u64,

    /// When false, flushing is left to the OS and `flush` does nothing
    #[serde(default = "default_explicit_flush")]
    pub explicit_flush: bool,

    /// Every n-th entry is added to the journal's sparse index
    #[serde(default = "default_index_density")]
    pub index_density: u64,

    #[serde(default)]
    pub flush: FlushConfig,

    #[serde(default)]
    pub journal: JournalKind,
}

impl Default for RaftLogConfig {
    fn default() -> Self {
        Self {
            name: default_storage_name(),
            directory: default_directory(),
            max_segment_size: default_max_segment_size(),
            max_entry_size: default_max_entry_size(),
            min_free_disk_space: default_min_free_disk_space(),
            explicit_flush: default_explicit_flush(),
            index_density: default_index_density(),
            flush: FlushConfig::default(),
            journal: JournalKind::default(),
        }
    }
}

impl RaftLogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("name must not be empty".into())));
        }

        let min_segment_size = SEGMENT_HEADER_SIZE + FRAME_HEADER_SIZE as u64;
        if self.max_segment_size <= min_segment_size {
            return Err(Error::Config(ConfigError::Message(format!(
                "max_segment_size {} must be greater than {} bytes",
                self.max_segment_size, min_segment_size
            ))));
        }

        if self.max_entry_size == 0 || self.max_entry_size > u32::MAX as usize {
            return Err(Error::Config(ConfigError::Message(format!(
                "max_entry_size {} must be in 1..={}",
                self.max_entry_size,
                u32::MAX
            ))));
        }

        if self.min_free_disk_space == 0 {
            return Err(Error::Config(ConfigError::Message(
                "min_free_disk_space must be greater than 0".into(),
            )));
        }

        if self.index_density == 0 {
            return Err(Error::Config(ConfigError::Message(
                "index_density must be greater than 0".into(),
            )));
        }

        self.flush.validate()?;

        Ok(())
    }

    /// Strategy actually used by the log. Without explicit flushing the
    /// configured strategy is ignored.
    pub fn effective_flush(&self) -> FlushConfig {
        if self.explicit_flush {
            self.flush
        } else {
            FlushConfig::Noop
        }
    }
}

/// Durability policy applied on every `flush` request
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FlushConfig {
    /// Flush the journal synchronously
    #[default]
    Direct,

    /// Never flush from the log
    Noop,

    /// Coalesce flush requests into one flush `delay_ms` after the first request
    Delayed {
        #[serde(default = "default_flush_delay_ms")]
        delay_ms: u64,
    },
}

impl FlushConfig {
    fn validate(&self) -> Result<()> {
        if let FlushConfig::Delayed { delay_ms: 0 } = self {
            return Err(Error::Config(ConfigError::Message(
                "flush.delay_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlushConfig::Direct => "direct",
            FlushConfig::Noop => "noop",
            FlushConfig::Delayed { .. } => "delayed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    /// Segment files in `directory`
    #[default]
    Segmented,

    /// Volatile, nothing touches the disk
    InMemory,
}

fn default_storage_name() -> String {
    DEFAULT_STORAGE_NAME.to_string()
}
fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}
fn default_max_segment_size() -> u64 {
    DEFAULT_MAX_SEGMENT_SIZE
}
fn default_max_entry_size() -> usize {
    DEFAULT_MAX_ENTRY_SIZE
}
fn default_min_free_disk_space() -> u64 {
    DEFAULT_MIN_FREE_DISK_SPACE
}
fn default_explicit_flush() -> bool {
    true
}
fn default_index_density() -> u64 {
    DEFAULT_INDEX_DENSITY
}
fn default_flush_delay_ms() -> u64 {
    DEFAULT_FLUSH_DELAY_MS
}
