use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use super::RaftLog;
use crate::build_flusher;
use crate::FileMetaStore;
use crate::FlushConfig;
use crate::FlushMetaStore;
use crate::InMemoryJournal;
use crate::InMemoryMetaStore;
use crate::Journal;
use crate::JournalKind;
use crate::RaftLogConfig;
use crate::Result;
use crate::SegmentedJournal;
use crate::SegmentedJournalOptions;

/// Builds a [`RaftLog`], opening or creating its journal.
///
/// ```no_run
/// use d_engine_log::FlushConfig;
/// use d_engine_log::RaftLogBuilder;
///
/// let mut log = RaftLogBuilder::new()
///     .with_name("partition-1")
///     .with_directory("/var/lib/raft/partition-1")
///     .with_flush(FlushConfig::Direct)
///     .build()?;
/// log.flush()?;
/// # Ok::<(), d_engine_log::Error>(())
/// ```
#[derive(Default)]
pub struct RaftLogBuilder {
    config: RaftLogConfig,
    journal: Option<Arc<dyn Journal>>,
    meta_store: Option<Arc<dyn FlushMetaStore>>,
    runtime: Option<Handle>,
}

impl RaftLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RaftLogConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn with_directory(
        mut self,
        directory: impl Into<PathBuf>,
    ) -> Self {
        self.config.directory = directory.into();
        self
    }

    pub fn with_max_segment_size(
        mut self,
        max_segment_size: u64,
    ) -> Self {
        self.config.max_segment_size = max_segment_size;
        self
    }

    pub fn with_max_entry_size(
        mut self,
        max_entry_size: usize,
    ) -> Self {
        self.config.max_entry_size = max_entry_size;
        self
    }

    pub fn with_min_free_disk_space(
        mut self,
        min_free_disk_space: u64,
    ) -> Self {
        self.config.min_free_disk_space = min_free_disk_space;
        self
    }

    /// When disabled, flushing is left to the OS and `flush` does nothing.
    pub fn with_explicit_flush(
        mut self,
        explicit_flush: bool,
    ) -> Self {
        self.config.explicit_flush = explicit_flush;
        self
    }

    pub fn with_index_density(
        mut self,
        index_density: u64,
    ) -> Self {
        self.config.index_density = index_density;
        self
    }

    pub fn with_flush(
        mut self,
        flush: FlushConfig,
    ) -> Self {
        self.config.flush = flush;
        self
    }

    pub fn with_journal_kind(
        mut self,
        journal: JournalKind,
    ) -> Self {
        self.config.journal = journal;
        self
    }

    /// Uses an already opened journal instead of opening one from the config.
    pub fn with_journal(
        mut self,
        journal: Arc<dyn Journal>,
    ) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Overrides where the flush watermark is published.
    pub fn with_meta_store(
        mut self,
        meta_store: Arc<dyn FlushMetaStore>,
    ) -> Self {
        self.meta_store = Some(meta_store);
        self
    }

    /// Runtime executing delayed flushes. Defaults to the runtime `build` is
    /// called from.
    pub fn with_runtime(
        mut self,
        runtime: Handle,
    ) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &RaftLogConfig {
        &self.config
    }

    pub fn build(self) -> Result<RaftLog> {
        let config = self.config;
        config.validate()?;

        let preallocated = self.journal.is_some();
        let journal: Arc<dyn Journal> = match self.journal {
            Some(journal) => journal,
            None => match config.journal {
                JournalKind::Segmented => Arc::new(SegmentedJournal::open(SegmentedJournalOptions {
                    name: config.name.clone(),
                    directory: config.directory.clone(),
                    max_segment_size: config.max_segment_size,
                    max_entry_size: config.max_entry_size,
                    min_free_disk_space: config.min_free_disk_space,
                    index_density: config.index_density,
                })?),
                JournalKind::InMemory => Arc::new(InMemoryJournal::new(config.max_entry_size)),
            },
        };

        let meta_store: Arc<dyn FlushMetaStore> = match self.meta_store {
            Some(meta_store) => meta_store,
            None if preallocated || config.journal == JournalKind::InMemory => Arc::new(InMemoryMetaStore::default()),
            None => Arc::new(FileMetaStore::open(&config.directory, &config.name)?),
        };

        let flush = config.effective_flush();
        let flusher = build_flusher(flush, meta_store.clone(), self.runtime, &config.name)?;

        info!(
            name = %config.name,
            journal = ?config.journal,
            preallocated,
            flush = flush.name(),
            first_index = journal.first_index(),
            last_index = journal.last_index(),
            "Opened raft log"
        );
        Ok(RaftLog::new(config.name, journal, flusher, meta_store))
    }
}
