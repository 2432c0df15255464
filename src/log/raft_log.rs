use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::ReaderMode;
use super::RaftLogReader;
use crate::entry::codec;
use crate::flush::flush_journal;
use crate::metrics::APPENDED_ENTRIES_METRIC;
use crate::metrics::COMMIT_INDEX_METRIC;
use crate::metrics::LAST_APPENDED_INDEX_METRIC;
use crate::FlushMetaStore;
use crate::IndexedRaftLogEntry;
use crate::Journal;
use crate::JournalRecord;
use crate::LogError;
use crate::PersistedRaftRecord;
use crate::RaftLogEntry;
use crate::RaftLogFlusher;
use crate::ReplicatedRaftRecord;
use crate::Result;
use crate::ASQN_IGNORE;

/// The replicated log of a raft partition.
///
/// A `RaftLog` has a single owner: every mutating operation takes `&mut self`.
/// Readers opened from it are independent and may live on other threads; they
/// observe the commit index through a shared atomic.
pub struct RaftLog {
    name: String,
    journal: Arc<dyn Journal>,
    flusher: Box<dyn RaftLogFlusher>,
    meta_store: Arc<dyn FlushMetaStore>,
    commit_index: Arc<AtomicU64>,
    /// Cache of the last entry; `None` means unknown, not empty
    last_entry: Option<IndexedRaftLogEntry>,
    closed: bool,
}

impl std::fmt::Debug for RaftLog {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RaftLog")
            .field("name", &self.name)
            .field("first_index", &self.journal.first_index())
            .field("last_index", &self.journal.last_index())
            .field("commit_index", &self.commit_index())
            .field("closed", &self.closed)
            .finish()
    }
}

impl RaftLog {
    pub(crate) fn new(
        name: String,
        journal: Arc<dyn Journal>,
        flusher: Box<dyn RaftLogFlusher>,
        meta_store: Arc<dyn FlushMetaStore>,
    ) -> Self {
        Self {
            name,
            journal,
            flusher,
            meta_store,
            commit_index: Arc::new(AtomicU64::new(0)),
            last_entry: None,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(LogError::Closed.into());
        }
        Ok(())
    }

    fn cache_appended(
        &mut self,
        entry: &IndexedRaftLogEntry,
        path: &str,
    ) {
        APPENDED_ENTRIES_METRIC.with_label_values(&[self.name.as_str(), path]).inc();
        LAST_APPENDED_INDEX_METRIC
            .with_label_values(&[self.name.as_str()])
            .set(entry.index() as i64);
        trace!(index = entry.index(), term = entry.term(), path, "appended entry");
        self.last_entry = Some(entry.clone());
    }

    /// Serializes `entry` and appends it. The journal assigns the index.
    pub fn append(
        &mut self,
        entry: RaftLogEntry,
    ) -> Result<IndexedRaftLogEntry> {
        self.ensure_open()?;
        let asqn = entry.asqn().unwrap_or(ASQN_IGNORE);
        let data = codec::encode_to_vec(&entry)?;

        let record = self.journal.append(asqn, &data)?;
        let indexed = IndexedRaftLogEntry::new(entry, record);
        self.cache_appended(&indexed, "local");
        Ok(indexed)
    }

    /// Appends a record serialized by another node as is. Terms are not
    /// re-validated; the journal checks index continuity and checksum. A
    /// payload that does not decode is rejected before it reaches the journal.
    pub fn append_persisted(
        &mut self,
        record: PersistedRaftRecord,
    ) -> Result<IndexedRaftLogEntry> {
        self.ensure_open()?;
        let journal_record = record.to_journal_record();
        let indexed = IndexedRaftLogEntry::decode(journal_record.clone())?;
        self.journal.append_record(&journal_record)?;
        self.cache_appended(&indexed, "persisted");
        Ok(indexed)
    }

    /// Like [`Self::append_persisted`] for the lighter replication record; the
    /// ASQN is taken from the decoded entry.
    pub fn append_replicated(
        &mut self,
        record: ReplicatedRaftRecord,
    ) -> Result<IndexedRaftLogEntry> {
        self.ensure_open()?;
        let entry = record.decode_entry()?;
        let journal_record = JournalRecord {
            index: record.index,
            asqn: entry.asqn().unwrap_or(ASQN_IGNORE),
            checksum: record.checksum,
            data: record.data,
        };
        self.journal.append_record(&journal_record)?;

        let indexed = IndexedRaftLogEntry::new(entry, journal_record);
        self.cache_appended(&indexed, "replicated");
        Ok(indexed)
    }

    /// Returns the last entry, reading it from the journal when it is not cached.
    /// `Ok(None)` when the log is empty.
    pub fn last_entry(&mut self) -> Result<Option<IndexedRaftLogEntry>> {
        self.ensure_open()?;
        if let Some(entry) = &self.last_entry {
            return Ok(Some(entry.clone()));
        }
        if self.journal.is_empty() {
            return Ok(None);
        }

        let mut reader = RaftLogReader::new(self.journal.clone(), self.commit_index.clone(), ReaderMode::All);
        reader.seek_to_last()?;
        if !reader.has_next() {
            return Ok(None);
        }
        let entry = reader.next_entry()?;
        debug!(index = entry.index(), "loaded last entry from journal");
        self.last_entry = Some(entry.clone());
        Ok(Some(entry))
    }

    #[inline]
    pub fn commit_index(&self) -> u64 {
        self.commit_index.load(Ordering::Acquire)
    }

    /// Advances the commit index. The value is capped at the last index and
    /// never decreases.
    pub fn set_commit_index(
        &mut self,
        index: u64,
    ) {
        let last_index = self.journal.last_index();
        let capped = index.min(last_index);
        if capped < index {
            warn!(index, last_index, "commit index capped at last index");
        }
        let previous = self.commit_index.fetch_max(capped, Ordering::AcqRel);
        if capped > previous {
            COMMIT_INDEX_METRIC
                .with_label_values(&[self.name.as_str()])
                .set(capped as i64);
        }
    }

    /// Removes every entry after `index`. Committed entries cannot be removed.
    #[instrument(skip(self))]
    pub fn delete_after(
        &mut self,
        index: u64,
    ) -> Result<()> {
        self.ensure_open()?;
        let commit_index = self.commit_index();
        if index < commit_index {
            return Err(LogError::TruncateCommitted { index, commit_index }.into());
        }

        debug!(index, last_index = self.journal.last_index(), "deleting entries after index");
        self.journal.delete_after(index)?;
        self.last_entry = None;
        Ok(())
    }

    /// Compacts entries below `index`. The journal may keep more than asked.
    #[instrument(skip(self))]
    pub fn delete_until(
        &mut self,
        index: u64,
    ) -> Result<()> {
        self.ensure_open()?;
        self.journal.delete_until(index)?;

        let first_index = self.journal.first_index();
        if self.last_entry.as_ref().is_some_and(|entry| entry.index() < first_index) {
            self.last_entry = None;
        }
        debug!(index, first_index, "compacted log");
        Ok(())
    }

    /// Drops every entry; the next append receives `index`.
    #[instrument(skip(self))]
    pub fn reset(
        &mut self,
        index: u64,
    ) -> Result<()> {
        self.ensure_open()?;
        self.journal.reset(index)?;
        self.last_entry = None;

        let last_index = self.journal.last_index();
        if self.commit_index() > last_index {
            self.commit_index.store(last_index, Ordering::Release);
            COMMIT_INDEX_METRIC
                .with_label_values(&[self.name.as_str()])
                .set(last_index as i64);
        }
        info!(index, "reset log");
        Ok(())
    }

    /// Applies the configured flush strategy.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flusher.flush(&self.journal)
    }

    /// Flushes the journal synchronously, whatever the configured strategy.
    pub fn force_flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        flush_journal(self.journal.as_ref(), self.meta_store.as_ref(), &self.name, "forced").map(|_| ())
    }

    /// True when [`Self::flush`] returns only after the log is durable.
    pub fn flushes_directly(&self) -> bool {
        self.flusher.is_direct()
    }

    pub fn first_index(&self) -> u64 {
        self.journal.first_index()
    }

    pub fn last_index(&self) -> u64 {
        self.journal.last_index()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    pub fn is_open(&self) -> bool {
        !self.closed && self.journal.is_open()
    }

    pub fn open_reader(
        &self,
        mode: ReaderMode,
    ) -> Result<RaftLogReader> {
        self.ensure_open()?;
        Ok(RaftLogReader::new(self.journal.clone(), self.commit_index.clone(), mode))
    }

    pub fn open_committed_reader(&self) -> Result<RaftLogReader> {
        self.open_reader(ReaderMode::Committed)
    }

    pub fn open_uncommitted_reader(&self) -> Result<RaftLogReader> {
        self.open_reader(ReaderMode::All)
    }

    /// Cancels pending flushes and closes the journal. Outstanding readers stop
    /// returning entries. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.last_entry = None;

        let flusher_result = self.flusher.close();
        if let Err(e) = &flusher_result {
            warn!("flusher reported an error on close: {:?}", e);
        }
        self.journal.close()?;
        info!(name = %self.name, "closed raft log");
        flusher_result
    }
}
