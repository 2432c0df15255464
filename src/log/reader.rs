use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::trace;

use crate::IndexedRaftLogEntry;
use crate::Journal;
use crate::JournalReader;
use crate::LogError;
use crate::Result;

/// Which entries a [`RaftLogReader`] may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Every entry in the log, committed or not
    All,
    /// Only entries at or below the commit index
    Committed,
}

/// Sequential, seekable cursor over the raft log.
///
/// A reader is bounded by the log as it is at each call: entries appended
/// after the reader was opened become visible, and in [`ReaderMode::Committed`]
/// the bound moves with the commit index.
pub struct RaftLogReader {
    journal: Arc<dyn Journal>,
    cursor: Box<dyn JournalReader>,
    commit_index: Arc<AtomicU64>,
    mode: ReaderMode,
    next_index: u64,
}

impl RaftLogReader {
    pub(crate) fn new(
        journal: Arc<dyn Journal>,
        commit_index: Arc<AtomicU64>,
        mode: ReaderMode,
    ) -> Self {
        let cursor = journal.open_reader();
        let next_index = journal.first_index();
        Self {
            journal,
            cursor,
            commit_index,
            mode,
            next_index,
        }
    }

    #[inline]
    pub fn mode(&self) -> ReaderMode {
        self.mode
    }

    /// Index of the entry the next call to [`Self::next_entry`] returns.
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    #[inline]
    fn commit_index(&self) -> u64 {
        self.commit_index.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.journal.is_open() {
            return Err(LogError::Closed.into());
        }
        Ok(())
    }

    pub fn has_next(&mut self) -> bool {
        if self.mode == ReaderMode::Committed {
            let next = self.next_index.max(self.journal.first_index());
            if next > self.commit_index() {
                return false;
            }
        }
        self.cursor.has_next()
    }

    pub fn next_entry(&mut self) -> Result<IndexedRaftLogEntry> {
        self.ensure_open()?;
        if !self.has_next() {
            return Err(LogError::IteratorExhausted {
                next_index: self.next_index,
            }
            .into());
        }

        let Some(record) = self.cursor.next_record()? else {
            return Err(LogError::IteratorExhausted {
                next_index: self.next_index,
            }
            .into());
        };
        let entry = IndexedRaftLogEntry::decode(record)?;
        self.next_index = entry.index() + 1;
        Ok(entry)
    }

    /// Moves back to the first entry of the log.
    pub fn reset(&mut self) -> Result<u64> {
        let first = self.journal.first_index();
        self.reset_to(first)
    }

    /// Positions the reader so the next entry returned is `index`, clamped to
    /// the log bounds and, in committed mode, to `commit_index + 1`.
    pub fn reset_to(
        &mut self,
        index: u64,
    ) -> Result<u64> {
        self.ensure_open()?;
        let target = match self.mode {
            ReaderMode::All => index,
            ReaderMode::Committed => index.min(self.commit_index() + 1),
        };
        self.next_index = self.cursor.seek(target)?;
        trace!(index, next_index = self.next_index, mode = ?self.mode, "reader repositioned");
        Ok(self.next_index)
    }

    /// Positions the reader at the last entry it may return.
    pub fn seek_to_last(&mut self) -> Result<u64> {
        self.ensure_open()?;
        match self.mode {
            ReaderMode::All => {
                self.next_index = self.cursor.seek_to_last()?;
                Ok(self.next_index)
            }
            ReaderMode::Committed => {
                let commit_index = self.commit_index();
                self.reset_to(commit_index)
            }
        }
    }

    /// Positions the reader at the last entry whose ASQN is `<= asqn`.
    ///
    /// Fails with [`LogError::UnsupportedSeek`] when that entry is not
    /// committed yet; the reader keeps its position in that case.
    pub fn seek_to_asqn(
        &mut self,
        asqn: i64,
    ) -> Result<u64> {
        self.ensure_open()?;
        let index = self.cursor.seek_to_asqn(asqn)?;
        let commit_index = self.commit_index();

        if !self.journal.is_empty() && index > commit_index {
            self.cursor.seek(self.next_index)?;
            return Err(LogError::UnsupportedSeek {
                asqn,
                index,
                commit_index,
            }
            .into());
        }

        self.next_index = index;
        Ok(index)
    }
}

impl Iterator for RaftLogReader {
    type Item = Result<IndexedRaftLogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_entry())
    }
}
