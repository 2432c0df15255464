//! Journal: the append-only storage primitive the raft log is built on.
//!
//! The log only talks to the [`Journal`] and [`JournalReader`] traits. Two
//! implementations ship with the crate:
//! - [`InMemoryJournal`]: volatile, used for embedding and tests
//! - [`SegmentedJournal`]: segment files on disk with a sparse index

mod mem_journal;
mod segmented;

#[cfg(test)]
mod journal_test;

use bytes::Bytes;
pub use mem_journal::*;
pub use segmented::*;

use crate::Result;
use crate::StorageError;

/// A record as stored by the journal. The index is assigned by the journal on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub index: u64,
    /// `ASQN_IGNORE` when the record has no application sequence number
    pub asqn: i64,
    /// CRC32 of `data`
    pub checksum: u64,
    pub data: Bytes,
}

impl JournalRecord {
    pub fn new(
        index: u64,
        asqn: i64,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            index,
            asqn,
            checksum: Self::checksum_of(&data),
            data,
        }
    }

    #[inline]
    pub fn checksum_of(data: &[u8]) -> u64 {
        crc32fast::hash(data) as u64
    }

    pub fn verify_checksum(&self) -> Result<()> {
        let actual = Self::checksum_of(&self.data);
        if actual != self.checksum {
            return Err(StorageError::InvalidChecksum {
                index: self.index,
                expected: self.checksum,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

/// Append-only, index-addressed record store.
///
/// Index semantics: an empty journal has `last_index() == first_index() - 1`;
/// the next append receives `last_index() + 1`.
pub trait Journal: Send + Sync + 'static {
    /// Appends `data` and returns the stored record with its assigned index.
    fn append(
        &self,
        asqn: i64,
        data: &[u8],
    ) -> Result<JournalRecord>;

    /// Appends a record serialized elsewhere. Its index must be `last_index() + 1`
    /// and its checksum must match its data.
    fn append_record(
        &self,
        record: &JournalRecord,
    ) -> Result<()>;

    /// Opens an independent cursor positioned at the first record.
    fn open_reader(&self) -> Box<dyn JournalReader>;

    fn is_open(&self) -> bool;

    fn is_empty(&self) -> bool;

    fn first_index(&self) -> u64;

    fn last_index(&self) -> u64;

    /// Removes every record with an index greater than `index`.
    fn delete_after(
        &self,
        index: u64,
    ) -> Result<()>;

    /// Compacts records with an index lower than `index`. Implementations may
    /// retain more than requested.
    fn delete_until(
        &self,
        index: u64,
    ) -> Result<()>;

    /// Drops all records; the next append receives `next_index`.
    fn reset(
        &self,
        next_index: u64,
    ) -> Result<()>;

    /// Blocks until every appended record reached stable storage.
    fn flush(&self) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Sequential cursor over a journal. Each reader owns its position.
pub trait JournalReader: Send {
    /// False once the journal is closed.
    fn has_next(&mut self) -> bool;

    /// Returns the record at the cursor and advances, `Ok(None)` at the end.
    fn next_record(&mut self) -> Result<Option<JournalRecord>>;

    /// Positions the cursor at `index`, clamped to the journal bounds.
    /// Returns the index of the record the next read returns.
    fn seek(
        &mut self,
        index: u64,
    ) -> Result<u64>;

    fn seek_to_first(&mut self) -> Result<u64>;

    /// Positions the cursor at the last record.
    fn seek_to_last(&mut self) -> Result<u64>;

    /// Positions the cursor at the last record whose ASQN is `<= asqn`, or at
    /// the first record if there is none. Returns the resulting index.
    fn seek_to_asqn(
        &mut self,
        asqn: i64,
    ) -> Result<u64>;
}
