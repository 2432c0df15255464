use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::Journal;
use super::JournalReader;
use super::JournalRecord;
use crate::Result;
use crate::StorageError;
use crate::ASQN_IGNORE;

#[derive(Debug)]
struct MemState {
    records: VecDeque<JournalRecord>,
    /// Index of `records[0]`, or of the next append when empty
    first_index: u64,
    open: bool,
}

impl MemState {
    #[inline]
    fn last_index(&self) -> u64 {
        (self.first_index - 1) + self.records.len() as u64
    }

    fn get(
        &self,
        index: u64,
    ) -> Option<&JournalRecord> {
        if index < self.first_index {
            return None;
        }
        self.records.get((index - self.first_index) as usize)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(StorageError::JournalClosed.into());
        }
        Ok(())
    }

    fn clamp(
        &self,
        index: u64,
    ) -> u64 {
        index.clamp(self.first_index, self.last_index().saturating_add(1))
    }
}

/// Volatile journal keeping every record in memory.
#[derive(Debug, Clone)]
pub struct InMemoryJournal {
    state: Arc<RwLock<MemState>>,
    max_entry_size: usize,
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl InMemoryJournal {
    pub fn new(max_entry_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemState {
                records: VecDeque::new(),
                first_index: 1,
                open: true,
            })),
            max_entry_size,
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }
}

impl Journal for InMemoryJournal {
    fn append(
        &self,
        asqn: i64,
        data: &[u8],
    ) -> Result<JournalRecord> {
        if data.len() > self.max_entry_size {
            return Err(StorageError::EntryTooLarge {
                size: data.len(),
                max_size: self.max_entry_size,
            }
            .into());
        }

        let mut state = self.state.write();
        state.ensure_open()?;
        let record = JournalRecord::new(state.last_index() + 1, asqn, data.to_vec());
        state.records.push_back(record.clone());
        trace!(index = record.index, asqn, "appended record");
        Ok(record)
    }

    fn append_record(
        &self,
        record: &JournalRecord,
    ) -> Result<()> {
        if record.data.len() > self.max_entry_size {
            return Err(StorageError::EntryTooLarge {
                size: record.data.len(),
                max_size: self.max_entry_size,
            }
            .into());
        }
        record.verify_checksum()?;

        let mut state = self.state.write();
        state.ensure_open()?;
        let expected = state.last_index() + 1;
        if record.index != expected {
            return Err(StorageError::InvalidIndex {
                expected,
                actual: record.index,
            }
            .into());
        }
        state.records.push_back(record.clone());
        Ok(())
    }

    fn open_reader(&self) -> Box<dyn JournalReader> {
        let next_index = self.state.read().first_index;
        Box::new(InMemoryJournalReader {
            state: self.state.clone(),
            next_index,
        })
    }

    fn is_open(&self) -> bool {
        self.state.read().open
    }

    fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    fn first_index(&self) -> u64 {
        self.state.read().first_index
    }

    fn last_index(&self) -> u64 {
        self.state.read().last_index()
    }

    fn delete_after(
        &self,
        index: u64,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        if index >= state.last_index() {
            return Ok(());
        }
        if index + 1 < state.first_index {
            debug!(index, first_index = state.first_index, "delete_after below first index, resetting");
            state.records.clear();
            state.first_index = index + 1;
            return Ok(());
        }
        let keep = (index + 1 - state.first_index) as usize;
        state.records.truncate(keep);
        Ok(())
    }

    fn delete_until(
        &self,
        index: u64,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        let target = index.min(state.last_index().saturating_add(1));
        while state.first_index < target {
            state.records.pop_front();
            state.first_index += 1;
        }
        Ok(())
    }

    fn reset(
        &self,
        next_index: u64,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        state.records.clear();
        state.first_index = next_index.max(1);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.state.read().ensure_open()
    }

    fn close(&self) -> Result<()> {
        self.state.write().open = false;
        Ok(())
    }
}

pub struct InMemoryJournalReader {
    state: Arc<RwLock<MemState>>,
    next_index: u64,
}

impl JournalReader for InMemoryJournalReader {
    fn has_next(&mut self) -> bool {
        let state = self.state.read();
        state.open && state.get(self.next_index.max(state.first_index)).is_some()
    }

    fn next_record(&mut self) -> Result<Option<JournalRecord>> {
        let state = self.state.read();
        state.ensure_open()?;
        // records below the first index were compacted underneath the reader
        self.next_index = self.next_index.max(state.first_index);
        let record = state.get(self.next_index).cloned();
        if record.is_some() {
            self.next_index += 1;
        }
        Ok(record)
    }

    fn seek(
        &mut self,
        index: u64,
    ) -> Result<u64> {
        self.next_index = self.state.read().clamp(index);
        Ok(self.next_index)
    }

    fn seek_to_first(&mut self) -> Result<u64> {
        self.next_index = self.state.read().first_index;
        Ok(self.next_index)
    }

    fn seek_to_last(&mut self) -> Result<u64> {
        let state = self.state.read();
        self.next_index = state.last_index().max(state.first_index);
        Ok(self.next_index)
    }

    fn seek_to_asqn(
        &mut self,
        asqn: i64,
    ) -> Result<u64> {
        let state = self.state.read();
        self.next_index = state
            .records
            .iter()
            .rev()
            .find(|r| r.asqn != ASQN_IGNORE && r.asqn <= asqn)
            .map(|r| r.index)
            .unwrap_or(state.first_index);
        Ok(self.next_index)
    }
}
