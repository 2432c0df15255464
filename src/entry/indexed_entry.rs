use super::codec;
use super::ApplicationEntry;
use super::ByteView;
use super::ConfigurationEntry;
use super::InitialEntry;
use super::PersistedRaftRecord;
use super::RaftEntry;
use super::RaftLogEntry;
use super::ReplicatedRaftRecord;
use crate::JournalRecord;
use crate::LogError;
use crate::Result;

/// A decoded log entry together with the journal record it was read from.
///
/// The index is assigned by the journal, never by the caller.
#[derive(Debug, Clone)]
pub struct IndexedRaftLogEntry {
    term: u64,
    entry: RaftEntry,
    record: JournalRecord,
}

impl IndexedRaftLogEntry {
    pub(crate) fn new(
        entry: RaftLogEntry,
        record: JournalRecord,
    ) -> Self {
        let (term, entry) = entry.into_parts();
        Self { term, entry, record }
    }

    /// Decodes the entry stored in `record`, slicing application data out of the
    /// record's buffer without copying.
    pub(crate) fn decode(record: JournalRecord) -> Result<Self> {
        let entry = codec::read_raft_log_entry(ByteView::from(&record.data))?;
        Ok(Self::new(entry, record))
    }

    #[inline]
    pub fn index(&self) -> u64 {
        self.record.index
    }

    #[inline]
    pub fn term(&self) -> u64 {
        self.term
    }

    #[inline]
    pub fn asqn(&self) -> i64 {
        self.record.asqn
    }

    #[inline]
    pub fn checksum(&self) -> u64 {
        self.record.checksum
    }

    #[inline]
    pub fn entry(&self) -> &RaftEntry {
        &self.entry
    }

    pub fn record(&self) -> &JournalRecord {
        &self.record
    }

    pub fn is_application(&self) -> bool {
        matches!(self.entry, RaftEntry::Application(_))
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.entry, RaftEntry::Initial(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.entry, RaftEntry::Configuration(_))
    }

    pub fn application_entry(&self) -> Result<&ApplicationEntry> {
        match &self.entry {
            RaftEntry::Application(entry) => Ok(entry),
            other => Err(self.unexpected("application", other)),
        }
    }

    pub fn initial_entry(&self) -> Result<&InitialEntry> {
        match &self.entry {
            RaftEntry::Initial(entry) => Ok(entry),
            other => Err(self.unexpected("initial", other)),
        }
    }

    pub fn configuration_entry(&self) -> Result<&ConfigurationEntry> {
        match &self.entry {
            RaftEntry::Configuration(entry) => Ok(entry),
            other => Err(self.unexpected("configuration", other)),
        }
    }

    fn unexpected(
        &self,
        expected: &'static str,
        actual: &RaftEntry,
    ) -> crate::Error {
        LogError::UnexpectedEntryType {
            index: self.index(),
            expected,
            actual: actual.kind_name(),
        }
        .into()
    }

    /// Self-contained record for replication and recovery.
    pub fn to_persisted_record(&self) -> PersistedRaftRecord {
        PersistedRaftRecord {
            term: self.term,
            index: self.record.index,
            asqn: self.record.asqn,
            checksum: self.record.checksum,
            data: self.record.data.clone(),
        }
    }

    /// Lighter record for steady-state replication; the ASQN travels inside `data`.
    pub fn to_replicated_record(&self) -> ReplicatedRaftRecord {
        ReplicatedRaftRecord {
            term: self.term,
            index: self.record.index,
            checksum: self.record.checksum,
            data: self.record.data.clone(),
        }
    }
}

impl PartialEq for IndexedRaftLogEntry {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.record.index == other.record.index
            && self.term == other.term
            && self.record.asqn == other.record.asqn
            && self.record.checksum == other.record.checksum
            && self.entry == other.entry
    }
}

impl Eq for IndexedRaftLogEntry {}
