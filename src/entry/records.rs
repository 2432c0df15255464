//! Wire-ready record views exchanged with the replication layer.

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use super::codec;
use super::ByteView;
use super::RaftLogEntry;
use crate::JournalRecord;
use crate::Result;
use crate::ASQN_IGNORE;

/// Self-contained durable record: everything needed to append it to another
/// node's journal without decoding the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRaftRecord {
    pub term: u64,
    pub index: u64,
    /// `ASQN_IGNORE` when the entry carries no application sequence number
    pub asqn: i64,
    pub checksum: u64,
    pub data: Bytes,
}

impl PersistedRaftRecord {
    pub fn new(
        term: u64,
        index: u64,
        asqn: i64,
        checksum: u64,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            term,
            index,
            asqn,
            checksum,
            data: data.into(),
        }
    }

    pub fn has_asqn(&self) -> bool {
        self.asqn != ASQN_IGNORE
    }

    /// Decodes the entry payload.
    pub fn decode_entry(&self) -> Result<RaftLogEntry> {
        Ok(codec::read_raft_log_entry(ByteView::from(&self.data))?)
    }

    pub(crate) fn to_journal_record(&self) -> JournalRecord {
        JournalRecord {
            index: self.index,
            asqn: self.asqn,
            checksum: self.checksum,
            data: self.data.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Steady-state replication record. Unlike [`PersistedRaftRecord`] it does not
/// carry the ASQN, which the receiver recovers from the entry itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedRaftRecord {
    pub term: u64,
    pub index: u64,
    pub checksum: u64,
    pub data: Bytes,
}

impl ReplicatedRaftRecord {
    pub fn new(
        term: u64,
        index: u64,
        checksum: u64,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            term,
            index,
            checksum,
            data: data.into(),
        }
    }

    pub fn decode_entry(&self) -> Result<RaftLogEntry> {
        Ok(codec::read_raft_log_entry(ByteView::from(&self.data))?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
