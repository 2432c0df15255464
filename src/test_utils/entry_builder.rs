use bytes::Bytes;

use crate::ConfigurationEntry;
use crate::MemberType;
use crate::RaftLogEntry;
use crate::RaftMember;

/// Produces entries of one term with consecutive ASQNs.
pub struct EntryBuilder {
    term: u64,
    next_asqn: i64,
}

impl EntryBuilder {
    pub fn new(term: u64) -> Self {
        Self { term, next_asqn: 1 }
    }

    /// Application entry covering a single ASQN.
    pub fn application(
        &mut self,
        data: &[u8],
    ) -> RaftLogEntry {
        let asqn = self.next_asqn;
        self.next_asqn += 1;
        RaftLogEntry::application(self.term, asqn, asqn, Bytes::copy_from_slice(data))
    }

    pub fn initial(&self) -> RaftLogEntry {
        RaftLogEntry::initial(self.term)
    }

    pub fn configuration(
        &self,
        members: &[&str],
    ) -> RaftLogEntry {
        let new_members = members
            .iter()
            .enumerate()
            .map(|(i, id)| RaftMember::new(*id, MemberType::Active, i as i64))
            .collect();
        RaftLogEntry::configuration(self.term, ConfigurationEntry::new(1_700_000_000_000, new_members, vec![]))
    }
}
