use std::fmt;

use bytes::Bytes;

/// Role of a member inside a cluster configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberType {
    Active,
    Passive,
    Promotable,
    Inactive,
}

impl MemberType {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            MemberType::Active => 1,
            MemberType::Passive => 2,
            MemberType::Promotable => 3,
            MemberType::Inactive => 4,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MemberType::Active),
            2 => Some(MemberType::Passive),
            3 => Some(MemberType::Promotable),
            4 => Some(MemberType::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftMember {
    pub member_id: String,
    pub member_type: MemberType,
    /// Epoch millis of the last membership change for this member
    pub updated: i64,
}

impl RaftMember {
    pub fn new(
        member_id: impl Into<String>,
        member_type: MemberType,
        updated: i64,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            member_type,
            updated,
        }
    }
}

/// Opaque application payload covering the ASQN range `[lowest_asqn, highest_asqn]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    pub lowest_asqn: i64,
    pub highest_asqn: i64,
    pub data: Bytes,
}

impl ApplicationEntry {
    pub fn new(
        lowest_asqn: i64,
        highest_asqn: i64,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            lowest_asqn,
            highest_asqn,
            data: data.into(),
        }
    }
}

/// Written by a new leader as the first entry of its term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationEntry {
    pub timestamp: i64,
    pub new_members: Vec<RaftMember>,
    pub old_members: Vec<RaftMember>,
}

impl ConfigurationEntry {
    pub fn new(
        timestamp: i64,
        new_members: Vec<RaftMember>,
        old_members: Vec<RaftMember>,
    ) -> Self {
        Self {
            timestamp,
            new_members,
            old_members,
        }
    }

    /// True while the configuration is a joint one (old and new members both vote).
    pub fn is_joint(&self) -> bool {
        !self.old_members.is_empty()
    }
}

/// Kind-specific payload of a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaftEntry {
    Application(ApplicationEntry),
    Initial(InitialEntry),
    Configuration(ConfigurationEntry),
}

impl RaftEntry {
    /// Application sequence number carried by this entry, if any.
    pub fn asqn(&self) -> Option<i64> {
        match self {
            RaftEntry::Application(entry) => Some(entry.lowest_asqn),
            RaftEntry::Initial(_) | RaftEntry::Configuration(_) => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RaftEntry::Application(_) => "application",
            RaftEntry::Initial(_) => "initial",
            RaftEntry::Configuration(_) => "configuration",
        }
    }
}

impl From<ApplicationEntry> for RaftEntry {
    fn from(entry: ApplicationEntry) -> Self {
        RaftEntry::Application(entry)
    }
}

impl From<InitialEntry> for RaftEntry {
    fn from(entry: InitialEntry) -> Self {
        RaftEntry::Initial(entry)
    }
}

impl From<ConfigurationEntry> for RaftEntry {
    fn from(entry: ConfigurationEntry) -> Self {
        RaftEntry::Configuration(entry)
    }
}

/// A log entry as written by the leader: the term it was created in plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftLogEntry {
    term: u64,
    entry: RaftEntry,
}

impl RaftLogEntry {
    pub fn new(
        term: u64,
        entry: impl Into<RaftEntry>,
    ) -> Self {
        Self {
            term,
            entry: entry.into(),
        }
    }

    pub fn application(
        term: u64,
        lowest_asqn: i64,
        highest_asqn: i64,
        data: impl Into<Bytes>,
    ) -> Self {
        Self::new(term, ApplicationEntry::new(lowest_asqn, highest_asqn, data))
    }

    pub fn initial(term: u64) -> Self {
        Self::new(term, InitialEntry)
    }

    pub fn configuration(
        term: u64,
        entry: ConfigurationEntry,
    ) -> Self {
        Self::new(term, entry)
    }

    #[inline]
    pub fn term(&self) -> u64 {
        self.term
    }

    #[inline]
    pub fn entry(&self) -> &RaftEntry {
        &self.entry
    }

    pub fn into_parts(self) -> (u64, RaftEntry) {
        (self.term, self.entry)
    }

    #[inline]
    pub fn asqn(&self) -> Option<i64> {
        self.entry.asqn()
    }
}

impl fmt::Display for RaftLogEntry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}(term={})", self.entry.kind_name(), self.term)
    }
}
