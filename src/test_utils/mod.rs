//! Builders shared by the unit tests of all modules.
mod entry_builder;

use std::sync::Arc;

pub use entry_builder::*;

use crate::FlushMetaStore;
use crate::IndexedRaftLogEntry;
use crate::InMemoryJournal;
use crate::InMemoryMetaStore;
use crate::RaftLog;
use crate::RaftLogBuilder;

/// Log over an in-memory journal with direct flushing.
pub fn in_memory_log() -> RaftLog {
    in_memory_log_with_meta(Arc::new(InMemoryMetaStore::default()))
}

pub fn in_memory_log_with_meta(meta_store: Arc<dyn FlushMetaStore>) -> RaftLog {
    RaftLogBuilder::new()
        .with_name("test-partition")
        .with_journal(Arc::new(InMemoryJournal::default()))
        .with_meta_store(meta_store)
        .build()
        .unwrap()
}

/// Appends `count` application entries of `term`; entry `i` carries asqn `i`
/// when the log starts empty.
pub fn populate(
    log: &mut RaftLog,
    count: u64,
    term: u64,
) -> Vec<IndexedRaftLogEntry> {
    let mut builder = EntryBuilder::new(term);
    (0..count)
        .map(|i| log.append(builder.application(format!("command-{i}").as_bytes())).unwrap())
        .collect()
}
