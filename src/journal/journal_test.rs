use tempfile::tempdir;
use tempfile::TempDir;

use super::*;
use crate::Error;
use crate::SystemError;
use crate::ASQN_IGNORE;

fn payload(i: u64) -> Vec<u8> {
    format!("record-{i:03}").into_bytes()
}

fn asqn_of(i: u64) -> i64 {
    if i % 3 == 0 {
        ASQN_IGNORE
    } else {
        i as i64 * 10
    }
}

fn fill(
    journal: &dyn Journal,
    count: u64,
) {
    for i in 1..=count {
        let record = journal.append(asqn_of(i), &payload(i)).unwrap();
        assert_eq!(record.index, i);
    }
}

fn read_indexes(reader: &mut dyn JournalReader) -> Vec<u64> {
    let mut indexes = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        indexes.push(record.index);
    }
    indexes
}

/// Runs `check` against an in-memory journal and a segmented journal small
/// enough to span several segments.
fn for_each_journal(check: impl Fn(&dyn Journal)) {
    let memory = InMemoryJournal::new(64);
    check(&memory);

    let dir: TempDir = tempdir().unwrap();
    let segmented = SegmentedJournal::open(SegmentedJournalOptions {
        max_segment_size: 256,
        max_entry_size: 64,
        min_free_disk_space: 1,
        index_density: 2,
        ..SegmentedJournalOptions::new("contract", dir.path())
    })
    .unwrap();
    check(&segmented);
}

#[test]
fn test_empty_journal_bounds() {
    for_each_journal(|journal| {
        assert!(journal.is_open());
        assert!(journal.is_empty());
        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.last_index(), 0);

        let mut reader = journal.open_reader();
        assert!(!reader.has_next());
        assert_eq!(reader.next_record().unwrap(), None);
        assert_eq!(reader.seek_to_last().unwrap(), 1);
        assert_eq!(reader.seek_to_asqn(100).unwrap(), 1);
    });
}

#[test]
fn test_append_assigns_contiguous_indexes() {
    for_each_journal(|journal| {
        fill(journal, 20);

        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.last_index(), 20);

        let mut reader = journal.open_reader();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.asqn, 10);
        assert_eq!(first.data.as_ref(), payload(1).as_slice());
        assert!(first.verify_checksum().is_ok());
        assert_eq!(read_indexes(reader.as_mut()), (2..=20).collect::<Vec<_>>());
    });
}

#[test]
fn test_append_record_validates_index_and_checksum() {
    for_each_journal(|journal| {
        fill(journal, 2);

        let gap = JournalRecord::new(5, ASQN_IGNORE, payload(5));
        match journal.append_record(&gap) {
            Err(Error::System(SystemError::Storage(StorageError::InvalidIndex { expected: 3, actual: 5 }))) => {}
            other => panic!("unexpected result: {other:?}"),
        }

        let mut corrupted = JournalRecord::new(3, ASQN_IGNORE, payload(3));
        corrupted.checksum ^= 1;
        assert!(matches!(
            journal.append_record(&corrupted),
            Err(Error::System(SystemError::Storage(StorageError::InvalidChecksum { index: 3, .. })))
        ));

        journal.append_record(&JournalRecord::new(3, 30, payload(3))).unwrap();
        assert_eq!(journal.last_index(), 3);
    });
}

#[test]
fn test_append_rejects_oversized_entry() {
    for_each_journal(|journal| {
        let err = journal.append(ASQN_IGNORE, &[0u8; 65]).unwrap_err();
        assert!(matches!(
            err.as_storage_error(),
            Some(StorageError::EntryTooLarge { size: 65, max_size: 64 })
        ));
        assert!(journal.is_empty());
    });
}

#[test]
fn test_seek_clamps_to_bounds() {
    for_each_journal(|journal| {
        fill(journal, 10);
        let mut reader = journal.open_reader();

        assert_eq!(reader.seek(0).unwrap(), 1);
        assert_eq!(reader.seek(7).unwrap(), 7);
        assert_eq!(reader.next_record().unwrap().unwrap().index, 7);
        assert_eq!(reader.seek(100).unwrap(), 11);
        assert!(!reader.has_next());
        assert_eq!(reader.seek_to_last().unwrap(), 10);
        assert_eq!(read_indexes(reader.as_mut()), vec![10]);
        assert_eq!(reader.seek_to_first().unwrap(), 1);
        assert!(reader.has_next());
    });
}

#[test]
fn test_seek_to_asqn_finds_last_lower_or_equal() {
    for_each_journal(|journal| {
        fill(journal, 20);
        let mut reader = journal.open_reader();

        assert_eq!(reader.seek_to_asqn(55).unwrap(), 5);
        // 6 carries no asqn, 7 is above
        assert_eq!(reader.seek_to_asqn(65).unwrap(), 5);
        assert_eq!(reader.seek_to_asqn(125).unwrap(), 11);
        assert_eq!(reader.seek_to_asqn(1_000).unwrap(), 20);
        assert_eq!(reader.seek_to_asqn(5).unwrap(), 1);
        assert_eq!(reader.next_record().unwrap().unwrap().index, 1);
    });
}

#[test]
fn test_delete_after_truncates_suffix() {
    for_each_journal(|journal| {
        fill(journal, 20);
        let mut reader = journal.open_reader();
        reader.seek(15).unwrap();

        journal.delete_after(9).unwrap();
        assert_eq!(journal.last_index(), 9);
        assert!(!reader.has_next());

        let record = journal.append(ASQN_IGNORE, b"replacement").unwrap();
        assert_eq!(record.index, 10);

        reader.seek(8).unwrap();
        let tail: Vec<_> = std::iter::from_fn(|| reader.next_record().unwrap()).collect();
        assert_eq!(tail.iter().map(|r| r.index).collect::<Vec<_>>(), vec![8, 9, 10]);
        assert_eq!(tail[2].data.as_ref(), b"replacement");

        // asqns above the truncation point are forgotten
        assert_eq!(reader.seek_to_asqn(1_000).unwrap(), 8);
    });
}

#[test]
fn test_delete_after_at_or_beyond_last_is_noop() {
    for_each_journal(|journal| {
        fill(journal, 5);
        journal.delete_after(5).unwrap();
        journal.delete_after(50).unwrap();
        assert_eq!(journal.last_index(), 5);
    });
}

#[test]
fn test_index_arithmetic_at_upper_bound() {
    for_each_journal(|journal| {
        fill(journal, 3);
        journal.delete_after(u64::MAX).unwrap();
        journal.delete_until(u64::MAX).unwrap();
        assert_eq!(journal.last_index(), 3);

        journal.reset(u64::MAX).unwrap();
        assert_eq!(journal.last_index(), u64::MAX - 1);
        assert_eq!(journal.append(ASQN_IGNORE, b"last").unwrap().index, u64::MAX);
        assert_eq!(journal.last_index(), u64::MAX);

        journal.delete_after(u64::MAX).unwrap();
        assert_eq!(journal.last_index(), u64::MAX);
        let mut reader = journal.open_reader();
        assert_eq!(reader.seek(u64::MAX).unwrap(), u64::MAX);
    });
}

#[test]
fn test_delete_after_everything_empties_journal() {
    for_each_journal(|journal| {
        fill(journal, 12);
        journal.delete_after(0).unwrap();

        assert!(journal.is_empty());
        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.append(ASQN_IGNORE, b"again").unwrap().index, 1);
    });
}

#[test]
fn test_delete_until_compacts_prefix() {
    for_each_journal(|journal| {
        fill(journal, 20);
        journal.delete_until(12).unwrap();

        let first = journal.first_index();
        assert!(first > 1 && first <= 12, "first index {first}");
        assert_eq!(journal.last_index(), 20);

        let mut reader = journal.open_reader();
        assert_eq!(reader.seek(1).unwrap(), first);
        assert_eq!(read_indexes(reader.as_mut()), (first..=20).collect::<Vec<_>>());
    });
}

#[test]
fn test_reader_skips_compacted_records() {
    for_each_journal(|journal| {
        fill(journal, 20);
        let mut reader = journal.open_reader();
        journal.delete_until(15).unwrap();

        let first = journal.first_index();
        assert!(reader.has_next());
        assert_eq!(reader.next_record().unwrap().unwrap().index, first);
    });
}

#[test]
fn test_reset_rewinds_next_index() {
    for_each_journal(|journal| {
        fill(journal, 8);
        journal.reset(42).unwrap();

        assert!(journal.is_empty());
        assert_eq!(journal.first_index(), 42);
        assert_eq!(journal.last_index(), 41);
        assert_eq!(journal.append(ASQN_IGNORE, b"after reset").unwrap().index, 42);

        let mut reader = journal.open_reader();
        assert_eq!(read_indexes(reader.as_mut()), vec![42]);
    });
}

#[test]
fn test_close_invalidates_readers() {
    for_each_journal(|journal| {
        fill(journal, 3);
        let mut reader = journal.open_reader();
        assert!(reader.has_next());

        journal.close().unwrap();

        assert!(!journal.is_open());
        assert!(!reader.has_next());
        assert!(matches!(
            reader.next_record().unwrap_err().as_storage_error(),
            Some(StorageError::JournalClosed)
        ));
        assert!(journal.append(ASQN_IGNORE, b"late").is_err());
        assert!(journal.flush().is_err());
    });
}
