use bytes::Bytes;

use super::codec::*;
use super::*;
use crate::CodecError;

fn configuration() -> ConfigurationEntry {
    ConfigurationEntry::new(
        1_700_000_000_000,
        vec![
            RaftMember::new("node-1", MemberType::Active, 10),
            RaftMember::new("node-2", MemberType::Promotable, 11),
            RaftMember::new("nœud-3", MemberType::Passive, 12),
        ],
        vec![RaftMember::new("node-1", MemberType::Inactive, 9)],
    )
}

#[test]
fn test_round_trip_each_variant() {
    let entries = vec![
        RaftLogEntry::application(3, 10, 15, Bytes::from_static(b"batch of records")),
        RaftLogEntry::application(u64::MAX, i64::MIN, i64::MAX, Bytes::new()),
        RaftLogEntry::initial(7),
        RaftLogEntry::configuration(2, configuration()),
        RaftLogEntry::configuration(0, ConfigurationEntry::new(0, vec![], vec![])),
    ];

    for entry in entries {
        let encoded = encode_to_vec(&entry).unwrap();
        assert_eq!(encoded.len(), encoded_len(&entry));

        let decoded = read_raft_log_entry(&encoded).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.term(), entry.term());
    }
}

#[test]
fn test_write_only_touches_target_range() {
    let entry = RaftLogEntry::application(4, 1, 1, Bytes::from_static(b"abc"));
    let len = encoded_len(&entry);
    let offset = 7;
    let mut buffer = vec![0xAAu8; offset + len + 5];

    let written = write_raft_log_entry(&entry, &mut buffer, offset).unwrap();

    assert_eq!(written, len);
    assert!(buffer[..offset].iter().all(|b| *b == 0xAA));
    assert!(buffer[offset + len..].iter().all(|b| *b == 0xAA));
    let decoded = read_raft_log_entry(ByteView::bounded(&buffer, offset, written)).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn test_write_into_small_buffer_fails_without_writing() {
    let entry = RaftLogEntry::configuration(1, configuration());
    let mut buffer = vec![0u8; encoded_len(&entry) - 1];

    let err = write_raft_log_entry(&entry, &mut buffer, 0).unwrap_err();

    assert!(matches!(err, CodecError::BufferTooSmall { .. }));
    assert!(buffer.iter().all(|b| *b == 0));
}

#[test]
fn test_offset_past_end_is_rejected() {
    let mut buffer = vec![0u8; 16];
    let err = write_initial_entry(1, &InitialEntry, &mut buffer, usize::MAX).unwrap_err();
    assert!(matches!(err, CodecError::BufferTooSmall { offset: usize::MAX, .. }));
}

#[test]
fn test_read_unknown_kind() {
    let mut encoded = encode_to_vec(&RaftLogEntry::initial(1)).unwrap();
    encoded[1] = 42;

    assert_eq!(read_raft_log_entry(&encoded).unwrap_err(), CodecError::UnknownEntryKind(42));
}

#[test]
fn test_read_unsupported_version() {
    let mut encoded = encode_to_vec(&RaftLogEntry::initial(1)).unwrap();
    encoded[0] = 9;

    assert_eq!(read_raft_log_entry(&encoded).unwrap_err(), CodecError::UnsupportedVersion(9));
}

#[test]
fn test_read_truncated_application_data() {
    let encoded = encode_to_vec(&RaftLogEntry::application(1, 1, 1, Bytes::from_static(b"payload"))).unwrap();
    let err = read_raft_log_entry(&encoded[..encoded.len() - 2]).unwrap_err();

    assert!(matches!(err, CodecError::Truncated { .. }));
}

#[test]
fn test_read_rejects_unknown_member_type() {
    let entry = RaftLogEntry::configuration(
        1,
        ConfigurationEntry::new(5, vec![RaftMember::new("a", MemberType::Active, 1)], vec![]),
    );
    let mut encoded = encode_to_vec(&entry).unwrap();
    // header(10) + timestamp(8) + count(4) + id_len(2) + id(1) => member type byte
    encoded[10 + 8 + 4 + 2 + 1] = 0;

    assert_eq!(read_raft_log_entry(&encoded).unwrap_err(), CodecError::UnknownMemberType(0));
}

#[test]
fn test_read_rejects_oversized_member_count() {
    let entry = RaftLogEntry::configuration(1, ConfigurationEntry::new(5, vec![], vec![]));
    let mut encoded = encode_to_vec(&entry).unwrap();
    encoded[18..22].copy_from_slice(&u32::MAX.to_le_bytes());

    assert!(matches!(
        read_raft_log_entry(&encoded).unwrap_err(),
        CodecError::Truncated { .. }
    ));
}

#[test]
fn test_shared_buffer_decodes_data_zero_copy() {
    let entry = RaftLogEntry::application(1, 5, 6, Bytes::from_static(b"zero-copy"));
    let encoded = Bytes::from(encode_to_vec(&entry).unwrap());

    let decoded = read_raft_log_entry(&encoded).unwrap();
    let RaftEntry::Application(app) = decoded.entry() else {
        panic!("expected application entry");
    };

    let data_offset = encoded.len() - app.data.len();
    assert_eq!(app.data.as_ptr(), encoded[data_offset..].as_ptr());
}
