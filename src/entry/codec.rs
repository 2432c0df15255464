//! Binary codec for raft log entries.
//!
//! Layout (little-endian):
//!
//! ```text
//! u8 version | u8 kind | u64 term | payload
//!
//! Application:   i64 lowest_asqn | i64 highest_asqn | u32 len | data
//! Initial:       (empty)
//! Configuration: i64 timestamp | u32 n | n * member | u32 m | m * member
//! member:        u16 id_len | id (utf-8) | u8 member_type | i64 updated
//! ```
//!
//! The layout is shared by the writer and reader of the same log and must stay
//! stable across restarts.

use bytes::Buf;
use bytes::BufMut;

use super::ApplicationEntry;
use super::ByteView;
use super::ConfigurationEntry;
use super::InitialEntry;
use super::MemberType;
use super::RaftEntry;
use super::RaftLogEntry;
use super::RaftMember;
use crate::CodecError;

pub(crate) const ENCODING_VERSION: u8 = 1;

const KIND_APPLICATION: u8 = 1;
const KIND_INITIAL: u8 = 2;
const KIND_CONFIGURATION: u8 = 3;

const HEADER_LEN: usize = 1 + 1 + 8;
const APPLICATION_FIXED_LEN: usize = 8 + 8 + 4;
const MEMBER_FIXED_LEN: usize = 2 + 1 + 8;

type CodecResult<T> = std::result::Result<T, CodecError>;

/// Exact number of bytes `write_raft_log_entry` produces for `entry`.
pub fn encoded_len(entry: &RaftLogEntry) -> usize {
    HEADER_LEN + payload_len(entry.entry())
}

fn payload_len(entry: &RaftEntry) -> usize {
    match entry {
        RaftEntry::Application(app) => APPLICATION_FIXED_LEN + app.data.len(),
        RaftEntry::Initial(_) => 0,
        RaftEntry::Configuration(config) => {
            8 + members_len(&config.new_members) + members_len(&config.old_members)
        }
    }
}

fn members_len(members: &[RaftMember]) -> usize {
    4 + members
        .iter()
        .map(|m| MEMBER_FIXED_LEN + m.member_id.len())
        .sum::<usize>()
}

/// Writes `entry` into `buffer` starting at `offset`. Returns the number of bytes written.
///
/// Only `[offset, offset + written)` is touched; on error nothing is written.
pub fn write_raft_log_entry(
    entry: &RaftLogEntry,
    buffer: &mut [u8],
    offset: usize,
) -> CodecResult<usize> {
    match entry.entry() {
        RaftEntry::Application(app) => write_application_entry(entry.term(), app, buffer, offset),
        RaftEntry::Initial(initial) => write_initial_entry(entry.term(), initial, buffer, offset),
        RaftEntry::Configuration(config) => write_configuration_entry(entry.term(), config, buffer, offset),
    }
}

pub fn write_application_entry(
    term: u64,
    entry: &ApplicationEntry,
    buffer: &mut [u8],
    offset: usize,
) -> CodecResult<usize> {
    let data_len = u32::try_from(entry.data.len()).map_err(|_| CodecError::FieldTooLong {
        field: "data",
        len: entry.data.len(),
    })?;

    let len = HEADER_LEN + APPLICATION_FIXED_LEN + entry.data.len();
    let mut out = target(buffer, offset, len)?;
    put_header(&mut out, KIND_APPLICATION, term);
    out.put_i64_le(entry.lowest_asqn);
    out.put_i64_le(entry.highest_asqn);
    out.put_u32_le(data_len);
    out.put_slice(&entry.data);

    Ok(len)
}

pub fn write_initial_entry(
    term: u64,
    _entry: &InitialEntry,
    buffer: &mut [u8],
    offset: usize,
) -> CodecResult<usize> {
    let mut out = target(buffer, offset, HEADER_LEN)?;
    put_header(&mut out, KIND_INITIAL, term);

    Ok(HEADER_LEN)
}

pub fn write_configuration_entry(
    term: u64,
    entry: &ConfigurationEntry,
    buffer: &mut [u8],
    offset: usize,
) -> CodecResult<usize> {
    validate_members(&entry.new_members)?;
    validate_members(&entry.old_members)?;

    let len = HEADER_LEN + 8 + members_len(&entry.new_members) + members_len(&entry.old_members);
    let mut out = target(buffer, offset, len)?;
    put_header(&mut out, KIND_CONFIGURATION, term);
    out.put_i64_le(entry.timestamp);
    put_members(&mut out, &entry.new_members);
    put_members(&mut out, &entry.old_members);

    Ok(len)
}

/// Convenience wrapper allocating a buffer of the exact size.
pub fn encode_to_vec(entry: &RaftLogEntry) -> CodecResult<Vec<u8>> {
    let mut buffer = vec![0u8; encoded_len(entry)];
    let written = write_raft_log_entry(entry, &mut buffer, 0)?;
    debug_assert_eq!(written, buffer.len());
    Ok(buffer)
}

/// Decodes a full entry from `buffer`.
///
/// When `buffer` is a shared `Bytes` region, application data is sliced out of it
/// without copying.
pub fn read_raft_log_entry<'a>(buffer: impl Into<ByteView<'a>>) -> CodecResult<RaftLogEntry> {
    let view = buffer.into();
    let total = view.len();
    let mut input = view.as_slice();

    ensure(&input, HEADER_LEN)?;
    let version = input.get_u8();
    if version != ENCODING_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let kind = input.get_u8();
    let term = input.get_u64_le();

    let entry = match kind {
        KIND_APPLICATION => {
            ensure(&input, APPLICATION_FIXED_LEN)?;
            let lowest_asqn = input.get_i64_le();
            let highest_asqn = input.get_i64_le();
            let data_len = input.get_u32_le() as usize;
            ensure(&input, data_len)?;
            let start = total - input.remaining();
            let data = view.slice_bytes(start..start + data_len);
            RaftEntry::Application(ApplicationEntry {
                lowest_asqn,
                highest_asqn,
                data,
            })
        }
        KIND_INITIAL => RaftEntry::Initial(InitialEntry),
        KIND_CONFIGURATION => {
            ensure(&input, 8)?;
            let timestamp = input.get_i64_le();
            let new_members = get_members(&mut input)?;
            let old_members = get_members(&mut input)?;
            RaftEntry::Configuration(ConfigurationEntry {
                timestamp,
                new_members,
                old_members,
            })
        }
        other => return Err(CodecError::UnknownEntryKind(other)),
    };

    Ok(RaftLogEntry::new(term, entry))
}

fn target(
    buffer: &mut [u8],
    offset: usize,
    len: usize,
) -> CodecResult<&mut [u8]> {
    let capacity = buffer.len();
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(&mut buffer[offset..end]),
        _ => Err(CodecError::BufferTooSmall {
            required: len,
            offset,
            capacity,
        }),
    }
}

fn put_header(
    out: &mut &mut [u8],
    kind: u8,
    term: u64,
) {
    out.put_u8(ENCODING_VERSION);
    out.put_u8(kind);
    out.put_u64_le(term);
}

fn validate_members(members: &[RaftMember]) -> CodecResult<()> {
    if u32::try_from(members.len()).is_err() {
        return Err(CodecError::FieldTooLong {
            field: "members",
            len: members.len(),
        });
    }
    for member in members {
        if u16::try_from(member.member_id.len()).is_err() {
            return Err(CodecError::FieldTooLong {
                field: "member_id",
                len: member.member_id.len(),
            });
        }
    }
    Ok(())
}

// Lengths are checked by validate_members before any byte is written.
fn put_members(
    out: &mut &mut [u8],
    members: &[RaftMember],
) {
    out.put_u32_le(members.len() as u32);
    for member in members {
        out.put_u16_le(member.member_id.len() as u16);
        out.put_slice(member.member_id.as_bytes());
        out.put_u8(member.member_type.to_byte());
        out.put_i64_le(member.updated);
    }
}

fn get_members(input: &mut &[u8]) -> CodecResult<Vec<RaftMember>> {
    ensure(input, 4)?;
    let count = input.get_u32_le() as usize;
    // Every member takes at least MEMBER_FIXED_LEN bytes; reject counts the input cannot hold.
    ensure(input, count.saturating_mul(MEMBER_FIXED_LEN))?;

    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        ensure(input, 2)?;
        let id_len = input.get_u16_le() as usize;
        ensure(input, id_len + 1 + 8)?;
        let member_id = std::str::from_utf8(&input[..id_len])
            .map_err(|_| CodecError::InvalidMemberId)?
            .to_owned();
        input.advance(id_len);
        let type_byte = input.get_u8();
        let member_type = MemberType::from_byte(type_byte).ok_or(CodecError::UnknownMemberType(type_byte))?;
        let updated = input.get_i64_le();
        members.push(RaftMember {
            member_id,
            member_type,
            updated,
        });
    }
    Ok(members)
}

#[inline]
fn ensure(
    input: &&[u8],
    required: usize,
) -> CodecResult<()> {
    if input.remaining() < required {
        return Err(CodecError::Truncated {
            required,
            remaining: input.remaining(),
        });
    }
    Ok(())
}
