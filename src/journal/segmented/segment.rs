//! Segment files of the segmented journal.
//!
//! Each segment is a single append-only file named
//! `{name}-{first_index:020}.log`:
//!
//! ```text
//! u32 magic | u64 first_index | frame*
//! frame: u32 data_len | u32 crc32(data) | u64 index | i64 asqn | data
//! ```
//!
//! All integers are little-endian.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use tracing::debug;
use tracing::warn;

use crate::constants::FRAME_HEADER_SIZE;
use crate::constants::SEGMENT_EXTENSION;
use crate::constants::SEGMENT_HEADER_SIZE;
use crate::constants::SEGMENT_MAGIC;
use crate::JournalRecord;
use crate::Result;
use crate::StorageError;

pub(crate) fn segment_filename(
    name: &str,
    first_index: u64,
) -> String {
    format!("{name}-{first_index:020}.{SEGMENT_EXTENSION}")
}

/// Parses the first index out of a segment file name belonging to journal `name`.
pub(crate) fn parse_segment_filename(
    name: &str,
    file_name: &str,
) -> Option<u64> {
    let stripped = file_name.strip_prefix(name)?.strip_prefix('-')?;
    let digits = stripped.strip_suffix(&format!(".{SEGMENT_EXTENSION}"))?;
    if digits.len() != 20 {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Lists `(first_index, path)` of all segments of journal `name`, ascending.
pub(crate) fn list_segments(
    dir: &Path,
    name: &str,
) -> Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        if let Some(first_index) = parse_segment_filename(name, &file_name.to_string_lossy()) {
            segments.push((first_index, dir_entry.path()));
        }
    }
    segments.sort_by_key(|(first_index, _)| *first_index);

    debug!(count = segments.len(), dir = %dir.display(), "Discovered journal segments");
    Ok(segments)
}

/// Position and metadata of a frame found while scanning a segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameInfo {
    pub(crate) index: u64,
    pub(crate) asqn: i64,
    pub(crate) position: u64,
}

#[derive(Debug)]
pub(crate) struct Segment {
    first_index: u64,
    last_index: u64,
    path: PathBuf,
    file: File,
    size: u64,
    dirty: bool,
}

impl Segment {
    pub(crate) fn create(
        dir: &Path,
        name: &str,
        first_index: u64,
    ) -> Result<Self> {
        let path = dir.join(segment_filename(name, first_index));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| StorageError::PathError {
                path: path.clone(),
                source,
            })?;

        let mut header = Vec::with_capacity(SEGMENT_HEADER_SIZE as usize);
        header.put_u32_le(SEGMENT_MAGIC);
        header.put_u64_le(first_index);
        file.write_all(&header)?;
        file.sync_all()?;

        debug!(path = %path.display(), first_index, "Created journal segment");
        Ok(Self {
            first_index,
            last_index: first_index - 1,
            path,
            file,
            size: SEGMENT_HEADER_SIZE,
            dirty: false,
        })
    }

    /// Opens an existing segment and scans its frames. A torn or corrupted tail
    /// is cut off; `on_frame` sees every valid frame in order.
    pub(crate) fn open(
        path: PathBuf,
        max_entry_size: usize,
        mut on_frame: impl FnMut(FrameInfo),
    ) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::PathError {
                path: path.clone(),
                source,
            })?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        if buffer.len() < SEGMENT_HEADER_SIZE as usize {
            return Err(StorageError::DataCorruption {
                location: format!("{}: missing segment header", path.display()),
            }
            .into());
        }

        let mut header = &buffer[..SEGMENT_HEADER_SIZE as usize];
        let magic = header.get_u32_le();
        let first_index = header.get_u64_le();
        if magic != SEGMENT_MAGIC || first_index == 0 {
            return Err(StorageError::DataCorruption {
                location: format!("{}: invalid segment header", path.display()),
            }
            .into());
        }

        let mut position = SEGMENT_HEADER_SIZE as usize;
        let mut expected_index = first_index;
        while position < buffer.len() {
            match parse_frame(&buffer[position..], max_entry_size) {
                Some((index, asqn, frame_len)) if index == expected_index => {
                    on_frame(FrameInfo {
                        index,
                        asqn,
                        position: position as u64,
                    });
                    position += frame_len;
                    expected_index += 1;
                }
                _ => break,
            }
        }

        if position < buffer.len() {
            warn!(
                path = %path.display(),
                valid_bytes = position,
                file_bytes = buffer.len(),
                "Truncating torn tail of journal segment"
            );
            file.set_len(position as u64)?;
            file.sync_all()?;
        }

        Ok(Self {
            first_index,
            last_index: expected_index - 1,
            path,
            file,
            size: position as u64,
            dirty: false,
        })
    }

    #[inline]
    pub(crate) fn first_index(&self) -> u64 {
        self.first_index
    }

    #[inline]
    pub(crate) fn last_index(&self) -> u64 {
        self.last_index
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.last_index < self.first_index
    }

    #[inline]
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub(crate) fn data_start(&self) -> u64 {
        SEGMENT_HEADER_SIZE
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a frame for `index` and returns its position.
    pub(crate) fn append(
        &mut self,
        index: u64,
        asqn: i64,
        checksum: u64,
        data: &[u8],
    ) -> Result<u64> {
        debug_assert_eq!(index, self.last_index + 1);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + data.len());
        frame.put_u32_le(data.len() as u32);
        frame.put_u32_le(checksum as u32);
        frame.put_u64_le(index);
        frame.put_i64_le(asqn);
        frame.put_slice(data);

        let position = self.size;
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(&frame)?;

        self.size += frame.len() as u64;
        self.last_index = index;
        self.dirty = true;
        Ok(position)
    }

    /// Reads the frame at `position`. Returns the record and the position of the next frame.
    pub(crate) fn read_at(
        &mut self,
        position: u64,
        max_entry_size: usize,
    ) -> Result<(JournalRecord, u64)> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(position))?;
        self.file.read_exact(&mut header)?;

        let mut cursor = &header[..];
        let len = cursor.get_u32_le() as usize;
        let crc = cursor.get_u32_le() as u64;
        let index = cursor.get_u64_le();
        let asqn = cursor.get_i64_le();
        if len > max_entry_size {
            return Err(self.corruption(position, "frame length exceeds maximum entry size"));
        }

        let mut data = vec![0u8; len];
        self.file.read_exact(&mut data)?;

        let record = JournalRecord {
            index,
            asqn,
            checksum: crc,
            data: Bytes::from(data),
        };
        if record.verify_checksum().is_err() {
            return Err(self.corruption(position, "checksum mismatch"));
        }

        Ok((record, position + (FRAME_HEADER_SIZE + len) as u64))
    }

    /// Reads only the frame header at `position`: `(index, asqn, next_position)`.
    pub(crate) fn peek_at(
        &mut self,
        position: u64,
    ) -> Result<(u64, i64, u64)> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.file.seek(SeekFrom::Start(position))?;
        self.file.read_exact(&mut header)?;

        let mut cursor = &header[..];
        let len = cursor.get_u32_le() as u64;
        let _crc = cursor.get_u32_le();
        let index = cursor.get_u64_le();
        let asqn = cursor.get_i64_le();
        Ok((index, asqn, position + FRAME_HEADER_SIZE as u64 + len))
    }

    /// Drops every frame from `position` on; the frame at `position` must hold `index`.
    pub(crate) fn truncate(
        &mut self,
        position: u64,
        index: u64,
    ) -> Result<()> {
        self.file.set_len(position)?;
        self.size = position;
        self.last_index = index - 1;
        self.dirty = true;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> Result<()> {
        if self.dirty {
            self.file.sync_data()?;
            self.dirty = false;
        }
        Ok(())
    }

    pub(crate) fn delete(self) -> Result<()> {
        let path = self.path.clone();
        drop(self.file);
        fs::remove_file(&path).map_err(|source| StorageError::PathError { path, source })?;
        Ok(())
    }

    fn corruption(
        &self,
        position: u64,
        reason: &str,
    ) -> crate::Error {
        StorageError::DataCorruption {
            location: format!("{}@{}: {}", self.path.display(), position, reason),
        }
        .into()
    }
}

/// Parses a frame at the start of `buf`. Returns `(index, asqn, frame_len)` when
/// the frame is complete and its checksum matches.
fn parse_frame(
    buf: &[u8],
    max_entry_size: usize,
) -> Option<(u64, i64, usize)> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    let mut cursor = buf;
    let len = cursor.get_u32_le() as usize;
    let crc = cursor.get_u32_le();
    let index = cursor.get_u64_le();
    let asqn = cursor.get_i64_le();
    if len > max_entry_size || cursor.len() < len {
        return None;
    }
    if crc32fast::hash(&cursor[..len]) != crc {
        return None;
    }
    Some((index, asqn, FRAME_HEADER_SIZE + len))
}
