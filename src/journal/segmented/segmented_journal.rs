use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::segment::list_segments;
use super::segment::Segment;
use super::sparse_index::SparseIndex;
use crate::constants::DEFAULT_INDEX_DENSITY;
use crate::constants::DEFAULT_MAX_ENTRY_SIZE;
use crate::constants::DEFAULT_MAX_SEGMENT_SIZE;
use crate::constants::DEFAULT_MIN_FREE_DISK_SPACE;
use crate::constants::FRAME_HEADER_SIZE;
use crate::constants::LOCK_FILE_EXTENSION;
use crate::constants::SEGMENT_HEADER_SIZE;
use crate::Error;
use crate::Journal;
use crate::JournalReader;
use crate::JournalRecord;
use crate::Result;
use crate::StorageError;
use crate::ASQN_IGNORE;

/// Parameters of a [`SegmentedJournal`].
#[derive(Debug, Clone)]
pub struct SegmentedJournalOptions {
    /// Prefix of every file the journal owns
    pub name: String,
    pub directory: PathBuf,
    /// Size after which a new segment is started
    pub max_segment_size: u64,
    pub max_entry_size: usize,
    /// Free space required on the volume before a segment is created
    pub min_free_disk_space: u64,
    /// Every n-th record is kept in the sparse index
    pub index_density: u64,
}

impl SegmentedJournalOptions {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            min_free_disk_space: DEFAULT_MIN_FREE_DISK_SPACE,
            index_density: DEFAULT_INDEX_DENSITY,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_config("journal name must not be empty"));
        }
        if self.max_segment_size <= SEGMENT_HEADER_SIZE + FRAME_HEADER_SIZE as u64 {
            return Err(Error::invalid_config(format!(
                "max_segment_size must be greater than {} bytes",
                SEGMENT_HEADER_SIZE + FRAME_HEADER_SIZE as u64
            )));
        }
        if self.max_entry_size == 0 || self.max_entry_size > u32::MAX as usize {
            return Err(Error::invalid_config("max_entry_size must be in 1..=u32::MAX"));
        }
        if self.index_density == 0 {
            return Err(Error::invalid_config("index_density must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct SegmentedState {
    options: SegmentedJournalOptions,
    /// Keyed by first index; never empty while the journal exists
    segments: BTreeMap<u64, Segment>,
    index: SparseIndex,
    /// Bumped whenever records are removed, so readers drop cached positions
    generation: u64,
    open: bool,
    lock_file: Option<File>,
}

impl SegmentedState {
    fn first_index(&self) -> u64 {
        self.segments
            .values()
            .next()
            .map(|segment| segment.first_index())
            .unwrap_or(1)
    }

    fn last_index(&self) -> u64 {
        self.segments
            .values()
            .next_back()
            .map(|segment| segment.last_index())
            .unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(StorageError::JournalClosed.into());
        }
        Ok(())
    }

    fn ensure_free_space(&self) -> Result<()> {
        let directory = &self.options.directory;
        let available = fs2::available_space(directory).map_err(|source| StorageError::PathError {
            path: directory.clone(),
            source,
        })?;
        if available < self.options.min_free_disk_space {
            return Err(StorageError::InsufficientDiskSpace {
                path: directory.clone(),
                available,
                required: self.options.min_free_disk_space,
            }
            .into());
        }
        Ok(())
    }

    fn create_segment(
        &mut self,
        first_index: u64,
    ) -> Result<()> {
        self.ensure_free_space()?;
        let segment = Segment::create(&self.options.directory, &self.options.name, first_index)?;
        self.segments.insert(first_index, segment);
        Ok(())
    }

    fn active_segment(&mut self) -> Result<&mut Segment> {
        self.segments.values_mut().next_back().ok_or_else(|| {
            StorageError::DataCorruption {
                location: "journal has no active segment".to_string(),
            }
            .into()
        })
    }

    fn segment_mut(
        &mut self,
        first_index: u64,
    ) -> Result<&mut Segment> {
        self.segments.get_mut(&first_index).ok_or_else(|| {
            StorageError::DataCorruption {
                location: format!("missing segment starting at {first_index}"),
            }
            .into()
        })
    }

    fn check_entry_size(
        &self,
        size: usize,
    ) -> Result<()> {
        if size > self.options.max_entry_size {
            return Err(StorageError::EntryTooLarge {
                size,
                max_size: self.options.max_entry_size,
            }
            .into());
        }
        Ok(())
    }

    fn write_frame(
        &mut self,
        index: u64,
        asqn: i64,
        checksum: u64,
        data: &[u8],
    ) -> Result<()> {
        let frame_len = (FRAME_HEADER_SIZE + data.len()) as u64;
        let max_segment_size = self.options.max_segment_size;

        let active = self.active_segment()?;
        if !active.is_empty() && active.size() + frame_len > max_segment_size {
            active.sync()?;
            debug!(index, "Rolling over to a new journal segment");
            self.create_segment(index)?;
        }

        let position = self.active_segment()?.append(index, asqn, checksum, data)?;
        self.index.index(index, asqn, position);
        trace!(index, asqn, position, "appended record");
        Ok(())
    }

    /// Returns `(segment_first_index, position)` of the frame holding `index`.
    fn locate(
        &mut self,
        index: u64,
    ) -> Result<Option<(u64, u64)>> {
        if index < self.first_index() || index > self.last_index() {
            return Ok(None);
        }
        let Some(segment_first) = self.segments.range(..=index).next_back().map(|(first, _)| *first) else {
            return Ok(None);
        };

        let (mut current, mut position) = self
            .index
            .lookup_position(segment_first, index)
            .unwrap_or((segment_first, SEGMENT_HEADER_SIZE));

        let segment = self.segment_mut(segment_first)?;
        while current < index {
            let (frame_index, _, next) = segment.peek_at(position)?;
            if frame_index != current {
                return Err(StorageError::DataCorruption {
                    location: format!("{}@{}: expected index {}", segment.path().display(), position, current),
                }
                .into());
            }
            current += 1;
            position = next;
        }
        Ok(Some((segment_first, position)))
    }

    fn find_asqn(
        &mut self,
        asqn: i64,
    ) -> Result<u64> {
        let first = self.first_index();
        let last = self.last_index();
        let start = self
            .index
            .lookup_asqn(asqn)
            .filter(|index| *index >= first)
            .unwrap_or(first);
        let Some((mut segment_first, mut position)) = self.locate(start)? else {
            return Ok(first);
        };

        let mut candidate = None;
        let mut index = start;
        while index <= last {
            let segment = self.segment_mut(segment_first)?;
            if position >= segment.size() {
                segment_first = index;
                position = SEGMENT_HEADER_SIZE;
                continue;
            }
            let (frame_index, frame_asqn, next) = segment.peek_at(position)?;
            if frame_asqn != ASQN_IGNORE {
                if frame_asqn > asqn {
                    break;
                }
                candidate = Some(frame_index);
            }
            index = frame_index + 1;
            position = next;
        }
        Ok(candidate.unwrap_or(first))
    }

    fn delete_after(
        &mut self,
        index: u64,
    ) -> Result<()> {
        if index >= self.last_index() {
            return Ok(());
        }
        if index + 1 < self.first_index() {
            return self.reset(index + 1);
        }

        while self.segments.len() > 1 {
            let Some((&first, _)) = self.segments.last_key_value() else {
                break;
            };
            if first <= index {
                break;
            }
            if let Some(segment) = self.segments.remove(&first) {
                debug!(path = %segment.path().display(), "Deleting truncated segment");
                segment.delete()?;
            }
        }

        if let Some((segment_first, position)) = self.locate(index + 1)? {
            self.segment_mut(segment_first)?.truncate(position, index + 1)?;
        }
        self.index.truncate_after(index);
        self.generation += 1;
        Ok(())
    }

    fn delete_until(
        &mut self,
        index: u64,
    ) -> Result<()> {
        let target = index.min(self.last_index().saturating_add(1));
        loop {
            let mut keys = self.segments.keys();
            let (Some(&head), Some(&next)) = (keys.next(), keys.next()) else {
                break;
            };
            if next > target {
                break;
            }
            if let Some(segment) = self.segments.remove(&head) {
                debug!(path = %segment.path().display(), "Deleting compacted segment");
                segment.delete()?;
            }
        }

        let first = self.first_index();
        self.index.truncate_before(first);
        self.generation += 1;
        Ok(())
    }

    fn reset(
        &mut self,
        next_index: u64,
    ) -> Result<()> {
        // a failed reset keeps the current segments
        self.ensure_free_space()?;
        for (_, segment) in std::mem::take(&mut self.segments) {
            segment.delete()?;
        }
        self.index.clear();
        self.generation += 1;
        self.create_segment(next_index.max(1))
    }

    fn flush(&mut self) -> Result<()> {
        for segment in self.segments.values_mut() {
            segment.sync()?;
        }
        Ok(())
    }
}

/// Journal persisting records into size-bounded segment files.
///
/// Layout of the journal directory for name `raft-partition`:
///
/// ```text
/// raft-partition.lock
/// raft-partition-00000000000000000001.log
/// raft-partition-00000000000000052013.log
/// ```
///
/// The directory is locked exclusively while the journal is open.
#[derive(Debug)]
pub struct SegmentedJournal {
    state: Arc<Mutex<SegmentedState>>,
}

impl SegmentedJournal {
    /// Opens the journal in `options.directory`, creating it when missing.
    ///
    /// Recovery scans every segment: a torn or corrupted tail is cut off, and
    /// segments that no longer continue the log are removed.
    pub fn open(options: SegmentedJournalOptions) -> Result<Self> {
        options.validate()?;
        let directory = options.directory.clone();
        fs::create_dir_all(&directory).map_err(|source| StorageError::PathError {
            path: directory.clone(),
            source,
        })?;

        let lock_file = Self::lock_directory(&directory, &options.name)?;

        let mut index = SparseIndex::new(options.index_density);
        let mut segments = BTreeMap::new();
        let mut expected_first: Option<u64> = None;
        for (first_index, path) in list_segments(&directory, &options.name)? {
            if expected_first.is_some_and(|expected| expected != first_index) {
                warn!(path = %path.display(), ?expected_first, "Removing segment that does not continue the journal");
                fs::remove_file(&path).map_err(|source| StorageError::PathError { path, source })?;
                continue;
            }

            let segment = Segment::open(path, options.max_entry_size, |frame| {
                index.index(frame.index, frame.asqn, frame.position)
            })?;
            if segment.first_index() != first_index {
                return Err(StorageError::DataCorruption {
                    location: format!(
                        "{}: header starts at {}, file name at {}",
                        segment.path().display(),
                        segment.first_index(),
                        first_index
                    ),
                }
                .into());
            }
            expected_first = Some(segment.last_index() + 1);
            segments.insert(first_index, segment);
        }

        let mut state = SegmentedState {
            options,
            segments,
            index,
            generation: 0,
            open: true,
            lock_file: Some(lock_file),
        };
        if state.segments.is_empty() {
            state.create_segment(1)?;
        }

        info!(
            dir = %directory.display(),
            segments = state.segments.len(),
            first_index = state.first_index(),
            last_index = state.last_index(),
            "Opened segmented journal"
        );
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    fn lock_directory(
        directory: &Path,
        name: &str,
    ) -> Result<File> {
        let lock_path = directory.join(format!("{name}.{LOCK_FILE_EXTENSION}"));
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| StorageError::PathError {
                path: lock_path.clone(),
                source,
            })?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StorageError::StorageLocked(lock_path))?;
        Ok(lock_file)
    }

    pub fn directory(&self) -> PathBuf {
        self.state.lock().options.directory.clone()
    }

    pub fn segment_count(&self) -> usize {
        self.state.lock().segments.len()
    }
}

impl Journal for SegmentedJournal {
    fn append(
        &self,
        asqn: i64,
        data: &[u8],
    ) -> Result<JournalRecord> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.check_entry_size(data.len())?;

        let record = JournalRecord::new(state.last_index() + 1, asqn, data.to_vec());
        state.write_frame(record.index, record.asqn, record.checksum, &record.data)?;
        Ok(record)
    }

    fn append_record(
        &self,
        record: &JournalRecord,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.check_entry_size(record.data.len())?;
        record.verify_checksum()?;

        let expected = state.last_index() + 1;
        if record.index != expected {
            return Err(StorageError::InvalidIndex {
                expected,
                actual: record.index,
            }
            .into());
        }
        state.write_frame(record.index, record.asqn, record.checksum, &record.data)
    }

    fn open_reader(&self) -> Box<dyn JournalReader> {
        let next_index = self.state.lock().first_index();
        Box::new(SegmentedJournalReader {
            state: self.state.clone(),
            next_index,
            cursor: None,
        })
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.last_index() < state.first_index()
    }

    fn first_index(&self) -> u64 {
        self.state.lock().first_index()
    }

    fn last_index(&self) -> u64 {
        self.state.lock().last_index()
    }

    #[instrument(skip(self))]
    fn delete_after(
        &self,
        index: u64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.delete_after(index)
    }

    #[instrument(skip(self))]
    fn delete_until(
        &self,
        index: u64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.delete_until(index)
    }

    #[instrument(skip(self))]
    fn reset(
        &self,
        next_index: u64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.reset(next_index)
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_open()?;
        state.flush()
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        state.flush()?;
        state.open = false;
        if let Some(lock_file) = state.lock_file.take() {
            if let Err(e) = FileExt::unlock(&lock_file) {
                warn!(error = %e, "Failed to release journal directory lock");
            }
        }
        info!(dir = %state.options.directory.display(), "Closed segmented journal");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    generation: u64,
    segment_first: u64,
    position: u64,
    index: u64,
}

/// Reader over a [`SegmentedJournal`]. Keeps the file position of the next
/// frame while no records are removed underneath it.
pub struct SegmentedJournalReader {
    state: Arc<Mutex<SegmentedState>>,
    next_index: u64,
    cursor: Option<Cursor>,
}

impl SegmentedJournalReader {
    fn reposition(
        &mut self,
        index: u64,
    ) -> u64 {
        self.next_index = index;
        self.cursor = None;
        index
    }
}

impl JournalReader for SegmentedJournalReader {
    fn has_next(&mut self) -> bool {
        let state = self.state.lock();
        state.open && self.next_index.max(state.first_index()) <= state.last_index()
    }

    fn next_record(&mut self) -> Result<Option<JournalRecord>> {
        let mut state = self.state.lock();
        state.ensure_open()?;

        let first = state.first_index();
        if self.next_index < first {
            self.next_index = first;
            self.cursor = None;
        }
        if self.next_index > state.last_index() {
            return Ok(None);
        }

        let cached = self
            .cursor
            .filter(|c| c.generation == state.generation && c.index == self.next_index)
            .map(|c| (c.segment_first, c.position));
        let (segment_first, position) = match cached {
            Some(location) => location,
            None => match state.locate(self.next_index)? {
                Some(location) => location,
                None => return Ok(None),
            },
        };

        let generation = state.generation;
        let max_entry_size = state.options.max_entry_size;
        let segment = state.segment_mut(segment_first)?;
        let (record, next_position) = segment.read_at(position, max_entry_size)?;
        if record.index != self.next_index {
            return Err(StorageError::DataCorruption {
                location: format!(
                    "{}@{}: expected index {}, found {}",
                    segment.path().display(),
                    position,
                    self.next_index,
                    record.index
                ),
            }
            .into());
        }

        self.next_index += 1;
        self.cursor = (next_position < segment.size()).then_some(Cursor {
            generation,
            segment_first,
            position: next_position,
            index: self.next_index,
        });
        Ok(Some(record))
    }

    fn seek(
        &mut self,
        index: u64,
    ) -> Result<u64> {
        let target = {
            let state = self.state.lock();
            index.clamp(state.first_index(), state.last_index().saturating_add(1))
        };
        Ok(self.reposition(target))
    }

    fn seek_to_first(&mut self) -> Result<u64> {
        let first = self.state.lock().first_index();
        Ok(self.reposition(first))
    }

    fn seek_to_last(&mut self) -> Result<u64> {
        let target = {
            let state = self.state.lock();
            state.last_index().max(state.first_index())
        };
        Ok(self.reposition(target))
    }

    fn seek_to_asqn(
        &mut self,
        asqn: i64,
    ) -> Result<u64> {
        let target = {
            let mut state = self.state.lock();
            state.ensure_open()?;
            state.find_asqn(asqn)?
        };
        Ok(self.reposition(target))
    }
}
