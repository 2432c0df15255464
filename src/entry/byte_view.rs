//! Byte-addressable view used by the entry decoder.
//!
//! Records coming out of a journal are backed by a shared `Bytes` region and
//! can be sliced without copying. Buffers handed in by callers (e.g. a frame
//! received from the network) are only borrowed, so sub-slices that must
//! outlive the view are copied. Both cases go through the same decode routine.

use std::ops::Range;

use bytes::Bytes;

#[derive(Debug, Clone)]
pub enum ByteView<'a> {
    /// Owned contiguous region, sliced zero-copy
    Shared(Bytes),
    /// Bounded read-only window over a caller buffer
    Bounded(&'a [u8]),
}

impl<'a> ByteView<'a> {
    /// View of `len` bytes of `buffer` starting at `offset`, clamped to the buffer end.
    pub fn bounded(
        buffer: &'a [u8],
        offset: usize,
        len: usize,
    ) -> Self {
        let start = offset.min(buffer.len());
        let end = start.saturating_add(len).min(buffer.len());
        ByteView::Bounded(&buffer[start..end])
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            ByteView::Shared(bytes) => bytes.as_ref(),
            ByteView::Bounded(slice) => slice,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when sub-slices share the backing memory.
    pub fn is_zero_copy(&self) -> bool {
        matches!(self, ByteView::Shared(_))
    }

    /// Extracts `range` as an owned `Bytes`. The caller guarantees the range is in bounds.
    pub(crate) fn slice_bytes(
        &self,
        range: Range<usize>,
    ) -> Bytes {
        match self {
            ByteView::Shared(bytes) => bytes.slice(range),
            ByteView::Bounded(slice) => Bytes::copy_from_slice(&slice[range]),
        }
    }

    /// Whole view as `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        self.slice_bytes(0..self.len())
    }
}

impl From<Bytes> for ByteView<'_> {
    fn from(bytes: Bytes) -> Self {
        ByteView::Shared(bytes)
    }
}

impl From<&Bytes> for ByteView<'_> {
    fn from(bytes: &Bytes) -> Self {
        ByteView::Shared(bytes.clone())
    }
}

impl<'a> From<&'a [u8]> for ByteView<'a> {
    fn from(slice: &'a [u8]) -> Self {
        ByteView::Bounded(slice)
    }
}

impl<'a> From<&'a Vec<u8>> for ByteView<'a> {
    fn from(vec: &'a Vec<u8>) -> Self {
        ByteView::Bounded(vec.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_view_slices_without_copy() {
        let bytes = Bytes::from_static(b"raft-log-entry");
        let view = ByteView::from(bytes.clone());
        let sliced = view.slice_bytes(5..8);

        assert!(view.is_zero_copy());
        assert_eq!(&sliced[..], b"log");
        assert_eq!(sliced.as_ptr(), bytes[5..].as_ptr());
    }

    #[test]
    fn test_bounded_view_copies_sub_slice() {
        let buffer = b"..raft-log..".to_vec();
        let view = ByteView::bounded(&buffer, 2, 8);

        assert!(!view.is_zero_copy());
        assert_eq!(view.as_slice(), b"raft-log");
        assert_eq!(&view.slice_bytes(0..4)[..], b"raft");
    }

    #[test]
    fn test_bounded_view_clamps_to_buffer_end() {
        let buffer = [1u8, 2, 3];
        assert_eq!(ByteView::bounded(&buffer, 1, 10).len(), 2);
        assert!(ByteView::bounded(&buffer, 5, 1).is_empty());
    }
}
