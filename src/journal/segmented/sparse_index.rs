use std::collections::BTreeMap;

use crate::ASQN_IGNORE;

/// In-memory sparse index over a segmented journal.
///
/// Every `density`-th record is indexed by its file position and, when it
/// carries one, by its ASQN. Lookups land on the closest indexed record and
/// scan forward from there.
#[derive(Debug)]
pub(crate) struct SparseIndex {
    density: u64,
    /// record index -> frame position inside its segment
    positions: BTreeMap<u64, u64>,
    /// asqn -> record index
    asqns: BTreeMap<i64, u64>,
}

impl SparseIndex {
    pub(crate) fn new(density: u64) -> Self {
        Self {
            density: density.max(1),
            positions: BTreeMap::new(),
            asqns: BTreeMap::new(),
        }
    }

    pub(crate) fn index(
        &mut self,
        index: u64,
        asqn: i64,
        position: u64,
    ) {
        if index % self.density != 0 {
            return;
        }
        self.positions.insert(index, position);
        if asqn != ASQN_IGNORE {
            self.asqns.insert(asqn, index);
        }
    }

    /// Closest indexed `(index, position)` at or below `index` that lies in a
    /// segment starting at `segment_first`.
    pub(crate) fn lookup_position(
        &self,
        segment_first: u64,
        index: u64,
    ) -> Option<(u64, u64)> {
        if index < segment_first {
            return None;
        }
        self.positions
            .range(segment_first..=index)
            .next_back()
            .map(|(index, position)| (*index, *position))
    }

    /// Index of the closest indexed record whose ASQN is `<= asqn`.
    pub(crate) fn lookup_asqn(
        &self,
        asqn: i64,
    ) -> Option<u64> {
        self.asqns.range(..=asqn).next_back().map(|(_, index)| *index)
    }

    /// Forgets every record above `index`.
    pub(crate) fn truncate_after(
        &mut self,
        index: u64,
    ) {
        self.positions.split_off(&(index + 1));
        self.asqns.retain(|_, indexed| *indexed <= index);
    }

    /// Forgets every record below `index`.
    pub(crate) fn truncate_before(
        &mut self,
        index: u64,
    ) {
        self.positions = self.positions.split_off(&index);
        self.asqns.retain(|_, indexed| *indexed >= index);
    }

    pub(crate) fn clear(&mut self) {
        self.positions.clear();
        self.asqns.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }
}
