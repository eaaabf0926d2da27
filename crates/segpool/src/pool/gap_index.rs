//! Size-sorted directory of the gaps in one pool
//!
//! Entries are kept ascending by `(size, offset)` so the best-fit scan
//! stops at the smallest sufficient gap and ties resolve to the lowest
//! address.

use super::node_heap::{NodeHeap, NodeIndex};
use crate::core::types::capacity::{EXPAND_FACTOR, FILL_FACTOR, GAP_INDEX_INIT};
use crate::error::{PoolError, PoolResult};

#[cfg(feature = "logging")]
use tracing::trace;

/// One gap record: the gap's size and the node describing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GapEntry {
    pub(crate) size: usize,
    pub(crate) node: NodeIndex,
}

pub(crate) struct GapIndex {
    entries: Vec<GapEntry>,
}

impl GapIndex {
    pub(crate) fn new() -> PoolResult<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(GAP_INDEX_INIT)
            .map_err(|_| PoolError::no_memory(GAP_INDEX_INIT * core::mem::size_of::<GapEntry>()))?;
        Ok(Self { entries })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[GapEntry] {
        &self.entries
    }

    /// Grows the directory once the fill factor is exceeded.
    ///
    /// `free` runs this before demoting a node so a refused growth leaves
    /// the pool untouched; afterwards one insertion is guaranteed to fit.
    pub(crate) fn ensure_capacity(&mut self) -> PoolResult<()> {
        if (self.entries.len() as f64) / (self.entries.capacity() as f64) > FILL_FACTOR {
            let target = self.entries.capacity() * EXPAND_FACTOR;
            // try_reserve_exact counts from len(), not capacity().
            let additional = target - self.entries.len();
            self.entries
                .try_reserve_exact(additional)
                .map_err(|_| PoolError::no_memory(additional * core::mem::size_of::<GapEntry>()))?;

            #[cfg(feature = "logging")]
            trace!(capacity = self.entries.capacity(), "gap index grown");
        }
        Ok(())
    }

    /// Appends an entry and bubbles it left into `(size, offset)` position.
    pub(crate) fn add(&mut self, size: usize, node: NodeIndex, heap: &NodeHeap) -> PoolResult<()> {
        self.ensure_capacity()?;
        self.entries.push(GapEntry { size, node });
        self.sort_tail(heap);
        Ok(())
    }

    /// Removes the entry for `node`, shifting later entries down by one.
    ///
    /// Lookup is by node identity, not by size: duplicate sizes are
    /// routine.
    pub(crate) fn remove(&mut self, node: NodeIndex) -> Option<GapEntry> {
        let position = self.entries.iter().position(|entry| entry.node == node)?;
        Some(self.entries.remove(position))
    }

    /// Smallest gap that can hold `size`; among equals, the lowest address.
    pub(crate) fn best_fit(&self, size: usize) -> Option<GapEntry> {
        self.entries.iter().copied().find(|entry| entry.size >= size)
    }

    /// Left-only insertion-sort pass on the last entry.
    fn sort_tail(&mut self, heap: &NodeHeap) {
        let mut i = match self.entries.len() {
            0 => return,
            n => n - 1,
        };
        while i > 0 && self.key(i, heap) < self.key(i - 1, heap) {
            self.entries.swap(i, i - 1);
            i -= 1;
        }
    }

    fn key(&self, position: usize, heap: &NodeHeap) -> (usize, usize) {
        let entry = self.entries[position];
        (entry.size, heap.node(entry.node).offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap_node(heap: &mut NodeHeap, offset: usize, size: usize) -> NodeIndex {
        let index = heap.acquire().unwrap();
        let node = heap.node_mut(index);
        node.offset = offset;
        node.size = size;
        index
    }

    #[test]
    fn keeps_size_order() {
        let mut heap = NodeHeap::new().unwrap();
        let mut index = GapIndex::new().unwrap();

        let big = gap_node(&mut heap, 0, 90);
        let small = gap_node(&mut heap, 90, 10);
        let mid = gap_node(&mut heap, 100, 40);

        index.add(90, big, &heap).unwrap();
        index.add(10, small, &heap).unwrap();
        index.add(40, mid, &heap).unwrap();

        let sizes: Vec<usize> = index.entries().iter().map(|e| e.size).collect();
        assert_eq!(sizes, vec![10, 40, 90]);
    }

    #[test]
    fn equal_sizes_tie_break_by_offset() {
        let mut heap = NodeHeap::new().unwrap();
        let mut index = GapIndex::new().unwrap();

        let high = gap_node(&mut heap, 60, 20);
        let low = gap_node(&mut heap, 0, 20);

        index.add(20, high, &heap).unwrap();
        index.add(20, low, &heap).unwrap();

        assert_eq!(index.entries()[0].node, low);
        assert_eq!(index.entries()[1].node, high);
        assert_eq!(index.best_fit(15).unwrap().node, low);
    }

    #[test]
    fn remove_is_by_identity_and_shifts() {
        let mut heap = NodeHeap::new().unwrap();
        let mut index = GapIndex::new().unwrap();

        let a = gap_node(&mut heap, 0, 20);
        let b = gap_node(&mut heap, 20, 20);
        index.add(20, a, &heap).unwrap();
        index.add(20, b, &heap).unwrap();

        let removed = index.remove(b).unwrap();
        assert_eq!(removed.node, b);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].node, a);
        assert!(index.remove(b).is_none());
    }

    #[test]
    fn grows_to_double_capacity_past_fill_factor() {
        let mut heap = NodeHeap::new().unwrap();
        let mut index = GapIndex::new().unwrap();

        for i in 0..GAP_INDEX_INIT {
            let node = gap_node(&mut heap, i * 2, 1);
            index.add(1, node, &heap).unwrap();
        }

        assert_eq!(index.len(), GAP_INDEX_INIT);
        assert!(index.entries.capacity() >= GAP_INDEX_INIT * EXPAND_FACTOR);
    }

    #[test]
    fn best_fit_none_when_everything_too_small() {
        let mut heap = NodeHeap::new().unwrap();
        let mut index = GapIndex::new().unwrap();
        let a = gap_node(&mut heap, 0, 8);
        index.add(8, a, &heap).unwrap();
        assert!(index.best_fit(9).is_none());
        assert_eq!(index.best_fit(8).unwrap().node, a);
    }
}
