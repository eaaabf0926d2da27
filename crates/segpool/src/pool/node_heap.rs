//! Growable backing store for segment descriptors
//!
//! Nodes are addressed by index, never by pointer, so growth is a plain
//! array resize: nothing held by the gap index or the linked list needs
//! rebinding when the storage relocates.

use crate::core::types::capacity::{EXPAND_FACTOR, FILL_FACTOR, NODE_HEAP_INIT};
use crate::error::{PoolError, PoolResult};

#[cfg(feature = "logging")]
use tracing::trace;

/// Index of a node inside one pool's node heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeIndex(usize);

/// Descriptor of one contiguous span of the pool region.
///
/// A node is in exactly one of three states:
/// - free (`!used`): available for reuse as a descriptor
/// - gap (`used && !allocated`): live span, listed in the gap index
/// - allocated (`used && allocated`): live span handed out to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SegmentNode {
    /// Span start, as an offset into the pool region
    pub(crate) offset: usize,
    /// Span length in bytes
    pub(crate) size: usize,
    /// In use as a descriptor
    pub(crate) used: bool,
    /// Live allocation (as opposed to gap)
    pub(crate) allocated: bool,
    /// Address-order list links
    pub(crate) prev: Option<NodeIndex>,
    pub(crate) next: Option<NodeIndex>,
}

/// Backing store for the segment list of one pool.
pub(crate) struct NodeHeap {
    /// All slots are materialized; `used` distinguishes live descriptors.
    nodes: Vec<SegmentNode>,
    used_nodes: usize,
}

impl NodeHeap {
    pub(crate) fn new() -> PoolResult<Self> {
        Self::with_capacity(NODE_HEAP_INIT)
    }

    pub(crate) fn with_capacity(cap: usize) -> PoolResult<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(cap)
            .map_err(|_| PoolError::no_memory(cap * core::mem::size_of::<SegmentNode>()))?;
        nodes.resize_with(cap, SegmentNode::default);
        Ok(Self {
            nodes,
            used_nodes: 0,
        })
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &SegmentNode {
        &self.nodes[index.0]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut SegmentNode {
        &mut self.nodes[index.0]
    }

    pub(crate) fn used_nodes(&self) -> usize {
        self.used_nodes
    }

    pub(crate) fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Grows the store once the fill factor is exceeded.
    ///
    /// Callers run this before mutating any pool state, so a refused
    /// system allocation surfaces as `NoMemory` with every invariant
    /// intact.
    pub(crate) fn ensure_capacity(&mut self) -> PoolResult<()> {
        if (self.used_nodes as f64) / (self.total_nodes() as f64) > FILL_FACTOR {
            let target = self.total_nodes() * EXPAND_FACTOR;
            let additional = target - self.nodes.len();
            self.nodes
                .try_reserve_exact(additional)
                .map_err(|_| {
                    PoolError::no_memory(additional * core::mem::size_of::<SegmentNode>())
                })?;
            self.nodes.resize_with(target, SegmentNode::default);

            #[cfg(feature = "logging")]
            trace!(capacity = target, "node heap grown");
        }
        Ok(())
    }

    /// Hands out the first unused node, growing the store if needed.
    pub(crate) fn acquire(&mut self) -> PoolResult<NodeIndex> {
        self.ensure_capacity()?;
        let position = self
            .nodes
            .iter()
            .position(|node| !node.used)
            .ok_or_else(|| PoolError::corruption("node heap", "no unused node after growth"))?;
        self.nodes[position].used = true;
        self.used_nodes += 1;
        Ok(NodeIndex(position))
    }

    /// Returns a node to the unused state. The node must already be
    /// detached from the list.
    pub(crate) fn release(&mut self, index: NodeIndex) {
        debug_assert!(self.nodes[index.0].used);
        debug_assert!(self.nodes[index.0].prev.is_none() && self.nodes[index.0].next.is_none());
        self.nodes[index.0] = SegmentNode::default();
        self.used_nodes -= 1;
    }

    /// Splices `new` into the list immediately after `after`.
    pub(crate) fn splice_after(&mut self, after: NodeIndex, new: NodeIndex) {
        let next = self.node(after).next;
        {
            let node = self.node_mut(new);
            node.prev = Some(after);
            node.next = next;
        }
        self.node_mut(after).next = Some(new);
        if let Some(follower) = next {
            self.node_mut(follower).prev = Some(new);
        }
    }

    /// Detaches a node from the list, reconnecting its neighbors.
    pub(crate) fn unlink(&mut self, index: NodeIndex) {
        let (prev, next) = {
            let node = self.node(index);
            (node.prev, node.next)
        };
        if let Some(p) = prev {
            self.node_mut(p).next = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev = prev;
        }
        let node = self.node_mut(index);
        node.prev = None;
        node.next = None;
    }

    /// Walks the list in address order starting from `head`.
    pub(crate) fn iter_from(&self, head: NodeIndex) -> ListIter<'_> {
        ListIter {
            heap: self,
            cursor: Some(head),
        }
    }
}

/// Address-order iterator over the segment list.
pub(crate) struct ListIter<'a> {
    heap: &'a NodeHeap,
    cursor: Option<NodeIndex>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = (NodeIndex, &'a SegmentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.heap.node(index);
        self.cursor = node.next;
        Some((index, node))
    }
}
