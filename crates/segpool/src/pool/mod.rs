//! Pool manager: one fixed-size region tiled by segment nodes
//!
//! A pool keeps three cross-consistent views of the same bytes:
//! - the segment list, tiling the region gap-free in address order,
//! - the gap index, ordering the free segments by `(size, address)`,
//! - the header accounting (`alloc_size`, `num_allocs`, `num_gaps`).
//!
//! # Memory Layout
//! ```text
//! [Alloc 30][Gap 20][Alloc 50]          region bytes
//!     ↑        ↑        ↑
//!   node ←→  node ←→  node              list in address order
//!              ↑
//!          (20, node)                   gap index, size-sorted
//! ```
//!
//! ## Invariants
//!
//! - Segment sizes concatenate to exactly the region size
//! - No two neighboring segments are both gaps (coalescing is eager)
//! - The gap index holds exactly the gap nodes, ascending `(size, mem)`
//! - `alloc_size` + gap bytes = region size
//! - Carved pointers stay valid until freed, across node-storage growth

mod config;
mod gap_index;
mod node_heap;
mod region;

pub use config::PoolConfig;

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::core::traits::MemoryUsage;
use crate::core::types::AllocPolicy;
use crate::error::{PoolError, PoolResult};
use gap_index::GapIndex;
use node_heap::{NodeHeap, NodeIndex};
use region::Region;

/// Read-only snapshot of a pool's user-visible header.
#[derive(Debug, Clone, Copy)]
pub struct PoolHeader {
    /// Base address of the pool region
    pub mem: NonNull<u8>,
    /// Gap selection policy
    pub policy: AllocPolicy,
    /// Fixed region size in bytes
    pub total_size: usize,
    /// Sum of live allocation sizes
    pub alloc_size: usize,
    /// Count of live allocations
    pub num_allocs: usize,
    /// Count of gaps
    pub num_gaps: usize,
}

/// One `(size, allocated)` segment reported by [`PoolManager::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSegment {
    /// Span length in bytes
    pub size: usize,
    /// Live allocation (as opposed to gap)
    pub allocated: bool,
}

/// Suballocator over one contiguous fixed-size memory region.
///
/// Serialization is the caller's problem: every operation takes `&mut
/// self`, and the type is deliberately not `Sync`.
///
/// ```
/// use segpool::{AllocPolicy, PoolManager};
///
/// let mut pool = PoolManager::open(256, AllocPolicy::BestFit)?;
/// let block = pool.allocate(64)?;
/// pool.free(block)?;
/// assert_eq!(pool.num_gaps(), 1);
/// # Ok::<(), segpool::PoolError>(())
/// ```
pub struct PoolManager {
    region: Region,
    nodes: NodeHeap,
    gaps: GapIndex,
    /// Node describing the span at the region base. Never released: merges
    /// always absorb forward, so the lowest-address node survives them.
    head: NodeIndex,
    policy: AllocPolicy,
    config: PoolConfig,
    alloc_size: usize,
    num_allocs: usize,
}

impl PoolManager {
    /// Opens a pool of `size` bytes with the given gap selection policy.
    ///
    /// The fresh pool is a single gap spanning the whole region, described
    /// by one node and one gap-index entry.
    pub fn open(size: usize, policy: AllocPolicy) -> PoolResult<Self> {
        Self::open_with_config(size, policy, PoolConfig::default())
    }

    /// Opens a pool with an explicit [`PoolConfig`].
    pub fn open_with_config(
        size: usize,
        policy: AllocPolicy,
        config: PoolConfig,
    ) -> PoolResult<Self> {
        let region = Region::new(size)?;
        let mut nodes = NodeHeap::new()?;
        let mut gaps = GapIndex::new()?;

        let head = nodes.acquire()?;
        {
            let node = nodes.node_mut(head);
            node.offset = 0;
            node.size = size;
        }
        gaps.add(size, head, &nodes)?;

        #[cfg(feature = "logging")]
        debug!(size, ?policy, "pool opened");

        Ok(Self {
            region,
            nodes,
            gaps,
            head,
            policy,
            config,
            alloc_size: 0,
            num_allocs: 0,
        })
    }

    /// Gap selection policy
    pub fn policy(&self) -> AllocPolicy {
        self.policy
    }

    /// Fixed region size in bytes
    pub fn total_size(&self) -> usize {
        self.region.len()
    }

    /// Sum of live allocation sizes
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }

    /// Count of live allocations
    pub fn num_allocs(&self) -> usize {
        self.num_allocs
    }

    /// Count of gaps
    pub fn num_gaps(&self) -> usize {
        self.gaps.len()
    }

    /// Count of live segment descriptors (allocations plus gaps)
    pub fn used_nodes(&self) -> usize {
        self.nodes.used_nodes()
    }

    /// Base address of the pool region
    pub fn base(&self) -> NonNull<u8> {
        self.region.base()
    }

    /// Checks whether a pointer lies inside this pool's region
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.region.offset_of(ptr).is_some()
    }

    /// Read-only header snapshot; always satisfies the accounting
    /// invariant `alloc_size + gap bytes == total_size`.
    pub fn header(&self) -> PoolHeader {
        PoolHeader {
            mem: self.region.base(),
            policy: self.policy,
            total_size: self.region.len(),
            alloc_size: self.alloc_size,
            num_allocs: self.num_allocs,
            num_gaps: self.gaps.len(),
        }
    }

    /// Carves `size` bytes out of the pool.
    ///
    /// The victim gap is chosen per policy; a strictly larger victim is
    /// split and the remainder survives as a smaller gap right after the
    /// new allocation. Zero-byte requests are normal requests and consume
    /// a node.
    ///
    /// # Errors
    ///
    /// `NoFit` when no gap is large enough, `NoMemory` when the node heap
    /// cannot grow. Nothing is mutated on either failure.
    pub fn allocate(&mut self, size: usize) -> PoolResult<NonNull<u8>> {
        if self.gaps.is_empty() {
            return Err(PoolError::no_fit(size));
        }

        let victim = self
            .select_victim(size)
            .ok_or_else(|| PoolError::no_fit(size))?;

        // Grow the node heap before touching the victim, so a refused
        // resize leaves every invariant intact.
        let remainder = self.nodes.node(victim).size - size;
        if remainder > 0 {
            self.nodes.ensure_capacity()?;
        }

        if self.gaps.remove(victim).is_none() {
            return Err(PoolError::corruption(
                "gap index",
                "victim gap missing from the index",
            ));
        }

        if remainder > 0 {
            let split = self.nodes.acquire()?;
            let split_offset = self.nodes.node(victim).offset + size;
            {
                let node = self.nodes.node_mut(split);
                node.offset = split_offset;
                node.size = remainder;
            }
            self.nodes.splice_after(victim, split);
            self.gaps.add(remainder, split, &self.nodes)?;
        }

        let offset = {
            let node = self.nodes.node_mut(victim);
            node.size = size;
            node.allocated = true;
            node.offset
        };

        self.num_allocs += 1;
        self.alloc_size += size;

        if let Some(pattern) = self.config.alloc_pattern {
            self.region.fill(offset, size, pattern);
        }

        #[cfg(feature = "logging")]
        trace!(size, offset, "allocation carved");

        Ok(self.region.ptr_at(offset))
    }

    /// Returns an allocation to the pool, eagerly coalescing it with
    /// neighboring gaps.
    ///
    /// Both neighbors are merged before the surviving gap is indexed, so
    /// each free costs at most one index insertion.
    ///
    /// # Errors
    ///
    /// `UnknownPointer` when `ptr` does not match a live allocation of
    /// this pool (including a second free of the same pointer).
    pub fn free(&mut self, ptr: NonNull<u8>) -> PoolResult<()> {
        let offset = self
            .region
            .offset_of(ptr)
            .ok_or(PoolError::UnknownPointer)?;

        let target = self
            .nodes
            .iter_from(self.head)
            .find(|(_, node)| node.allocated && node.offset == offset)
            .map(|(index, _)| index)
            .ok_or(PoolError::UnknownPointer)?;

        // The surviving gap needs one index slot; reserve it up front so a
        // refused growth leaves the pool untouched.
        self.gaps.ensure_capacity()?;

        let freed = self.nodes.node(target).size;
        self.nodes.node_mut(target).allocated = false;

        if let Some(pattern) = self.config.dealloc_pattern {
            self.region.fill(offset, freed, pattern);
        }

        // Merge the next neighbor in, then fold into the previous one.
        let mut result = target;
        if let Some(next) = self.nodes.node(result).next {
            if !self.nodes.node(next).allocated {
                if self.gaps.remove(next).is_none() {
                    return Err(PoolError::corruption(
                        "gap index",
                        "next gap neighbor missing from the index",
                    ));
                }
                let absorbed = self.nodes.node(next).size;
                self.nodes.node_mut(result).size += absorbed;
                self.nodes.unlink(next);
                self.nodes.release(next);
            }
        }
        if let Some(prev) = self.nodes.node(result).prev {
            if !self.nodes.node(prev).allocated {
                if self.gaps.remove(prev).is_none() {
                    return Err(PoolError::corruption(
                        "gap index",
                        "previous gap neighbor missing from the index",
                    ));
                }
                let absorbed = self.nodes.node(result).size;
                self.nodes.node_mut(prev).size += absorbed;
                self.nodes.unlink(result);
                self.nodes.release(result);
                result = prev;
            }
        }

        let merged_size = self.nodes.node(result).size;
        self.gaps.add(merged_size, result, &self.nodes)?;

        self.num_allocs -= 1;
        self.alloc_size -= freed;

        #[cfg(feature = "logging")]
        trace!(offset, freed, merged_size, "allocation freed");

        Ok(())
    }

    /// Reports every live segment in address order.
    ///
    /// The returned sequence has exactly [`used_nodes`](Self::used_nodes)
    /// entries and its sizes concatenate to the region size.
    pub fn inspect(&self) -> Vec<PoolSegment> {
        self.nodes
            .iter_from(self.head)
            .map(|(_, node)| PoolSegment {
                size: node.size,
                allocated: node.allocated,
            })
            .collect()
    }

    /// Verifies every structural invariant of the pool.
    ///
    /// # Errors
    ///
    /// `Corruption` naming the first broken structure found. A healthy
    /// pool returns `Ok` after every public call.
    pub fn validate(&self) -> PoolResult<()> {
        let mut cursor = 0usize;
        let mut walked = 0usize;
        let mut allocs = 0usize;
        let mut alloc_bytes = 0usize;
        let mut previous_was_gap = false;
        let mut gap_nodes: Vec<NodeIndex> = Vec::new();

        for (index, node) in self.nodes.iter_from(self.head) {
            if !node.used {
                return Err(PoolError::corruption(
                    "node heap",
                    format!("unused node {index:?} linked into the list"),
                ));
            }
            if node.offset != cursor {
                return Err(PoolError::corruption(
                    "node heap",
                    format!("segment at offset {}, expected {cursor}", node.offset),
                ));
            }
            cursor += node.size;
            walked += 1;

            if node.allocated {
                allocs += 1;
                alloc_bytes += node.size;
                previous_was_gap = false;
            } else {
                if previous_was_gap {
                    return Err(PoolError::corruption(
                        "node heap",
                        format!("adjacent gaps at offset {}", node.offset),
                    ));
                }
                previous_was_gap = true;
                gap_nodes.push(index);
            }
        }

        if cursor != self.region.len() {
            return Err(PoolError::corruption(
                "node heap",
                format!("list tiles {cursor} of {} bytes", self.region.len()),
            ));
        }
        if walked != self.nodes.used_nodes() {
            return Err(PoolError::corruption(
                "node heap",
                format!(
                    "{walked} nodes linked, {} marked used",
                    self.nodes.used_nodes()
                ),
            ));
        }
        if allocs != self.num_allocs || alloc_bytes != self.alloc_size {
            return Err(PoolError::corruption(
                "pool header",
                format!(
                    "accounting says {} allocations / {} bytes, list says {allocs} / {alloc_bytes}",
                    self.num_allocs, self.alloc_size
                ),
            ));
        }

        if self.gaps.len() != gap_nodes.len() {
            return Err(PoolError::corruption(
                "gap index",
                format!(
                    "{} entries for {} gap nodes",
                    self.gaps.len(),
                    gap_nodes.len()
                ),
            ));
        }
        let mut last_key: Option<(usize, usize)> = None;
        for entry in self.gaps.entries() {
            let node = self.nodes.node(entry.node);
            if !node.used || node.allocated {
                return Err(PoolError::corruption(
                    "gap index",
                    "entry references a non-gap node",
                ));
            }
            if node.size != entry.size {
                return Err(PoolError::corruption(
                    "gap index",
                    format!("entry size {} but node size {}", entry.size, node.size),
                ));
            }
            let key = (entry.size, node.offset);
            if last_key.is_some_and(|previous| key < previous) {
                return Err(PoolError::corruption(
                    "gap index",
                    "entries out of (size, mem) order",
                ));
            }
            last_key = Some(key);
        }
        for gap in &gap_nodes {
            let listed = self
                .gaps
                .entries()
                .iter()
                .filter(|entry| entry.node == *gap)
                .count();
            if listed != 1 {
                return Err(PoolError::corruption(
                    "gap index",
                    format!("gap node {gap:?} indexed {listed} times"),
                ));
            }
        }

        Ok(())
    }

    /// Single policy dispatch point: picks the victim gap node for `size`.
    fn select_victim(&self, size: usize) -> Option<NodeIndex> {
        match self.policy {
            AllocPolicy::BestFit => self.gaps.best_fit(size).map(|entry| entry.node),
            AllocPolicy::FirstFit => self
                .nodes
                .iter_from(self.head)
                .find(|(_, node)| !node.allocated && node.size >= size)
                .map(|(index, _)| index),
        }
    }
}

impl MemoryUsage for PoolManager {
    fn used_memory(&self) -> usize {
        self.alloc_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.region.len() - self.alloc_size)
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.region.len())
    }
}
