//! Registry of open pools
//!
//! A typed value with an explicit init/teardown lifecycle rather than
//! hidden process globals: create one, `init` it, drive pools through it
//! by handle, `teardown` once every pool is closed.

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::debug;

use crate::core::types::{AllocPolicy, capacity};
use crate::error::{PoolError, PoolResult};
use crate::pool::{PoolConfig, PoolHeader, PoolManager, PoolSegment};

/// Opaque handle to a pool owned by a [`PoolRegistry`].
///
/// Handles index registry slots. Slots are never reused after `close`, so
/// a stale handle resolves to a vacant slot instead of aliasing a newer
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(usize);

impl PoolId {
    /// Slot position inside the registry (diagnostic only)
    #[must_use]
    pub fn slot(self) -> usize {
        self.0
    }
}

/// Registry of open pools with an explicit lifecycle.
pub struct PoolRegistry {
    /// `None` until `init`; the slot table only ever grows.
    slots: Option<Vec<Option<PoolManager>>>,
}

impl PoolRegistry {
    /// Creates an uninitialized registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: None }
    }

    /// Allocates the slot table.
    ///
    /// # Errors
    ///
    /// `CalledAgain` if the registry is already initialized; `NoMemory` if
    /// the table cannot be acquired.
    pub fn init(&mut self) -> PoolResult<()> {
        if self.slots.is_some() {
            return Err(PoolError::called_again("init"));
        }
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity::REGISTRY_INIT).map_err(|_| {
            PoolError::no_memory(
                capacity::REGISTRY_INIT * core::mem::size_of::<Option<PoolManager>>(),
            )
        })?;
        self.slots = Some(slots);

        #[cfg(feature = "logging")]
        debug!("pool registry initialized");

        Ok(())
    }

    /// Releases the slot table.
    ///
    /// Nothing is force-closed: open pools make teardown refuse, and the
    /// registry stays initialized.
    ///
    /// # Errors
    ///
    /// `CalledAgain` if the registry was never initialized (or already
    /// torn down); `NotFreed` while any pool is still open.
    pub fn teardown(&mut self) -> PoolResult<()> {
        let Some(slots) = self.slots.as_ref() else {
            return Err(PoolError::called_again("teardown"));
        };
        let open = slots.iter().filter(|slot| slot.is_some()).count();
        if open > 0 {
            return Err(PoolError::not_freed(open));
        }
        self.slots = None;

        #[cfg(feature = "logging")]
        debug!("pool registry torn down");

        Ok(())
    }

    /// True between `init` and `teardown`
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slots.is_some()
    }

    /// Count of currently open pools
    #[must_use]
    pub fn open_pools(&self) -> usize {
        self.slots
            .as_ref()
            .map_or(0, |slots| slots.iter().filter(|slot| slot.is_some()).count())
    }

    /// Opens a pool of `size` bytes and registers it.
    ///
    /// # Errors
    ///
    /// `Uninitialized` before `init`; `NoMemory` if any backing storage is
    /// refused.
    pub fn open(&mut self, size: usize, policy: AllocPolicy) -> PoolResult<PoolId> {
        self.open_with_config(size, policy, PoolConfig::default())
    }

    /// Opens a pool with an explicit [`PoolConfig`] and registers it.
    pub fn open_with_config(
        &mut self,
        size: usize,
        policy: AllocPolicy,
        config: PoolConfig,
    ) -> PoolResult<PoolId> {
        let slots = self.slots.as_mut().ok_or(PoolError::Uninitialized)?;

        // Grow the slot table before constructing the pool so a refused
        // resize costs nothing.
        if (slots.len() as f64) / (slots.capacity() as f64) > capacity::FILL_FACTOR {
            let target = slots.capacity() * capacity::EXPAND_FACTOR;
            // try_reserve_exact counts from len(), not capacity().
            let additional = target - slots.len();
            slots.try_reserve_exact(additional).map_err(|_| {
                PoolError::no_memory(additional * core::mem::size_of::<Option<PoolManager>>())
            })?;
        }

        let pool = PoolManager::open_with_config(size, policy, config)?;
        slots.push(Some(pool));
        Ok(PoolId(slots.len() - 1))
    }

    /// Closes a pool, releasing its region, node heap and gap index.
    ///
    /// # Errors
    ///
    /// `UnknownPool` for a vacant or out-of-range slot; `NotFreed` while
    /// allocations are live; `Fragmented` until the pool has coalesced
    /// back to a single gap.
    pub fn close(&mut self, id: PoolId) -> PoolResult<()> {
        let slots = self.slots.as_mut().ok_or(PoolError::Uninitialized)?;
        let slot = slots
            .get_mut(id.0)
            .ok_or(PoolError::unknown_pool(id.0))?;
        let pool = slot.as_ref().ok_or(PoolError::unknown_pool(id.0))?;

        // Gap count is checked first: zero live allocations already imply
        // a single coalesced gap, so the order decides which error a pool
        // with live allocations reports.
        if pool.num_gaps() != 1 {
            return Err(PoolError::fragmented(pool.num_gaps()));
        }
        if pool.num_allocs() > 0 {
            return Err(PoolError::not_freed(pool.num_allocs()));
        }

        // Dropping the manager releases all three backing allocations.
        // The slot stays vacant: ids are never reused.
        *slot = None;

        #[cfg(feature = "logging")]
        debug!(slot = id.0, "pool closed");

        Ok(())
    }

    /// Shared access to an open pool
    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&PoolManager> {
        self.slots.as_ref()?.get(id.0)?.as_ref()
    }

    /// Exclusive access to an open pool
    #[must_use]
    pub fn pool_mut(&mut self, id: PoolId) -> Option<&mut PoolManager> {
        self.slots.as_mut()?.get_mut(id.0)?.as_mut()
    }

    // --- Convenience pass-throughs to the owned pools ---

    /// Carves `size` bytes out of the identified pool.
    pub fn allocate(&mut self, id: PoolId, size: usize) -> PoolResult<NonNull<u8>> {
        self.pool_mut(id)
            .ok_or(PoolError::unknown_pool(id.0))?
            .allocate(size)
    }

    /// Returns an allocation to the identified pool.
    pub fn free(&mut self, id: PoolId, ptr: NonNull<u8>) -> PoolResult<()> {
        self.pool_mut(id)
            .ok_or(PoolError::unknown_pool(id.0))?
            .free(ptr)
    }

    /// Address-order segment report for the identified pool.
    pub fn inspect(&self, id: PoolId) -> PoolResult<Vec<PoolSegment>> {
        Ok(self.pool(id).ok_or(PoolError::unknown_pool(id.0))?.inspect())
    }

    /// Header snapshot for the identified pool.
    pub fn header(&self, id: PoolId) -> PoolResult<PoolHeader> {
        Ok(self.pool(id).ok_or(PoolError::unknown_pool(id.0))?.header())
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_enforced() {
        let mut registry = PoolRegistry::new();
        assert!(!registry.is_initialized());
        assert_eq!(
            registry.teardown().unwrap_err(),
            PoolError::called_again("teardown")
        );
        assert_eq!(
            registry.open(64, AllocPolicy::BestFit).unwrap_err(),
            PoolError::Uninitialized
        );

        registry.init().unwrap();
        assert_eq!(registry.init().unwrap_err(), PoolError::called_again("init"));

        registry.teardown().unwrap();
        assert!(!registry.is_initialized());
        registry.init().unwrap();
    }

    #[test]
    fn open_close_round_trip() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();

        let id = registry.open(128, AllocPolicy::FirstFit).unwrap();
        assert_eq!(registry.open_pools(), 1);
        let header = registry.header(id).unwrap();
        assert_eq!(header.total_size, 128);
        assert_eq!(header.policy, AllocPolicy::FirstFit);

        registry.close(id).unwrap();
        assert_eq!(registry.open_pools(), 0);
        assert_eq!(
            registry.close(id).unwrap_err(),
            PoolError::unknown_pool(id.slot())
        );
        registry.teardown().unwrap();
    }

    #[test]
    fn close_refuses_live_allocations_and_fragmentation() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();
        let id = registry.open(100, AllocPolicy::BestFit).unwrap();

        // Full pool: no gap at all.
        let p1 = registry.allocate(id, 30).unwrap();
        let p2 = registry.allocate(id, 30).unwrap();
        let p3 = registry.allocate(id, 40).unwrap();
        assert_eq!(registry.close(id).unwrap_err(), PoolError::fragmented(0));

        // One gap, two live allocations.
        registry.free(id, p1).unwrap();
        assert_eq!(registry.close(id).unwrap_err(), PoolError::not_freed(2));

        // Two gaps around the middle allocation.
        registry.free(id, p3).unwrap();
        assert_eq!(registry.close(id).unwrap_err(), PoolError::fragmented(2));

        registry.free(id, p2).unwrap();
        registry.close(id).unwrap();
        registry.teardown().unwrap();
    }

    #[test]
    fn teardown_refuses_open_pools() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();
        let id = registry.open(64, AllocPolicy::BestFit).unwrap();

        assert_eq!(registry.teardown().unwrap_err(), PoolError::not_freed(1));
        assert!(registry.is_initialized());

        registry.close(id).unwrap();
        registry.teardown().unwrap();
    }

    #[test]
    fn slots_are_never_reused() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();

        let first = registry.open(32, AllocPolicy::BestFit).unwrap();
        registry.close(first).unwrap();

        let second = registry.open(32, AllocPolicy::BestFit).unwrap();
        assert_ne!(first, second);
        assert!(registry.pool(first).is_none());
        assert!(registry.pool(second).is_some());
    }

    #[test]
    fn slot_table_grows_past_fill_factor() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();

        let ids: Vec<PoolId> = (0..capacity::REGISTRY_INIT + 5)
            .map(|_| registry.open(16, AllocPolicy::BestFit).unwrap())
            .collect();
        assert_eq!(registry.open_pools(), capacity::REGISTRY_INIT + 5);
        assert!(
            registry.slots.as_ref().unwrap().capacity()
                >= capacity::REGISTRY_INIT * capacity::EXPAND_FACTOR
        );

        for id in ids {
            registry.close(id).unwrap();
        }
        registry.teardown().unwrap();
    }

    #[test]
    fn allocate_through_a_stale_handle_fails() {
        let mut registry = PoolRegistry::new();
        registry.init().unwrap();
        let id = registry.open(64, AllocPolicy::BestFit).unwrap();
        registry.close(id).unwrap();

        assert_eq!(
            registry.allocate(id, 8).unwrap_err(),
            PoolError::unknown_pool(id.slot())
        );
        assert_eq!(
            registry.inspect(id).unwrap_err(),
            PoolError::unknown_pool(id.slot())
        );
    }
}
