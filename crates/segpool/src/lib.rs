//! # segpool
//!
//! Region + free-list suballocation over fixed-size memory pools.
//!
//! A pool is one contiguous region carved into variable-sized allocations
//! and returned gaps. Each pool keeps a doubly linked segment list in
//! address order, a size-sorted gap index for victim selection (best fit
//! or first fit), and eager coalescing on free. A registry tracks the open
//! pools behind opaque handles.
//!
//! ## Quick Start
//!
//! ```rust
//! use segpool::prelude::*;
//!
//! fn main() -> PoolResult<()> {
//!     let mut registry = PoolRegistry::new();
//!     registry.init()?;
//!
//!     let pool = registry.open(1024, AllocPolicy::BestFit)?;
//!     let block = registry.allocate(pool, 128)?;
//!     // ... the 128 bytes behind `block` belong to the caller ...
//!     registry.free(pool, block)?;
//!
//!     registry.close(pool)?;
//!     registry.teardown()
//! }
//! ```
//!
//! Pools can also be driven standalone through [`PoolManager`] when no
//! registry lifecycle is wanted.
//!
//! ## Features
//!
//! - `logging` (default): structured tracing of pool lifecycle and growth
//!   events; behavior is identical with the feature off
//!
//! ## Contract
//!
//! The library is single-threaded: callers serialize access to any given
//! pool (every operation takes `&mut`). Returned pointers are raw bytes —
//! there is no bounds-checking, and a pointer stays valid and stable until
//! the matching `free`.

#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(rust_2018_idioms)]
// Raw-pointer region math is the point of the crate; every unsafe block
// carries its SAFETY argument. Overrides the workspace-level warn.
#![allow(unsafe_code)]

pub mod core;
pub mod error;
pub mod pool;
pub mod registry;

// Re-export the working set at the crate root for convenience
pub use crate::core::traits::MemoryUsage;
pub use crate::core::types::AllocPolicy;
pub use crate::error::{PoolError, PoolResult};
pub use crate::pool::{PoolConfig, PoolHeader, PoolManager, PoolSegment};
pub use crate::registry::{PoolId, PoolRegistry};

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::core::traits::MemoryUsage;
    pub use crate::core::types::AllocPolicy;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::pool::{PoolConfig, PoolHeader, PoolManager, PoolSegment};
    pub use crate::registry::{PoolId, PoolRegistry};
}
