//! Standalone error types for segpool
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Errors are
//! returned, never thrown: a failing operation leaves the pool exactly as
//! it found it.

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

/// Pool management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Backing storage ---
    #[error("system allocation of {requested} bytes refused")]
    NoMemory { requested: usize },

    // --- Allocation ---
    #[error("no gap large enough for {requested} bytes")]
    NoFit { requested: usize },

    // --- Registry lifecycle ---
    #[error("registry `{operation}` called again")]
    CalledAgain { operation: &'static str },

    #[error("registry used before init")]
    Uninitialized,

    #[error("{live} resource(s) still live")]
    NotFreed { live: usize },

    #[error("no open pool in registry slot {slot}")]
    UnknownPool { slot: usize },

    // --- Pool lifecycle ---
    #[error("pool still fragmented into {num_gaps} gaps")]
    Fragmented { num_gaps: usize },

    // --- Deallocation ---
    #[error("pointer was not produced by this pool")]
    UnknownPointer,

    // --- Consistency ---
    #[error("pool corruption detected in {component}: {details}")]
    Corruption {
        component: &'static str,
        details: String,
    },
}

impl PoolError {
    /// Check if error is retryable (the same call can succeed after frees)
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFit { .. } | Self::NoMemory { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMemory { .. } => "POOL:SYS:NO_MEMORY",
            Self::NoFit { .. } => "POOL:ALLOC:NO_FIT",
            Self::CalledAgain { .. } => "POOL:REGISTRY:CALLED_AGAIN",
            Self::Uninitialized => "POOL:REGISTRY:UNINITIALIZED",
            Self::NotFreed { .. } => "POOL:LIFECYCLE:NOT_FREED",
            Self::UnknownPool { .. } => "POOL:REGISTRY:UNKNOWN_POOL",
            Self::Fragmented { .. } => "POOL:LIFECYCLE:FRAGMENTED",
            Self::UnknownPointer => "POOL:FREE:UNKNOWN_POINTER",
            Self::Corruption { .. } => "POOL:SYSTEM:CORRUPTION",
        }
    }

    // --- Convenience constructors ---

    /// Create a refused-system-allocation error
    pub fn no_memory(requested: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(requested, "system allocation refused");

        Self::NoMemory { requested }
    }

    /// Create a no-sufficient-gap error
    #[must_use]
    pub fn no_fit(requested: usize) -> Self {
        Self::NoFit { requested }
    }

    /// Create a repeated-lifecycle-operation error
    #[must_use]
    pub fn called_again(operation: &'static str) -> Self {
        Self::CalledAgain { operation }
    }

    /// Create a live-resources error
    #[must_use]
    pub fn not_freed(live: usize) -> Self {
        Self::NotFreed { live }
    }

    /// Create an unresolvable-handle error
    #[must_use]
    pub fn unknown_pool(slot: usize) -> Self {
        Self::UnknownPool { slot }
    }

    /// Create a multiple-gaps-on-close error
    #[must_use]
    pub fn fragmented(num_gaps: usize) -> Self {
        Self::Fragmented { num_gaps }
    }

    /// Create a corruption error naming the broken structure
    pub fn corruption(component: &'static str, details: impl Into<String>) -> Self {
        let details = details.into();

        #[cfg(feature = "logging")]
        error!(component, %details, "pool corruption detected");

        Self::Corruption { component, details }
    }
}

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PoolError::no_memory(1024);
        assert!(error.to_string().contains("1024"));

        let error = PoolError::no_fit(64);
        assert!(error.to_string().contains("64"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PoolError::no_fit(1).code(), "POOL:ALLOC:NO_FIT");
        assert_eq!(
            PoolError::called_again("init").code(),
            "POOL:REGISTRY:CALLED_AGAIN"
        );
        assert_eq!(
            PoolError::corruption("gap index", "entries out of order").code(),
            "POOL:SYSTEM:CORRUPTION"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(PoolError::no_fit(128).is_retryable());
        assert!(PoolError::no_memory(128).is_retryable());
        assert!(!PoolError::called_again("teardown").is_retryable());
        assert!(!PoolError::UnknownPointer.is_retryable());
    }
}
