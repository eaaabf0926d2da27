//! Pool configuration

/// Configuration for one pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Fill pattern byte for freshly carved allocations (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for freed spans (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Production configuration - no fill work on the carve path
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - pattern every carve and release
    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }
}
