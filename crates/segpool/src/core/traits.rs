//! Base traits for memory accounting

/// Memory usage reporting for anything that owns a bounded supply of bytes.
pub trait MemoryUsage {
    /// Bytes currently handed out to callers
    fn used_memory(&self) -> usize;

    /// Bytes still available, if the implementor can know it
    fn available_memory(&self) -> Option<usize>;

    /// Total managed bytes, if bounded
    fn total_memory(&self) -> Option<usize>;
}
