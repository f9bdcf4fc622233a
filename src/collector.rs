#[cfg(test)]
use mockall::automock;

/// Hooks into the host runtime's collection-sizing heuristics.
///
/// The runtime embedding this crate implements `Collector` to route byte-size
/// hints to whatever its memory manager exposes for memory held outside the
/// collected heap. The crate guarantees that every registration it makes is
/// paired with exactly one withdrawal of the same size, no matter how the
/// handles holding the registration go away.
#[cfg_attr(test, automock)]
pub trait Collector: Send + Sync {
    /// Tells the collector that `bytes` of memory now exist outside its heap.
    fn register_external_pressure(&self, bytes: u64);

    /// Withdraws a previous registration of the same `bytes`.
    fn withdraw_external_pressure(&self, bytes: u64);
}

// GRCOV_EXCL_STOP
