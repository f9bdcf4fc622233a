//! exthandle provides safe ownership of resource handles that were allocated
//! by a native subsystem, outside the heap of a garbage-collected host
//! runtime.
//!
//! A [`SafeHandle`] owns exactly one raw handle value and guarantees that the
//! subsystem's release hook runs exactly once over the handle's lifetime,
//! whether the handle is closed explicitly or simply dropped. Because the
//! backing allocation is invisible to the host runtime's memory manager, a
//! handle can also carry a byte estimate of that allocation; the estimate is
//! reported to the runtime's [`Collector`] heuristics when set and withdrawn
//! exactly once when the last handle referring to it lets go.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! use exthandle::{Collector, SafeHandle, Sentinel};
//!
//! // The host runtime's view of memory held outside its heap.
//! #[derive(Default)]
//! struct Heuristics(AtomicU64);
//!
//! impl Collector for Heuristics {
//!     fn register_external_pressure(&self, bytes: u64) {
//!         self.0.fetch_add(bytes, Ordering::SeqCst);
//!     }
//!
//!     fn withdraw_external_pressure(&self, bytes: u64) {
//!         self.0.fetch_sub(bytes, Ordering::SeqCst);
//!     }
//! }
//!
//! unsafe extern "C" fn release_texture(_raw: *mut u8) -> libc::c_int {
//!     0
//! }
//!
//! let collector = Arc::new(Heuristics::default());
//! let mut texture = SafeHandle::with_raw(
//!     0x1000 as *mut u8,
//!     release_texture,
//!     Sentinel::Null,
//!     collector.clone(),
//! );
//! texture.update_estimated_size(1 << 20)?;
//! assert_eq!(collector.0.load(Ordering::SeqCst), 1 << 20);
//!
//! // Dropping the handle releases the raw value and withdraws the estimate.
//! drop(texture);
//! assert_eq!(collector.0.load(Ordering::SeqCst), 0);
//! # Ok::<(), exthandle::Error>(())
//! ```

use std::fmt;

mod collector;
mod handle;
mod pressure;

pub use collector::Collector;
pub use handle::{ReleaseFn, SafeHandle, Sentinel};

/// An error from an illegal handle state transition.
///
/// Failures reported by the release hook never appear here: the hook may run
/// from `Drop`, where there is no caller to report to, so they are logged and
/// swallowed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A raw value was assigned to a handle that already owns one.
    AlreadyValued,
    /// The handle was already closed.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::AlreadyValued => write!(f, "handle already owns a raw value"),
            Error::Closed => write!(f, "handle is closed"),
        }
    }
}

impl std::error::Error for Error {}
