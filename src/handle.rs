use std::fmt;
use std::num::NonZeroU64;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libc::c_int;

use crate::collector::Collector;
use crate::pressure::PressureTicket;
use crate::Error;

/// Release hook for a raw handle, provided by the external subsystem.
///
/// A nonzero return reports a failed release. The failure is logged and
/// swallowed: the hook may run from `Drop`, where there is no caller to
/// report to.
pub type ReleaseFn<T> = unsafe extern "C" fn(*mut T) -> c_int;

/// How a raw handle value encodes "no resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Null is the reserved "no resource" value.
    Null,
    /// The all-ones pattern is the reserved "no resource" value; subsystems
    /// with this convention hand out null as a legitimate handle.
    AllOnes,
}

impl Sentinel {
    fn raw<T>(self) -> *mut T {
        match self {
            Sentinel::Null => ptr::null_mut(),
            Sentinel::AllOnes => usize::MAX as *mut T,
        }
    }

    fn is_invalid<T>(self, raw: *mut T) -> bool {
        raw == self.raw()
    }
}

/// Owned wrapper around a raw handle minted by an external subsystem.
///
/// `SafeHandle` guarantees the release hook runs exactly once over the
/// handle's lifetime, from an explicit [`close`](Self::close) or from `Drop`,
/// whichever happens first. It also keeps the host collector's sizing
/// heuristics in step with the bytes the handle pins outside the collected
/// heap: [`update_estimated_size`](Self::update_estimated_size) reports an
/// estimate, and closing the handle withdraws it.
///
/// A handle starts `Empty` (holding the sentinel value), may be assigned a
/// raw value exactly once, and ends `Closed`; once closed, no further state
/// change is legal.
pub struct SafeHandle<T> {
    raw: *mut T,
    sentinel: Sentinel,
    release: ReleaseFn<T>,
    closed: AtomicBool,
    pressure: Option<Arc<PressureTicket>>,
    collector: Arc<dyn Collector>,
}

// `SafeHandle` is safe to Send as it encapsulates the entire lifetime of the
// raw value. Sync is not asserted: concurrent use of the raw value is the
// subsystem's contract, not ours.
unsafe impl<T> Send for SafeHandle<T> {}

impl<T> SafeHandle<T> {
    /// Creates a handle with no resource. The raw slot holds the sentinel
    /// value until [`set_raw`](Self::set_raw) assigns one.
    pub fn empty(release: ReleaseFn<T>, sentinel: Sentinel, collector: Arc<dyn Collector>) -> Self {
        Self::with_raw(sentinel.raw(), release, sentinel, collector)
    }

    /// Creates a handle that owns `raw` from the start.
    ///
    /// A sentinel-valued `raw` yields an invalid handle that is still
    /// considered owned; closing it skips the release hook.
    pub fn with_raw(
        raw: *mut T,
        release: ReleaseFn<T>,
        sentinel: Sentinel,
        collector: Arc<dyn Collector>,
    ) -> Self {
        SafeHandle {
            raw,
            sentinel,
            release,
            closed: AtomicBool::new(false),
            pressure: None,
            collector,
        }
    }

    /// Assigns the owned raw value.
    ///
    /// Legal exactly once: the current value must still be the sentinel and
    /// the handle must not be closed. Assigning the sentinel itself leaves
    /// the handle empty and a later assignment legal.
    pub fn set_raw(&mut self, raw: *mut T) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if !self.sentinel.is_invalid(self.raw) {
            return Err(Error::AlreadyValued);
        }
        self.raw = raw;
        Ok(())
    }

    /// The raw handle value.
    ///
    /// Only meaningful while [`is_closed`](Self::is_closed) is false; a
    /// closed handle reports the sentinel.
    pub fn as_ptr(&self) -> *mut T {
        self.raw
    }

    /// Whether the handle currently holds the sentinel ("no resource") value.
    pub fn is_invalid(&self) -> bool {
        self.sentinel.is_invalid(self.raw)
    }

    /// Whether the release hook has already run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Bytes of external memory this handle currently reports to the
    /// collector, 0 when none.
    pub fn estimated_size(&self) -> u64 {
        self.pressure.as_ref().map_or(0, |t| t.estimated_size())
    }

    /// Points the collector's heuristics at the resource's current byte
    /// estimate.
    ///
    /// Any previously reported estimate is let go first (a shared estimate
    /// is withdrawn only once its last holder releases). `bytes == 0` means
    /// "track nothing": the old estimate is dropped and no new registration
    /// is made.
    pub fn update_estimated_size(&mut self, bytes: u64) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.release_pressure();
        if let Some(bytes) = NonZeroU64::new(bytes) {
            let ticket = PressureTicket::acquire(bytes, Arc::clone(&self.collector));
            ticket.add_ref();
            self.pressure = Some(ticket);
        }
        Ok(())
    }

    /// Adopts the pressure estimate `other` holds, sharing it rather than
    /// re-registering: both handles then refer to the same registration, and
    /// its withdrawal waits for whichever of them closes last.
    ///
    /// A no-op when `other` tracks nothing; our own estimate is kept in that
    /// case.
    pub fn copy_pressure_from(&mut self, other: &SafeHandle<T>) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(ticket) = &other.pressure {
            self.release_pressure();
            ticket.add_ref();
            self.pressure = Some(Arc::clone(ticket));
        }
        Ok(())
    }

    /// Releases the raw handle and withdraws its pressure accounting.
    ///
    /// Idempotent, and shared with the `Drop` path: whichever runs first wins
    /// the close-once guard and the loser backs off. A failure reported by
    /// the release hook is logged and swallowed; `close` never panics and
    /// never propagates it.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.sentinel.is_invalid(self.raw) {
            let status = unsafe { (self.release)(self.raw) };
            if status != 0 {
                log::warn!(
                    "release hook failed for handle {:p} (status {})",
                    self.raw,
                    status
                );
            }
            self.raw = self.sentinel.raw();
        }
        self.release_pressure();
    }

    fn release_pressure(&mut self) {
        if let Some(ticket) = self.pressure.take() {
            ticket.release();
        }
    }
}

impl<T> Drop for SafeHandle<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for SafeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeHandle")
            .field("raw", &self.raw)
            .field("sentinel", &self.sentinel)
            .field("closed", &self.is_closed())
            .field("estimated_size", &self.estimated_size())
            .finish()
    }
}
