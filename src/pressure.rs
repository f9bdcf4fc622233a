use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::collector::Collector;

/// A shared token for "this many bytes live outside the collector's heap".
///
/// Acquiring a ticket registers its size with the [`Collector`] heuristics.
/// The registration is withdrawn when the last holder releases its reference,
/// or at the latest when the ticket itself is dropped; both paths go through
/// one spent flag, so the withdrawal fires exactly once no matter how the
/// holders go away or how their teardown interleaves.
pub(crate) struct PressureTicket {
    estimated_size: NonZeroU64,
    refs: AtomicUsize,
    spent: AtomicBool,
    collector: Arc<dyn Collector>,
}

impl PressureTicket {
    /// Registers `estimated_size` bytes with `collector` and returns a ticket
    /// with a holder count of zero. Each holder adopts the ticket with
    /// [`add_ref`](Self::add_ref).
    ///
    /// The size type rules out zero-byte tickets; callers that have nothing
    /// to track simply do not acquire one.
    pub(crate) fn acquire(estimated_size: NonZeroU64, collector: Arc<dyn Collector>) -> Arc<Self> {
        collector.register_external_pressure(estimated_size.get());
        Arc::new(PressureTicket {
            estimated_size,
            refs: AtomicUsize::new(0),
            spent: AtomicBool::new(false),
            collector,
        })
    }

    /// The byte estimate this ticket registered.
    pub(crate) fn estimated_size(&self) -> u64 {
        self.estimated_size.get()
    }

    /// Records one more holder. Called exactly once per handle that adopts
    /// the ticket, immediately after adoption.
    pub(crate) fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops one holder; the holder that takes the count to zero withdraws
    /// the registration.
    ///
    /// Releasing more times than [`add_ref`](Self::add_ref) was called is a
    /// caller bug: the count refuses to go below zero, and the spent flag
    /// keeps the withdrawal from ever running twice.
    pub(crate) fn release(&self) {
        match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => self.withdraw(),
            Ok(_) => {}
            Err(_) => debug_assert!(false, "pressure ticket released with no outstanding holders"),
        }
    }

    fn withdraw(&self) {
        if !self.spent.swap(true, Ordering::AcqRel) {
            self.collector
                .withdraw_external_pressure(self.estimated_size.get());
        }
    }
}

impl Drop for PressureTicket {
    // Safety net for tickets abandoned without release; a no-op once spent.
    fn drop(&mut self) {
        self.withdraw();
    }
}

impl fmt::Debug for PressureTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PressureTicket")
            .field("estimated_size", &self.estimated_size)
            .field("refs", &self.refs.load(Ordering::Relaxed))
            .field("spent", &self.spent.load(Ordering::Relaxed))
            .finish()
    }
}
