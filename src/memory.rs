//! Memory accounting for decoded batches.
//!
//! Every [`Batch`](crate::io::parquet::Batch) holds a [`Reservation`] for the
//! bytes its arrays occupy. The reservation is returned to the
//! [`MemoryPool`] when the batch is released or dropped, so
//! [`PoolStats::outstanding_bytes`] tracks what a sink is still holding.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Counters {
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    reserved: AtomicUsize,
    released_early: AtomicUsize,
}

/// Point-in-time view of a [`MemoryPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Bytes held by live reservations.
    pub outstanding_bytes: usize,
    /// Highest value `outstanding_bytes` has reached.
    pub peak_bytes: usize,
    /// Reservations handed out so far.
    pub reservations: usize,
    /// Reservations given back through an explicit release.
    pub released_early: usize,
}

/// Cheaply clonable handle to shared memory counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    counters: Arc<Counters>,
}

impl MemoryPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `bytes` until the returned reservation goes away.
    #[must_use]
    pub fn reserve(&self, bytes: usize) -> Reservation {
        let c = &self.counters;
        let now = c.outstanding.fetch_add(bytes, Ordering::SeqCst) + bytes;
        c.peak.fetch_max(now, Ordering::SeqCst);
        c.reserved.fetch_add(1, Ordering::SeqCst);
        Reservation {
            pool: self.clone(),
            bytes,
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            outstanding_bytes: c.outstanding.load(Ordering::SeqCst),
            peak_bytes: c.peak.load(Ordering::SeqCst),
            reservations: c.reserved.load(Ordering::SeqCst),
            released_early: c.released_early.load(Ordering::SeqCst),
        }
    }
}

/// Bytes accounted to one batch.
#[derive(Debug)]
pub struct Reservation {
    pool: MemoryPool,
    bytes: usize,
}

impl Reservation {
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Give the bytes back now and count it as an explicit release.
    pub fn release(self) {
        self.pool
            .counters
            .released_early
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pool
            .counters
            .outstanding
            .fetch_sub(self.bytes, Ordering::SeqCst);
    }
}
