//! The shared hot-utility capacity pool.
//!
//! A non-blocking reservation counter for the heated WFI loop. Requests either
//! succeed immediately and commit, or fail and change nothing. There is no
//! wait queue: a requester that fails must poll again on a later tick, and
//! under contention the requester that runs first in the tick's process order
//! wins. Starvation of a large requester by a stream of small ones is
//! therefore possible.

use serde::{Deserialize, Serialize};

/// Proof of a successful reservation. Consumed by [`CapacityPool::release_reservation`]
/// so a holder can only give back exactly what it took.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be released back to the pool"]
pub struct Reservation {
    amount: u32,
}

impl Reservation {
    /// Units held by this reservation.
    pub fn amount(&self) -> u32 {
        self.amount
    }
}

/// Reservation counter with the invariant `available + reserved == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPool {
    name: String,
    total: u32,
    available: u32,
    reserved: u32,
    /// Failed requests since construction.
    rejected: u64,
    /// Ticks during which at least one unit was reserved.
    busy_ticks: u64,
    /// Highest `reserved` value seen by the per-tick bookkeeping.
    peak_reserved: u32,
}

impl CapacityPool {
    /// Create a pool with all capacity available.
    pub fn new(name: impl Into<String>, total: u32) -> Self {
        Self {
            name: name.into(),
            total,
            available: total,
            reserved: 0,
            rejected: 0,
            busy_ticks: 0,
            peak_reserved: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn busy_ticks(&self) -> u64 {
        self.busy_ticks
    }

    pub fn peak_reserved(&self) -> u32 {
        self.peak_reserved
    }

    /// Atomic test-and-decrement. Commits and returns `true` iff
    /// `amount <= available`; otherwise leaves the pool untouched.
    pub fn request(&mut self, amount: u32) -> bool {
        if amount <= self.available {
            self.available -= amount;
            self.reserved += amount;
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    /// Return `amount` units. The pool trusts the caller: releasing more than
    /// was reserved saturates rather than going negative, and no diagnostic
    /// is produced.
    pub fn release(&mut self, amount: u32) {
        let amount = amount.min(self.reserved);
        self.reserved -= amount;
        self.available += amount;
    }

    /// Like [`request`](Self::request) but hands back a [`Reservation`]
    /// that must be returned through [`release_reservation`](Self::release_reservation).
    pub fn try_reserve(&mut self, amount: u32) -> Option<Reservation> {
        self.request(amount).then_some(Reservation { amount })
    }

    /// Return a reservation obtained from [`try_reserve`](Self::try_reserve).
    pub fn release_reservation(&mut self, reservation: Reservation) {
        self.release(reservation.amount);
    }

    /// Per-tick bookkeeping: utilisation counters.
    pub fn on_tick(&mut self) {
        if self.reserved > 0 {
            self.busy_ticks += 1;
        }
        self.peak_reserved = self.peak_reserved.max(self.reserved);
    }

    /// Whether the conservation invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.available.checked_add(self.reserved) == Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_release_round_trip() {
        let mut pool = CapacityPool::new("WFI", 50);
        assert!(pool.request(30));
        assert_eq!(pool.available(), 20);
        assert_eq!(pool.reserved(), 30);

        assert!(!pool.request(30));
        assert_eq!(pool.available(), 20);
        assert_eq!(pool.reserved(), 30);
        assert_eq!(pool.rejected(), 1);

        pool.release(30);
        assert_eq!(pool.available(), 50);
        assert_eq!(pool.reserved(), 0);
        assert!(pool.is_consistent());
    }

    #[test]
    fn exact_fit_succeeds() {
        let mut pool = CapacityPool::new("WFI", 50);
        assert!(pool.request(50));
        assert_eq!(pool.available(), 0);
        assert!(!pool.request(1));
    }

    #[test]
    fn zero_request_always_succeeds() {
        let mut pool = CapacityPool::new("WFI", 0);
        assert!(pool.request(0));
        assert!(pool.is_consistent());
    }

    #[test]
    fn over_release_saturates() {
        let mut pool = CapacityPool::new("WFI", 50);
        assert!(pool.request(10));
        pool.release(25);
        assert_eq!(pool.available(), 50);
        assert_eq!(pool.reserved(), 0);
        assert!(pool.is_consistent());
    }

    #[test]
    fn reservation_guard_releases_exact_amount() {
        let mut pool = CapacityPool::new("WFI", 50);
        let a = pool.try_reserve(18).unwrap();
        let b = pool.try_reserve(30).unwrap();
        assert!(pool.try_reserve(5).is_none());
        assert_eq!(a.amount(), 18);
        pool.release_reservation(a);
        assert_eq!(pool.available(), 20);
        pool.release_reservation(b);
        assert_eq!(pool.available(), 50);
    }

    #[test]
    fn bookkeeping_tracks_busy_ticks_and_peak() {
        let mut pool = CapacityPool::new("WFI", 50);
        pool.on_tick();
        assert!(pool.request(19));
        pool.on_tick();
        assert!(pool.request(30));
        pool.on_tick();
        pool.release(49);
        pool.on_tick();
        assert_eq!(pool.busy_ticks(), 2);
        assert_eq!(pool.peak_reserved(), 49);
    }
}
