//! Capacity-1 FIFO mutexes for vessels and route tokens.
//!
//! Unlike the capacity pool, locks queue their requesters and grant strictly
//! in arrival order. Release hands the lock straight to the head of the
//! queue in the same tick; the new holder resumes in the scheduler's next
//! pass over that tick.

use std::collections::{BTreeMap, VecDeque};

use crate::id::{LockId, ProcessId};

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRequest {
    /// The requester now holds the lock.
    Granted,
    /// The requester was appended to the wait queue.
    Queued { position: usize },
}

/// Errors raised by lock release.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The releasing process does not hold the lock.
    #[error("process {released_by:?} released {lock:?} held by {holder:?}")]
    NotHolder {
        lock: LockId,
        released_by: ProcessId,
        holder: Option<ProcessId>,
    },
}

/// A single FIFO mutex.
#[derive(Debug, Clone, Default)]
pub struct FifoLock {
    holder: Option<ProcessId>,
    queue: VecDeque<ProcessId>,
    /// Number of grants since construction.
    grants: u64,
    /// Ticks during which the lock was held.
    held_ticks: u64,
    /// Ticks during which at least one process was queued.
    contended_ticks: u64,
}

impl FifoLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if free, otherwise join the back of the queue. A process
    /// that already holds or waits for the lock is not queued twice.
    pub fn request(&mut self, process: ProcessId) -> LockRequest {
        if self.holder == Some(process) {
            return LockRequest::Granted;
        }
        if let Some(position) = self.queue.iter().position(|p| *p == process) {
            return LockRequest::Queued { position };
        }
        if self.holder.is_none() && self.queue.is_empty() {
            self.holder = Some(process);
            self.grants += 1;
            LockRequest::Granted
        } else {
            self.queue.push_back(process);
            LockRequest::Queued {
                position: self.queue.len() - 1,
            }
        }
    }

    /// Release the lock and grant it to the head of the queue, returning the
    /// new holder.
    pub fn release(&mut self, lock: LockId, process: ProcessId) -> Result<Option<ProcessId>, LockError> {
        if self.holder != Some(process) {
            return Err(LockError::NotHolder {
                lock,
                released_by: process,
                holder: self.holder,
            });
        }
        self.holder = self.queue.pop_front();
        if self.holder.is_some() {
            self.grants += 1;
        }
        Ok(self.holder)
    }

    pub fn holder(&self) -> Option<ProcessId> {
        self.holder
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn grants(&self) -> u64 {
        self.grants
    }

    pub fn held_ticks(&self) -> u64 {
        self.held_ticks
    }

    pub fn contended_ticks(&self) -> u64 {
        self.contended_ticks
    }

    /// Per-tick bookkeeping: occupancy counters.
    pub fn on_tick(&mut self) {
        if self.holder.is_some() {
            self.held_ticks += 1;
        }
        if !self.queue.is_empty() {
            self.contended_ticks += 1;
        }
    }
}

/// All vessel locks and route tokens of a plant.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    locks: BTreeMap<LockId, FifoLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lock. Registering twice is a no-op.
    pub fn register(&mut self, lock: LockId) {
        self.locks.entry(lock).or_default();
    }

    pub fn request(&mut self, lock: LockId, process: ProcessId) -> LockRequest {
        self.locks.entry(lock).or_default().request(process)
    }

    pub fn release(&mut self, lock: LockId, process: ProcessId) -> Result<Option<ProcessId>, LockError> {
        match self.locks.get_mut(&lock) {
            Some(l) => l.release(lock, process),
            None => Err(LockError::NotHolder {
                lock,
                released_by: process,
                holder: None,
            }),
        }
    }

    pub fn holder(&self, lock: LockId) -> Option<ProcessId> {
        self.locks.get(&lock).and_then(FifoLock::holder)
    }

    pub fn get(&self, lock: LockId) -> Option<&FifoLock> {
        self.locks.get(&lock)
    }

    /// Iterate locks in global acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = (LockId, &FifoLock)> {
        self.locks.iter().map(|(id, l)| (*id, l))
    }

    pub fn on_tick(&mut self) {
        for lock in self.locks.values_mut() {
            lock.on_tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteSegment;

    const SEG: LockId = LockId::Route(RouteSegment::ParticleFilterToTransfer);

    #[test]
    fn free_lock_is_granted() {
        let mut lock = FifoLock::new();
        assert_eq!(lock.request(ProcessId(1)), LockRequest::Granted);
        assert_eq!(lock.holder(), Some(ProcessId(1)));
    }

    #[test]
    fn waiters_are_granted_in_arrival_order() {
        let mut lock = FifoLock::new();
        lock.request(ProcessId(5));
        assert_eq!(lock.request(ProcessId(9)), LockRequest::Queued { position: 0 });
        assert_eq!(lock.request(ProcessId(2)), LockRequest::Queued { position: 1 });

        assert_eq!(lock.release(SEG, ProcessId(5)), Ok(Some(ProcessId(9))));
        assert_eq!(lock.release(SEG, ProcessId(9)), Ok(Some(ProcessId(2))));
        assert_eq!(lock.release(SEG, ProcessId(2)), Ok(None));
        assert_eq!(lock.grants(), 3);
    }

    #[test]
    fn repeated_request_is_idempotent() {
        let mut lock = FifoLock::new();
        lock.request(ProcessId(1));
        assert_eq!(lock.request(ProcessId(1)), LockRequest::Granted);
        lock.request(ProcessId(2));
        assert_eq!(lock.request(ProcessId(2)), LockRequest::Queued { position: 0 });
        assert_eq!(lock.queue_len(), 1);
    }

    #[test]
    fn release_by_non_holder_is_rejected() {
        let mut lock = FifoLock::new();
        lock.request(ProcessId(1));
        let err = lock.release(SEG, ProcessId(2)).unwrap_err();
        assert_eq!(
            err,
            LockError::NotHolder {
                lock: SEG,
                released_by: ProcessId(2),
                holder: Some(ProcessId(1)),
            }
        );
        assert_eq!(lock.holder(), Some(ProcessId(1)));
    }

    #[test]
    fn table_tracks_occupancy() {
        let mut table = LockTable::new();
        table.register(SEG);
        table.request(SEG, ProcessId(1));
        table.request(SEG, ProcessId(2));
        table.on_tick();
        table.release(SEG, ProcessId(1)).unwrap();
        table.on_tick();
        let lock = table.get(SEG).unwrap();
        assert_eq!(lock.held_ticks(), 2);
        assert_eq!(lock.contended_ticks(), 1);
        assert_eq!(table.holder(SEG), Some(ProcessId(2)));
    }

    #[test]
    fn unknown_lock_release_errors() {
        let mut table = LockTable::new();
        assert!(table.release(SEG, ProcessId(1)).is_err());
    }
}
