//! Clock state and reproducibility hashing.
//!
//! Time is a strictly monotonic integer tick counter owned by the plant.
//! [`StateHash`] folds the observable plant state into one value so two runs
//! can be compared for divergence.

use crate::fixed::{Fixed64, Ticks};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable clock state tracked by the plant.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// The tick currently being (or about to be) executed.
    pub tick: Ticks,
}

impl SimState {
    /// Create a new clock starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }

    /// Move to the next tick.
    pub fn advance(&mut self) {
        self.tick += 1;
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What happened during one call to `Plant::tick`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that was executed.
    pub tick: Ticks,
    /// Number of process resumptions (a process may resume more than once
    /// in a tick after a same-tick lock handoff).
    pub resumptions: u32,
    /// Processes that finished during this tick.
    pub completed: u32,
    /// Hygiene tracks forced to dirty by the hold-time monitor.
    pub hold_time_resets: u32,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of plant state for divergence detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u32 into the hash.
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a Fixed64 into the hash.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
