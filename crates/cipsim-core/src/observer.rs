//! The write-only reporting boundary.
//!
//! The plant pushes one sample per registered variable per tick, after every
//! process step of that tick, and one interval per completed recipe. It
//! never reads anything back.

use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;
use crate::id::VesselId;

/// Receives samples and task intervals from the plant.
pub trait Observer {
    /// Called once per tick before that tick's samples.
    fn begin_tick(&mut self, _tick: Ticks) {}

    /// One value of one registered variable.
    fn sample(&mut self, subject: &str, key: &str, value: f64);

    /// One completed recipe.
    fn record_interval(&mut self, label: &str, resource: &str, start: Ticks, end: Ticks);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn sample(&mut self, _subject: &str, _key: &str, _value: f64) {}

    fn record_interval(&mut self, _label: &str, _resource: &str, _start: Ticks, _end: Ticks) {}
}

/// A completed recipe, as reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub label: String,
    pub resource: String,
    pub start: Ticks,
    pub end: Ticks,
}

impl TaskRecord {
    pub fn duration(&self) -> Ticks {
        self.end.saturating_sub(self.start)
    }
}

/// Where a sampled value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    CipState(VesselId),
    SipState(VesselId),
    Volume(VesselId),
    PoolAvailable,
    PoolReserved,
}

/// A registered per-tick sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub subject: String,
    pub key: &'static str,
    pub source: Source,
}

impl Variable {
    pub fn new(subject: impl Into<String>, key: &'static str, source: Source) -> Self {
        Self {
            subject: subject.into(),
            key,
            source,
        }
    }
}
