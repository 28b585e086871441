//! Plant statistics for the CIP/SIP simulator.
//!
//! [`PlantStats`] is an [`Observer`]: hand it to `Plant::tick` and it keeps
//! every sampled variable as a step series, a rolling mean over a
//! configurable window, and the completed task intervals. From those it
//! derives pool utilisation, time spent per hygiene state and busy time per
//! resource.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = PlantStats::new(StatsConfig::default());
//! plant.run_until(hms(5, 0, 0), &mut stats);
//! let load = stats.utilisation("WFI");
//! let cleaning = stats.time_in_state("LB", Track::Cip, HygieneState::Cleaning);
//! ```

use std::collections::HashMap;

use cipsim_core::fixed::{f64_to_fixed64, Fixed64, Ticks};
use cipsim_core::hygiene::{HygieneState, Track};
use cipsim_core::observer::{Observer, TaskRecord};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics module.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Window size in ticks for rolling means (e.g., 60 ticks).
    pub window_size: usize,
    /// Maximum number of rolling-mean snapshots to retain per series.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            history_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// RingBuffer -- generic ring buffer for historical data
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer storing [`Fixed64`] values for trend analysis.
///
/// When full, the oldest entry is overwritten. Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Fixed64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity. A capacity of 0 is
    /// clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![Fixed64::ZERO; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: Fixed64) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Get the most recently pushed value, if any.
    pub fn latest(&self) -> Option<Fixed64> {
        if self.len == 0 {
            return None;
        }
        let idx = if self.head == 0 { self.capacity() - 1 } else { self.head - 1 };
        Some(self.data[idx])
    }

    /// Iterate values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Fixed64> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.data[(start + i) % capacity])
    }

    /// Collect all stored values into a Vec (oldest to newest).
    pub fn to_vec(&self) -> Vec<Fixed64> {
        self.iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Rolling mean
// ---------------------------------------------------------------------------

/// Mean of the most recent N samples, kept with a running total.
#[derive(Debug, Clone)]
struct RollingMean {
    values: Vec<Fixed64>,
    write_pos: usize,
    total: Fixed64,
    count: usize,
}

impl RollingMean {
    fn new(window_size: usize) -> Self {
        Self {
            values: vec![Fixed64::ZERO; window_size.max(1)],
            write_pos: 0,
            total: Fixed64::ZERO,
            count: 0,
        }
    }

    fn push(&mut self, value: Fixed64) {
        if self.count == self.values.len() {
            self.total -= self.values[self.write_pos];
        } else {
            self.count += 1;
        }
        self.values[self.write_pos] = value;
        self.total += value;
        self.write_pos = (self.write_pos + 1) % self.values.len();
    }

    fn mean(&self) -> Fixed64 {
        if self.count == 0 {
            return Fixed64::ZERO;
        }
        self.total / Fixed64::from_num(self.count)
    }
}

// ---------------------------------------------------------------------------
// Per-variable series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Series {
    /// `(tick, value)` at every tick where the value changed.
    changes: Vec<(Ticks, f64)>,
    last_tick: Ticks,
    sum: f64,
    samples: u64,
    rolling: RollingMean,
    history: RingBuffer,
}

impl Series {
    fn new(config: &StatsConfig) -> Self {
        Self {
            changes: Vec::new(),
            last_tick: 0,
            sum: 0.0,
            samples: 0,
            rolling: RollingMean::new(config.window_size),
            history: RingBuffer::new(config.history_capacity),
        }
    }

    fn record(&mut self, tick: Ticks, value: f64) {
        if self.changes.last().is_none_or(|&(_, last)| last != value) {
            self.changes.push((tick, value));
        }
        self.last_tick = tick;
        self.sum += value;
        self.samples += 1;
        self.rolling.push(f64_to_fixed64(value));
    }

    fn value_at(&self, tick: Ticks) -> Option<f64> {
        if tick > self.last_tick {
            return None;
        }
        let idx = self.changes.partition_point(|&(t, _)| t <= tick);
        idx.checked_sub(1).map(|i| self.changes[i].1)
    }

    /// Ticks, up to and including the last sample, during which the series
    /// held `value`.
    fn time_at(&self, value: f64) -> Ticks {
        let ends = self
            .changes
            .iter()
            .skip(1)
            .map(|&(t, _)| t)
            .chain(std::iter::once(self.last_tick + 1));
        self.changes
            .iter()
            .zip(ends)
            .filter(|((_, v), _)| *v == value)
            .map(|(&(start, _), end)| end - start)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// PlantStats
// ---------------------------------------------------------------------------

/// Records everything the plant reports and derives summary metrics.
#[derive(Debug, Clone)]
pub struct PlantStats {
    config: StatsConfig,
    /// Tick currently being sampled.
    tick: Option<Ticks>,
    ticks_observed: u64,
    series: HashMap<(String, String), Series>,
    intervals: Vec<TaskRecord>,
    busy: HashMap<String, Ticks>,
}

impl PlantStats {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            tick: None,
            ticks_observed: 0,
            series: HashMap::new(),
            intervals: Vec::new(),
            busy: HashMap::new(),
        }
    }

    fn get(&self, subject: &str, key: &str) -> Option<&Series> {
        self.series.get(&(subject.to_string(), key.to_string()))
    }

    /// End-of-tick accounting: snapshot each rolling mean into its history.
    fn end_tick(&mut self) {
        for series in self.series.values_mut() {
            let mean = series.rolling.mean();
            series.history.push(mean);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn ticks_observed(&self) -> u64 {
        self.ticks_observed
    }

    /// Change points of one variable, oldest first.
    pub fn changes(&self, subject: &str, key: &str) -> Option<&[(Ticks, f64)]> {
        self.get(subject, key).map(|s| s.changes.as_slice())
    }

    /// Value of a variable at `tick`, if it was sampled by then.
    pub fn value_at(&self, subject: &str, key: &str, tick: Ticks) -> Option<f64> {
        self.get(subject, key).and_then(|s| s.value_at(tick))
    }

    /// Mean of the last `window_size` samples.
    pub fn rolling_mean(&self, subject: &str, key: &str) -> Fixed64 {
        self.get(subject, key).map_or(Fixed64::ZERO, |s| s.rolling.mean())
    }

    /// Mean over every sample of a variable.
    pub fn mean(&self, subject: &str, key: &str) -> Option<f64> {
        self.get(subject, key)
            .filter(|s| s.samples > 0)
            .map(|s| s.sum / s.samples as f64)
    }

    /// Rolling-mean snapshots, one per completed tick.
    pub fn history(&self, subject: &str, key: &str) -> Option<&RingBuffer> {
        self.get(subject, key).map(|s| &s.history)
    }

    /// Share of a capacity pool that was reserved, averaged over all
    /// observed ticks (0.0 to 1.0).
    pub fn utilisation(&self, pool: &str) -> f64 {
        let reserved = self.get(pool, "reserved").map_or(0.0, |s| s.sum);
        let available = self.get(pool, "available").map_or(0.0, |s| s.sum);
        let total = reserved + available;
        if total > 0.0 { reserved / total } else { 0.0 }
    }

    /// Ticks a unit spent in `state` on `track`.
    pub fn time_in_state(&self, subject: &str, track: Track, state: HygieneState) -> Ticks {
        self.get(subject, track.name())
            .map_or(0, |s| s.time_at(f64::from(state.code())))
    }

    /// Completed task intervals, in completion order.
    pub fn intervals(&self) -> &[TaskRecord] {
        &self.intervals
    }

    /// Task intervals ordered by start tick, then resource.
    pub fn gantt(&self) -> Vec<&TaskRecord> {
        let mut rows: Vec<&TaskRecord> = self.intervals.iter().collect();
        rows.sort_by(|a, b| (a.start, &a.resource).cmp(&(b.start, &b.resource)));
        rows
    }

    /// Total ticks a resource spent inside completed tasks.
    pub fn busy_time(&self, resource: &str) -> Ticks {
        self.busy.get(resource).copied().unwrap_or(0)
    }
}

impl Default for PlantStats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

impl Observer for PlantStats {
    fn begin_tick(&mut self, tick: Ticks) {
        if self.tick.is_some() {
            self.end_tick();
        }
        self.tick = Some(tick);
        self.ticks_observed += 1;
    }

    fn sample(&mut self, subject: &str, key: &str, value: f64) {
        let tick = self.tick.unwrap_or(0);
        let config = &self.config;
        self.series
            .entry((subject.to_string(), key.to_string()))
            .or_insert_with(|| Series::new(config))
            .record(tick, value);
    }

    fn record_interval(&mut self, label: &str, resource: &str, start: Ticks, end: Ticks) {
        let record = TaskRecord {
            label: label.to_string(),
            resource: resource.to_string(),
            start,
            end,
        };
        *self.busy.entry(record.resource.clone()).or_insert(0) += record.duration();
        self.intervals.push(record);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
