//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::BTreeMap;

use crate::config::{DurationBounds, PlantConfig, RecipeKind, UtilityLine, VesselTypeConfig};
use crate::engine::Plant;
use crate::fixed::{Fixed64, Ticks};
use crate::id::VesselId;
use crate::observer::{Observer, TaskRecord};
use crate::vessel::{LineSlot, VesselKind};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Plant builders
// ===========================================================================

/// An empty plant with the reference configuration.
pub fn reference_plant() -> Plant {
    plant_with(PlantConfig::reference())
}

/// An empty plant. Panics on an invalid configuration.
pub fn plant_with(config: PlantConfig) -> Plant {
    Plant::new(config).expect("test configuration must be valid")
}

/// A single-kind configuration with one CIP line and fixed CIP bounds,
/// handy for scheduler tests that don't care about the reference numbers.
pub fn uniform_config(utility_capacity: u32, cip: DurationBounds) -> PlantConfig {
    let mut config = PlantConfig::reference();
    config.utility_capacity = utility_capacity;
    let mut types = BTreeMap::new();
    for kind in [VesselKind::ParticleFilter, VesselKind::ValveNode] {
        types.insert(
            kind,
            VesselTypeConfig::new(0.0, crate::fixed::hms(2, 0, 0))
                .with_line(UtilityLine::Uv373, 10, 10.0)
                .with_duration(RecipeKind::Cip, cip),
        );
    }
    config.vessel_types.extend(types);
    config
}

/// The two-vessel line of the reference model: one dissolver feeding one
/// filler on line two, plus the filter train between them.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceLine {
    pub dissolver: VesselId,
    pub particle_filter: VesselId,
    pub transfer_line: VesselId,
    pub filler: VesselId,
    pub sterile_filter: VesselId,
    pub valve_node: VesselId,
}

impl ReferenceLine {
    pub fn build(plant: &mut Plant) -> Self {
        let add = |plant: &mut Plant, name: &str, kind, slot| {
            plant
                .add_vessel_on_line(name, kind, slot)
                .expect("reference vessel kinds are configured")
        };
        Self {
            dissolver: add(plant, "LB", VesselKind::Dissolver, LineSlot::One),
            particle_filter: add(plant, "P", VesselKind::ParticleFilter, LineSlot::One),
            transfer_line: add(plant, "T", VesselKind::TransferLine, LineSlot::One),
            filler: add(plant, "AB", VesselKind::Filler, LineSlot::Two),
            sterile_filter: add(plant, "K2", VesselKind::SterileFilter, LineSlot::Two),
            valve_node: add(plant, "VK", VesselKind::ValveNode, LineSlot::One),
        }
    }

    /// Launch the production day: CIP and SIP on both tanks, CIP on the
    /// filter train, then dissolver and filler production.
    pub fn launch_day(&self, plant: &mut Plant) {
        plant.start_cip(self.dissolver).expect("dissolver CIP");
        plant.start_cip(self.filler).expect("filler CIP");
        plant.start_cip(self.particle_filter).expect("filter CIP");
        plant.start_cip(self.transfer_line).expect("line CIP");
        plant.start_cip(self.sterile_filter).expect("sterile CIP");
        plant.start_cip(self.valve_node).expect("node CIP");
        plant.start_sip(self.dissolver).expect("dissolver SIP");
        plant.start_sip(self.filler).expect("filler SIP");
        plant.start_production(self.dissolver, None).expect("dissolver production");
        plant
            .start_production(self.filler, Some(self.dissolver))
            .expect("filler production");
    }
}

// ===========================================================================
// Recording observer
// ===========================================================================

/// One sampled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub tick: Ticks,
    pub subject: String,
    pub key: String,
    pub value: f64,
}

/// Keeps every sample and interval it is given.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    tick: Ticks,
    pub samples: Vec<Sample>,
    pub intervals: Vec<TaskRecord>,
}

impl RecordingObserver {
    pub fn value_at(&self, tick: Ticks, subject: &str, key: &str) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.tick == tick && s.subject == subject && s.key == key)
            .map(|s| s.value)
    }

    /// All values of one variable, in tick order.
    pub fn series(&self, subject: &str, key: &str) -> Vec<(Ticks, f64)> {
        self.samples
            .iter()
            .filter(|s| s.subject == subject && s.key == key)
            .map(|s| (s.tick, s.value))
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn begin_tick(&mut self, tick: Ticks) {
        self.tick = tick;
    }

    fn sample(&mut self, subject: &str, key: &str, value: f64) {
        self.samples.push(Sample {
            tick: self.tick,
            subject: subject.to_string(),
            key: key.to_string(),
            value,
        });
    }

    fn record_interval(&mut self, label: &str, resource: &str, start: Ticks, end: Ticks) {
        self.intervals.push(TaskRecord {
            label: label.to_string(),
            resource: resource.to_string(),
            start,
            end,
        });
    }
}

// ===========================================================================
// Run helpers
// ===========================================================================

/// Run until idle, failing the test if anything is still live at `horizon`.
pub fn run_to_completion(plant: &mut Plant, horizon: Ticks, observer: &mut dyn Observer) {
    let idle = plant.run_until_idle(horizon, observer);
    assert!(
        idle,
        "{} process(es) still live at tick {horizon}",
        plant.live_processes()
    );
}
