//! Plant configuration.
//!
//! Supplied once at construction and immutable afterwards. Rates and volumes
//! are authored as `f64` for readability in data files and converted to
//! [`Fixed64`] when a recipe is planned, never inside the tick loop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fixed::{f64_to_fixed64, ms, Fixed64, Ticks};
use crate::vessel::VesselKind;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A draw point on the heated WFI loop. Every line draws from the one
/// shared capacity pool; the line only selects which rate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UtilityLine {
    /// 60 C product water.
    #[serde(rename = "UV042")]
    Uv042,
    /// 90 C CIP through the media inlet.
    #[serde(rename = "UV043")]
    Uv043,
    /// 90 C CIP through the transfer line.
    #[serde(rename = "UV363")]
    Uv363,
    /// 90 C CIP of filters, transfer line and valve node.
    #[serde(rename = "UV373")]
    Uv373,
    /// 20 C filter cooling.
    #[serde(rename = "UV374")]
    Uv374,
}

impl UtilityLine {
    pub fn tag(self) -> &'static str {
        match self {
            UtilityLine::Uv042 => "UV042",
            UtilityLine::Uv043 => "UV043",
            UtilityLine::Uv363 => "UV363",
            UtilityLine::Uv373 => "UV373",
            UtilityLine::Uv374 => "UV374",
        }
    }
}

/// Recipe families with their own duration bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecipeKind {
    Cip,
    Sip,
    Production,
}

impl RecipeKind {
    pub fn label(self) -> &'static str {
        match self {
            RecipeKind::Cip => "CIP",
            RecipeKind::Sip => "SIP",
            RecipeKind::Production => "PROD",
        }
    }
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// `(lower, mean, upper)` duration triple in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub lower: Ticks,
    pub mean: Ticks,
    pub upper: Ticks,
}

impl DurationBounds {
    pub const fn new(lower: Ticks, mean: Ticks, upper: Ticks) -> Self {
        Self { lower, mean, upper }
    }

    pub fn validate(&self, recipe: RecipeKind) -> Result<(), ConfigError> {
        if self.lower <= self.mean && self.mean <= self.upper {
            Ok(())
        } else {
            Err(ConfigError::InvalidDurationBounds {
                recipe,
                lower: self.lower,
                mean: self.mean,
                upper: self.upper,
            })
        }
    }

    /// Standard deviation used when sampling: one fifth of the mean.
    pub fn stddev(&self) -> f64 {
        self.mean as f64 / 5.0
    }
}

/// How target durations are chosen at launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationSampling {
    /// Every recipe targets the configured mean. Fully deterministic.
    #[default]
    Mean,
    /// Truncated normal draw from a seeded generator.
    Normal { seed: u64 },
}

// ---------------------------------------------------------------------------
// Per vessel type
// ---------------------------------------------------------------------------

/// Everything configured for one [`VesselKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselTypeConfig {
    /// Volumetric capacity in m3. Zero for units without volume.
    #[serde(default)]
    pub capacity: f64,
    /// Clean hold time in ticks.
    pub clean_hold_time: Ticks,
    /// Pool units reserved while drawing from each line.
    #[serde(default)]
    pub utility_rates: BTreeMap<UtilityLine, u32>,
    /// Flow rate in m3/h on each line.
    #[serde(default)]
    pub flow_rates: BTreeMap<UtilityLine, f64>,
    #[serde(default)]
    pub durations: BTreeMap<RecipeKind, DurationBounds>,
}

impl VesselTypeConfig {
    pub fn new(capacity: f64, clean_hold_time: Ticks) -> Self {
        Self {
            capacity,
            clean_hold_time,
            utility_rates: BTreeMap::new(),
            flow_rates: BTreeMap::new(),
            durations: BTreeMap::new(),
        }
    }

    /// Builder: set pool rate and flow rate for a line.
    pub fn with_line(mut self, line: UtilityLine, utility_rate: u32, flow_rate: f64) -> Self {
        self.utility_rates.insert(line, utility_rate);
        self.flow_rates.insert(line, flow_rate);
        self
    }

    /// Builder: set the duration bounds of a recipe family.
    pub fn with_duration(mut self, recipe: RecipeKind, bounds: DurationBounds) -> Self {
        self.durations.insert(recipe, bounds);
        self
    }

    pub fn has_line(&self, line: UtilityLine) -> bool {
        self.utility_rates.contains_key(&line) && self.flow_rates.contains_key(&line)
    }

    pub fn utility_rate(&self, vessel: &str, line: UtilityLine) -> Result<u32, ConfigError> {
        self.utility_rates
            .get(&line)
            .copied()
            .ok_or_else(|| ConfigError::MissingUtilityRate {
                vessel: vessel.to_string(),
                line,
            })
    }

    pub fn flow_rate(&self, vessel: &str, line: UtilityLine) -> Result<Fixed64, ConfigError> {
        let rate = self
            .flow_rates
            .get(&line)
            .copied()
            .ok_or_else(|| ConfigError::MissingFlowRate {
                vessel: vessel.to_string(),
                line,
            })?;
        if rate <= 0.0 {
            return Err(ConfigError::ZeroRate { line });
        }
        Ok(f64_to_fixed64(rate))
    }

    pub fn duration(&self, kind: VesselKind, recipe: RecipeKind) -> Result<DurationBounds, ConfigError> {
        let bounds = self
            .durations
            .get(&recipe)
            .copied()
            .ok_or(ConfigError::MissingDuration { kind, recipe })?;
        bounds.validate(recipe)?;
        Ok(bounds)
    }
}

// ---------------------------------------------------------------------------
// Production choreography
// ---------------------------------------------------------------------------

/// One product-water dosing step on UV042.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseConfig {
    pub utility_rate: u32,
    /// m3/h.
    pub flow_rate: f64,
    /// m3. For the end dose this is the target level, not an increment.
    pub amount: f64,
}

impl DoseConfig {
    pub const fn new(utility_rate: u32, flow_rate: f64, amount: f64) -> Self {
        Self {
            utility_rate,
            flow_rate,
            amount,
        }
    }

    pub fn flow(&self) -> Result<Fixed64, ConfigError> {
        if self.flow_rate <= 0.0 {
            return Err(ConfigError::ZeroRate {
                line: UtilityLine::Uv042,
            });
        }
        Ok(f64_to_fixed64(self.flow_rate))
    }

    pub fn amount(&self) -> Fixed64 {
        f64_to_fixed64(self.amount)
    }
}

/// Constants of the dissolver-to-filler production run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Batch the dissolver fills before it becomes a donor.
    pub batch: DoseConfig,
    /// Filler pre-dose before the first transfer.
    pub pre_dose: DoseConfig,
    /// Donor flush between transfers.
    pub flush: DoseConfig,
    /// Filler end dose up to a target level.
    pub end_dose: DoseConfig,
    pub flush_cycles: u32,
    /// Ticks between transfer cycles.
    pub pause: Ticks,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            batch: DoseConfig::new(10, 12.0, 2.0),
            pre_dose: DoseConfig::new(19, 12.0, 10.0),
            flush: DoseConfig::new(10, 12.0, 0.5),
            end_dose: DoseConfig::new(10, 12.0, 30.0),
            flush_cycles: 3,
            pause: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Plant
// ---------------------------------------------------------------------------

fn default_poll_interval() -> Ticks {
    1
}

fn default_state_dwell() -> Ticks {
    60
}

fn default_transfer_rate() -> f64 {
    10.0
}

fn default_event_capacity() -> usize {
    4096
}

/// Top-level plant configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Total units of the shared WFI capacity pool.
    pub utility_capacity: u32,
    /// Ticks between re-polls of a failed capacity request or condition.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Ticks,
    /// Ticks a legal hygiene transition consumes before it commits.
    #[serde(default = "default_state_dwell")]
    pub state_dwell: Ticks,
    /// m3/h of the unheated transfer line.
    #[serde(default = "default_transfer_rate")]
    pub transfer_rate: f64,
    #[serde(default)]
    pub sampling: DurationSampling,
    /// Ring-buffer size of the event log.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    pub vessel_types: BTreeMap<VesselKind, VesselTypeConfig>,
    #[serde(default)]
    pub production: ProductionConfig,
}

impl PlantConfig {
    /// The reference plant: one dissolver feeding fillers over a filter
    /// train, a 50 unit WFI loop and a two hour clean hold time.
    pub fn reference() -> Self {
        let hold = ms(120, 0);
        let mut vessel_types = BTreeMap::new();

        vessel_types.insert(
            VesselKind::Dissolver,
            VesselTypeConfig::new(6.0, hold)
                .with_line(UtilityLine::Uv043, 18, 12.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(48, 0), ms(58, 0), ms(118, 0)))
                .with_duration(RecipeKind::Sip, DurationBounds::new(ms(34, 0), ms(50, 0), ms(77, 0))),
        );
        vessel_types.insert(
            VesselKind::Filler,
            VesselTypeConfig::new(100.0, hold)
                .with_line(UtilityLine::Uv043, 30, 12.0)
                .with_line(UtilityLine::Uv363, 10, 10.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(64, 0), ms(73, 0), ms(80, 0)))
                .with_duration(RecipeKind::Sip, DurationBounds::new(ms(53, 0), ms(90, 0), ms(131, 0))),
        );
        vessel_types.insert(
            VesselKind::ParticleFilter,
            VesselTypeConfig::new(0.0, hold)
                .with_line(UtilityLine::Uv373, 10, 10.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(20, 0), ms(30, 0), ms(45, 0))),
        );
        vessel_types.insert(
            VesselKind::TransferLine,
            VesselTypeConfig::new(0.0, hold)
                .with_line(UtilityLine::Uv373, 10, 10.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(25, 0), ms(35, 0), ms(50, 0))),
        );
        vessel_types.insert(
            VesselKind::SterileFilter,
            VesselTypeConfig::new(0.0, hold)
                .with_line(UtilityLine::Uv373, 10, 10.0)
                .with_line(UtilityLine::Uv374, 2, 10.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(20, 0), ms(30, 0), ms(45, 0))),
        );
        vessel_types.insert(
            VesselKind::ValveNode,
            VesselTypeConfig::new(0.0, hold)
                .with_line(UtilityLine::Uv373, 10, 10.0)
                .with_duration(RecipeKind::Cip, DurationBounds::new(ms(10, 0), ms(15, 0), ms(25, 0))),
        );

        Self {
            utility_capacity: 50,
            poll_interval: default_poll_interval(),
            state_dwell: default_state_dwell(),
            transfer_rate: default_transfer_rate(),
            sampling: DurationSampling::Mean,
            event_capacity: default_event_capacity(),
            vessel_types,
            production: ProductionConfig::default(),
        }
    }

    /// Check plant-wide settings and every configured duration triple.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.transfer_rate <= 0.0 {
            return Err(ConfigError::ZeroTransferRate);
        }
        for ty in self.vessel_types.values() {
            for (recipe, bounds) in &ty.durations {
                bounds.validate(*recipe)?;
            }
        }
        Ok(())
    }

    pub fn vessel_type(&self, kind: VesselKind) -> Result<&VesselTypeConfig, ConfigError> {
        self.vessel_types
            .get(&kind)
            .ok_or(ConfigError::MissingVesselType(kind))
    }

    pub fn transfer_rate_fixed(&self) -> Fixed64 {
        f64_to_fixed64(self.transfer_rate)
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self::reference()
    }
}
