//! Serde data file structs for launch scenarios.
//!
//! The plant configuration itself is read straight into
//! [`cipsim_core::config::PlantConfig`]; these structs describe the
//! topology and the timed launches, referring to vessels by name.

use cipsim_core::config::RecipeKind;
use cipsim_core::fixed::Ticks;
use cipsim_core::vessel::{LineSlot, VesselKind};
use serde::{Deserialize, Serialize};

/// A scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    /// Tick at which the run stops.
    pub horizon: Ticks,
    pub vessels: Vec<VesselData>,
    #[serde(default)]
    pub launches: Vec<LaunchData>,
}

/// One unit of the plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselData {
    pub name: String,
    pub kind: VesselKind,
    #[serde(default)]
    pub slot: LineSlot,
}

/// A recipe launched at a fixed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchData {
    pub at: Ticks,
    pub recipe: RecipeKind,
    pub vessel: String,
    /// Donor dissolver of a filler production.
    #[serde(default)]
    pub donor: Option<String>,
}
