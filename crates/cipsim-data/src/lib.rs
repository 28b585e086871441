//! File-based plant configuration and launch scenarios.
//!
//! A data directory holds a `plant` file (the [`PlantConfig`]) and an
//! optional `scenario` file (topology plus timed launches), each in RON, TOML
//! or JSON. The format is detected from the extension.
//!
//! [`PlantConfig`]: cipsim_core::config::PlantConfig

pub mod loader;
pub mod scenario;
pub mod schema;

pub use loader::{load_plant_data, DataLoadError, PlantData};
pub use scenario::{RunSummary, ScenarioRunner};
