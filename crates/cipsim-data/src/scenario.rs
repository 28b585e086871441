//! Drives a plant through a loaded scenario.
//!
//! Vessel and donor names are resolved up front, so a scenario that refers to
//! an unknown unit fails before the first tick. A launch the plant rejects at
//! run time only loses that recipe; the run goes on.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use cipsim_core::config::{PlantConfig, RecipeKind};
use cipsim_core::engine::Plant;
use cipsim_core::error::ConfigError;
use cipsim_core::fixed::Ticks;
use cipsim_core::id::VesselId;
use cipsim_core::observer::Observer;
use cipsim_core::process::ProcessHandle;
use tracing::{info, warn};

use crate::loader::{check_duplicate, load_plant_data, resolve_name, DataLoadError};
use crate::schema::ScenarioData;

/// A launch with its names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Launch {
    at: Ticks,
    recipe: RecipeKind,
    vessel: VesselId,
    donor: Option<VesselId>,
}

/// Outcome of [`ScenarioRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Tick at which the run stopped.
    pub end: Ticks,
    pub launched: Vec<ProcessHandle>,
    /// Launches the plant refused, with the unit name.
    pub rejected: Vec<(String, ConfigError)>,
    /// Launches scheduled at or after the horizon.
    pub skipped: usize,
    /// Whether every launched recipe finished before the horizon.
    pub finished: bool,
}

/// A plant plus the launches still to come.
#[derive(Debug)]
pub struct ScenarioRunner {
    plant: Plant,
    horizon: Ticks,
    /// Sorted by tick; file order within a tick.
    pending: VecDeque<Launch>,
}

impl ScenarioRunner {
    /// Load `plant.*` and `scenario.*` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, DataLoadError> {
        let data = load_plant_data(dir)?;
        let (scenario, path) = data.scenario.ok_or_else(|| DataLoadError::MissingRequired {
            file: "scenario".to_string(),
            dir: dir.to_path_buf(),
        })?;
        Self::new(data.config, &scenario, &path)
    }

    /// Build the plant topology and resolve every launch. `file` is only used
    /// in error messages.
    pub fn new(config: PlantConfig, scenario: &ScenarioData, file: &Path) -> Result<Self, DataLoadError> {
        let mut plant = Plant::new(config)?;
        let mut names: HashMap<String, VesselId> = HashMap::new();
        for vessel in &scenario.vessels {
            check_duplicate(&names, &vessel.name, file)?;
            let id = plant.add_vessel_on_line(vessel.name.clone(), vessel.kind, vessel.slot)?;
            names.insert(vessel.name.clone(), id);
        }

        let mut launches = Vec::with_capacity(scenario.launches.len());
        for launch in &scenario.launches {
            let vessel = *resolve_name(&names, &launch.vessel, file, "vessel")?;
            let donor = match &launch.donor {
                Some(name) => Some(*resolve_name(&names, name, file, "donor vessel")?),
                None => None,
            };
            launches.push(Launch {
                at: launch.at,
                recipe: launch.recipe,
                vessel,
                donor,
            });
        }
        launches.sort_by_key(|l| l.at);

        Ok(Self {
            plant,
            horizon: scenario.horizon,
            pending: launches.into(),
        })
    }

    pub fn plant(&self) -> &Plant {
        &self.plant
    }

    pub fn plant_mut(&mut self) -> &mut Plant {
        &mut self.plant
    }

    pub fn horizon(&self) -> Ticks {
        self.horizon
    }

    fn launch(&mut self, launch: &Launch) -> Result<ProcessHandle, ConfigError> {
        match launch.recipe {
            RecipeKind::Cip => self.plant.start_cip(launch.vessel),
            RecipeKind::Sip => self.plant.start_sip(launch.vessel),
            RecipeKind::Production => self.plant.start_production(launch.vessel, launch.donor),
        }
    }

    /// Launch each recipe at its tick and run to the horizon, or until every
    /// launch is done and nothing is live.
    pub fn run(&mut self, observer: &mut dyn Observer) -> RunSummary {
        let mut launched = Vec::new();
        let mut rejected = Vec::new();

        while self.plant.now() < self.horizon {
            let now = self.plant.now();
            while self.pending.front().is_some_and(|l| l.at <= now) {
                let Some(launch) = self.pending.pop_front() else {
                    break;
                };
                match self.launch(&launch) {
                    Ok(handle) => launched.push(handle),
                    Err(err) => {
                        let name = self
                            .plant
                            .vessel(launch.vessel)
                            .map_or_else(String::new, |v| v.name.clone());
                        warn!(vessel = %name, recipe = ?launch.recipe, %err, tick = now, "launch rejected");
                        rejected.push((name, err));
                    }
                }
            }
            if self.pending.is_empty() && self.plant.live_processes() == 0 {
                break;
            }
            self.plant.tick(observer);
        }

        let summary = RunSummary {
            end: self.plant.now(),
            finished: launched.iter().all(|&h| self.plant.is_finished(h)),
            launched,
            rejected,
            skipped: self.pending.len(),
        };
        info!(
            end = summary.end,
            launched = summary.launched.len(),
            rejected = summary.rejected.len(),
            skipped = summary.skipped,
            finished = summary.finished,
            "scenario finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LaunchData, VesselData};
    use cipsim_core::hygiene::{HygieneState, Track};
    use cipsim_core::observer::NullObserver;
    use cipsim_core::vessel::{LineSlot, VesselKind};
    use std::path::PathBuf;

    fn vessel(name: &str, kind: VesselKind) -> VesselData {
        VesselData {
            name: name.into(),
            kind,
            slot: LineSlot::One,
        }
    }

    fn launch(at: Ticks, recipe: RecipeKind, vessel: &str) -> LaunchData {
        LaunchData {
            at,
            recipe,
            vessel: vessel.into(),
            donor: None,
        }
    }

    fn file() -> PathBuf {
        PathBuf::from("scenario.ron")
    }

    #[test]
    fn duplicate_vessel_names_are_rejected() {
        let scenario = ScenarioData {
            horizon: 100,
            vessels: vec![vessel("LB", VesselKind::Dissolver), vessel("LB", VesselKind::Filler)],
            launches: vec![],
        };
        let err = ScenarioRunner::new(PlantConfig::reference(), &scenario, &file()).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateName { ref name, .. } if name == "LB"));
    }

    #[test]
    fn unknown_donor_is_unresolved() {
        let mut production = launch(0, RecipeKind::Production, "AB");
        production.donor = Some("LB9".into());
        let scenario = ScenarioData {
            horizon: 100,
            vessels: vec![vessel("AB", VesselKind::Filler)],
            launches: vec![production],
        };
        let err = ScenarioRunner::new(PlantConfig::reference(), &scenario, &file()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { expected_kind: "donor vessel", ref name, .. } if name == "LB9"
        ));
    }

    #[test]
    fn launches_run_in_tick_order_and_rejections_do_not_stop_the_run() {
        // Ends before the dissolver's clean hold time runs out at 10_801.
        let scenario = ScenarioData {
            horizon: 10_000,
            vessels: vec![vessel("LB", VesselKind::Dissolver), vessel("P", VesselKind::ParticleFilter)],
            launches: vec![
                launch(4_000, RecipeKind::Sip, "LB"),
                launch(0, RecipeKind::Cip, "LB"),
                // Filters have no SIP durations.
                launch(10, RecipeKind::Sip, "P"),
                launch(50_000, RecipeKind::Cip, "P"),
            ],
        };
        let mut runner = ScenarioRunner::new(PlantConfig::reference(), &scenario, &file()).unwrap();
        let summary = runner.run(&mut NullObserver);

        assert_eq!(summary.launched.len(), 2);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].0, "P");
        assert_eq!(summary.skipped, 1);
        assert!(summary.finished);
        assert_eq!(summary.end, runner.horizon());

        let plant = runner.plant();
        let lb = plant.vessel_by_name("LB").unwrap();
        assert_eq!(plant.vessel(lb).unwrap().state(Track::Sip), HygieneState::Sanitized);
        let labels: Vec<&str> = plant.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["CIP", "SIP"]);
    }

    #[test]
    fn run_stops_early_once_everything_is_done() {
        let scenario = ScenarioData {
            horizon: 100_000,
            vessels: vec![vessel("LB", VesselKind::Dissolver)],
            launches: vec![launch(0, RecipeKind::Cip, "LB")],
        };
        let mut runner = ScenarioRunner::new(PlantConfig::reference(), &scenario, &file()).unwrap();
        let summary = runner.run(&mut NullObserver);
        assert!(summary.finished);
        assert_eq!(summary.end, 3_601);
    }
}
