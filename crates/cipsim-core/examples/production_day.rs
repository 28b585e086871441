//! Production day: one dissolver feeding one filler over the filter train.
//!
//! Cleans and sterilises both tanks, cleans the filter train, then prepares
//! a batch in the dissolver and pulls it into the filler. Prints the task
//! timeline and the WFI pool utilisation at the end.
//!
//! Run with: `RUST_LOG=debug cargo run -p cipsim-core --example production_day`

use cipsim_core::config::{DurationSampling, PlantConfig};
use cipsim_core::engine::Plant;
use cipsim_core::error::ConfigError;
use cipsim_core::fixed::{fixed64_to_f64, hms, Ticks};
use cipsim_core::hygiene::Track;
use cipsim_core::observer::Observer;
use cipsim_core::vessel::{LineSlot, VesselKind};
use tracing_subscriber::EnvFilter;

/// Prints the task intervals as they complete and keeps a running total of
/// reserved pool units.
#[derive(Default)]
struct Printer {
    reserved_sum: f64,
    ticks: u64,
}

impl Observer for Printer {
    fn begin_tick(&mut self, _tick: Ticks) {
        self.ticks += 1;
    }

    fn sample(&mut self, subject: &str, key: &str, value: f64) {
        if subject == "WFI" && key == "reserved" {
            self.reserved_sum += value;
        }
    }

    fn record_interval(&mut self, label: &str, resource: &str, start: Ticks, end: Ticks) {
        println!(
            "{label:>5} {resource:<3} {} -> {} ({} min)",
            clock(start),
            clock(end),
            (end - start) / 60
        );
    }
}

fn clock(t: Ticks) -> String {
    format!("{:02}:{:02}:{:02}", t / 3600, t / 60 % 60, t % 60)
}

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = PlantConfig::reference();
    config.sampling = DurationSampling::Normal { seed: 42 };
    let mut plant = Plant::new(config)?;

    // --- Topology ---

    let lb = plant.add_vessel("LB", VesselKind::Dissolver)?;
    let p = plant.add_vessel("P", VesselKind::ParticleFilter)?;
    let t = plant.add_vessel("T", VesselKind::TransferLine)?;
    let ab = plant.add_vessel_on_line("AB", VesselKind::Filler, LineSlot::Two)?;
    let k2 = plant.add_vessel_on_line("K2", VesselKind::SterileFilter, LineSlot::Two)?;
    let vk = plant.add_vessel("VK", VesselKind::ValveNode)?;

    // --- Launches ---

    for unit in [lb, ab, p, t, k2, vk] {
        plant.start_cip(unit)?;
    }
    plant.start_sip(lb)?;
    plant.start_sip(ab)?;
    plant.start_production(lb, None)?;
    let filling = plant.start_production(ab, Some(lb))?;

    // --- Run ---

    let mut printer = Printer::default();
    let horizon = hms(5, 0, 0);
    let idle = plant.run_until_idle(horizon, &mut printer);

    println!();
    println!("finished: {idle} at {}", clock(plant.now()));
    println!("filler done: {}", plant.is_finished(filling));
    for (_, vessel) in plant.vessels() {
        println!(
            "{:<3} cip={:?} sip={:?} volume={:.2} m3",
            vessel.name,
            vessel.state(Track::Cip),
            vessel.state(Track::Sip),
            fixed64_to_f64(vessel.volume())
        );
    }
    let pool = plant.pool();
    println!(
        "WFI busy {} ticks, peak {} of {}, mean reserved {:.1}, {} rejected polls",
        pool.busy_ticks(),
        pool.peak_reserved(),
        pool.total(),
        printer.reserved_sum / printer.ticks.max(1) as f64,
        pool.rejected()
    );
    Ok(())
}
