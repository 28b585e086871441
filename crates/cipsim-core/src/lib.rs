//! CIP/SIP plant core -- a discrete-time simulation of the cleaning,
//! sterilisation and production cycles of a pharmaceutical process plant.
//!
//! Vessels move through a hygiene state machine while recipes compete for a
//! shared WFI capacity pool and for exclusive vessel and route locks.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Plant::tick`] advances plant time by one tick:
//!
//! 1. **Process** -- Ready recipe processes resume in registration order,
//!    repeating until none is ready (same-tick lock handoff).
//! 2. **Hygiene** -- The hold-time monitor forces stale clean states dirty.
//! 3. **Bookkeeping** -- Pool and lock occupancy counters.
//! 4. **Observe** -- Completed task intervals and per-variable samples go to
//!    the [`observer::Observer`].
//! 5. **Post-tick** -- Deliver buffered events and advance the clock.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut plant = Plant::new(PlantConfig::reference())?;
//! let lb = plant.add_vessel("LB", VesselKind::Dissolver)?;
//! plant.start_cip(lb)?;
//! plant.start_sip(lb)?;
//! plant.run_until(hms(5, 0, 0), &mut NullObserver);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Plant`] -- Owns vessels, pool and locks; drives processes.
//! - [`hygiene::HygieneState`] -- The six-state cleaning/sterilisation machine.
//! - [`recipe::RecipePlan`] -- A resolved op list with reconciled flexible
//!   buckets.
//! - [`process::RecipeRun`] -- A resumable recipe instance.
//! - [`pool::CapacityPool`] -- The shared utility pool (non-queuing).
//! - [`lock::LockTable`] -- FIFO vessel locks and route tokens.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point volumes and flow rates.
//! - [`event::EventLog`] -- Chronological event ring buffer.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixed;
pub mod hygiene;
pub mod id;
pub mod lock;
pub mod observer;
pub mod pool;
pub mod process;
pub mod recipe;
pub mod rng;
pub mod route;
pub mod sim;
pub mod vessel;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
