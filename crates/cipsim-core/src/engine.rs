//! The plant: owns every vessel, the capacity pool and the lock table, and
//! drives recipe processes through the tick pipeline.
//!
//! # Tick pipeline
//!
//! Each [`Plant::tick`] runs:
//! 1. **Process** -- every ready process resumes, in registration order, until
//!    it suspends. Passes repeat until no process is ready, so a process
//!    handed a lock during the tick resumes in the same tick.
//! 2. **Hygiene** -- the hold-time monitor forces expired tracks to dirty.
//! 3. **Bookkeeping** -- per-tick counters of the pool and locks.
//! 4. **Observe** -- completed task intervals, then one sample per
//!    registered variable.
//! 5. **Post-tick** -- deliver buffered events, advance the clock.
//!
//! Processes launched between ticks first run in the next executed tick.

use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::config::{DurationBounds, PlantConfig, RecipeKind};
use crate::error::ConfigError;
use crate::event::{Event, EventLog};
use crate::fixed::{f64_to_fixed64, fixed64_to_f64, Ticks};
use crate::hygiene::Track;
use crate::id::{LockId, ProcessId, VesselId};
use crate::lock::LockTable;
use crate::observer::{Observer, Source, TaskRecord, Variable};
use crate::pool::CapacityPool;
use crate::process::{ProcessHandle, RecipeRun, Wait};
use crate::recipe::reconcile::sample_target;
use crate::recipe::{cip, production, sip, RecipeBuilder, Unit};
use crate::rng::SimRng;
use crate::route::RouteSegment;
use crate::sim::{SimState, StateHash, TickReport};
use crate::vessel::{LineSlot, Vessel, VesselKind};

/// Name of the shared WFI capacity pool.
pub const POOL_NAME: &str = "WFI";

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Everything a process step may read or mutate.
#[derive(Debug)]
pub struct World {
    pub(crate) sim: SimState,
    pub(crate) config: PlantConfig,
    pub(crate) pool: CapacityPool,
    pub(crate) locks: LockTable,
    pub(crate) vessels: SlotMap<VesselId, Vessel>,
    pub(crate) events: EventLog,
    pub(crate) rng: SimRng,
    /// Every completed task, in completion order.
    pub(crate) records: Vec<TaskRecord>,
    /// Completed this tick, not yet passed to the observer.
    pub(crate) unreported: Vec<TaskRecord>,
}

#[derive(Debug)]
struct ProcessSlot {
    run: RecipeRun,
    wait: Wait,
}

impl ProcessSlot {
    fn is_ready(&self, now: Ticks, locks: &LockTable) -> bool {
        match self.wait {
            Wait::Until(at) => at <= now,
            Wait::Lock(lock) => locks.holder(lock) == Some(self.run.pid()),
            Wait::Done => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Plant
// ---------------------------------------------------------------------------

/// A simulated plant.
#[derive(Debug)]
pub struct Plant {
    world: World,
    /// Live processes, in registration order (ascending pid). Finished
    /// slots are dropped at the end of each process phase.
    processes: Vec<ProcessSlot>,
    variables: Vec<Variable>,
    next_process: u64,
}

impl Plant {
    /// Build an empty plant. The configuration is validated once here and is
    /// immutable afterwards.
    pub fn new(config: PlantConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut locks = LockTable::new();
        for segment in RouteSegment::ALL {
            locks.register(LockId::Route(segment));
        }
        let seed = match config.sampling {
            crate::config::DurationSampling::Normal { seed } => seed,
            crate::config::DurationSampling::Mean => 0,
        };

        let world = World {
            sim: SimState::new(),
            pool: CapacityPool::new(POOL_NAME, config.utility_capacity),
            locks,
            vessels: SlotMap::with_key(),
            events: EventLog::new(config.event_capacity),
            rng: SimRng::new(seed),
            records: Vec::new(),
            unreported: Vec::new(),
            config,
        };

        Ok(Self {
            world,
            processes: Vec::new(),
            variables: vec![
                Variable::new(POOL_NAME, "available", Source::PoolAvailable),
                Variable::new(POOL_NAME, "reserved", Source::PoolReserved),
            ],
            next_process: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    /// Add a unit on line one.
    pub fn add_vessel(&mut self, name: impl Into<String>, kind: VesselKind) -> Result<VesselId, ConfigError> {
        self.add_vessel_on_line(name, kind, LineSlot::One)
    }

    /// Add a unit. Capacity and hold time come from the kind's configuration.
    /// Its hygiene tracks (and volume, for tanks) are registered for sampling.
    pub fn add_vessel_on_line(
        &mut self,
        name: impl Into<String>,
        kind: VesselKind,
        slot: LineSlot,
    ) -> Result<VesselId, ConfigError> {
        let ty = self.world.config.vessel_type(kind)?;
        let vessel = Vessel::new(name, kind, slot, f64_to_fixed64(ty.capacity), ty.clean_hold_time);
        let name = vessel.name.clone();
        let holds_volume = kind.holds_volume() && ty.capacity > 0.0;

        let id = self.world.vessels.insert(vessel);
        self.world.locks.register(LockId::Vessel(id));

        self.variables.push(Variable::new(name.clone(), Track::Cip.name(), Source::CipState(id)));
        self.variables.push(Variable::new(name.clone(), Track::Sip.name(), Source::SipState(id)));
        if holds_volume {
            self.variables.push(Variable::new(name.clone(), "volume", Source::Volume(id)));
        }
        debug!(vessel = %name, ?kind, ?slot, "vessel added");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Launch
    // -----------------------------------------------------------------------

    fn unit(&self, id: VesselId) -> Result<Unit<'_>, ConfigError> {
        let vessel = self.world.vessels.get(id).ok_or(ConfigError::UnknownVessel(id))?;
        let config = self.world.config.vessel_type(vessel.kind)?;
        Ok(Unit::new(id, vessel, config))
    }

    /// Launch the CIP matching the unit's kind.
    pub fn start_cip(&mut self, vessel: VesselId) -> Result<ProcessHandle, ConfigError> {
        let unit = self.unit(vessel)?;
        let bounds = unit.config.duration(unit.vessel.kind, RecipeKind::Cip)?;
        let builder = cip::plan(unit)?;
        let target = self.sample(&bounds);
        Ok(self.launch(builder, Some(target)))
    }

    /// Launch a SIP. It waits for the unit's CIP to finish.
    pub fn start_sip(&mut self, vessel: VesselId) -> Result<ProcessHandle, ConfigError> {
        let unit = self.unit(vessel)?;
        let bounds = unit.config.duration(unit.vessel.kind, RecipeKind::Sip)?;
        let builder = sip::plan(unit);
        let target = self.sample(&bounds);
        Ok(self.launch(builder, Some(target)))
    }

    /// Launch production. A dissolver prepares a batch; a filler pulls the
    /// batch from `donor`.
    pub fn start_production(
        &mut self,
        vessel: VesselId,
        donor: Option<VesselId>,
    ) -> Result<ProcessHandle, ConfigError> {
        let unit = self.unit(vessel)?;
        let donor = donor.map(|d| self.unit(d)).transpose()?;
        let builder = production::plan(unit, donor, &self.world.config.production)?;
        Ok(self.launch(builder, None))
    }

    /// Launch a hand-built plan, reconciled against `target` if given.
    pub fn start_plan(&mut self, builder: RecipeBuilder, target: Option<Ticks>) -> Result<ProcessHandle, ConfigError> {
        let subject = builder.subject();
        if !self.world.vessels.contains_key(subject) {
            return Err(ConfigError::UnknownVessel(subject));
        }
        Ok(self.launch(builder, target))
    }

    fn sample(&mut self, bounds: &DurationBounds) -> Ticks {
        sample_target(bounds, self.world.config.sampling, &mut self.world.rng)
    }

    fn launch(&mut self, builder: RecipeBuilder, target: Option<Ticks>) -> ProcessHandle {
        let now = self.world.sim.tick;
        let plan = builder.finish(target);

        let pid = ProcessId(self.next_process);
        self.next_process += 1;

        info!(
            vessel = %plan.resource,
            recipe = %plan.label,
            planned = ?target,
            fixed = plan.fixed_total(),
            tick = now,
            "recipe launched"
        );
        self.world.events.emit(Event::RecipeStarted {
            process: pid,
            vessel: plan.subject,
            recipe: plan.kind,
            target,
            tick: now,
        });

        self.processes.push(ProcessSlot {
            run: RecipeRun::new(pid, plan, now),
            wait: Wait::Until(now),
        });
        ProcessHandle(pid)
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Execute one tick.
    pub fn tick(&mut self, observer: &mut dyn Observer) -> TickReport {
        let now = self.world.sim.tick;
        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };

        self.phase_process(now, &mut report);
        self.phase_hygiene(now, &mut report);
        self.world.pool.on_tick();
        self.world.locks.on_tick();
        self.phase_observe(now, observer);

        self.world.events.deliver();
        self.world.sim.advance();
        report
    }

    fn phase_process(&mut self, now: Ticks, report: &mut TickReport) {
        loop {
            let mut progressed = false;
            for slot in &mut self.processes {
                if !slot.is_ready(now, &self.world.locks) {
                    continue;
                }
                progressed = true;
                report.resumptions += 1;
                slot.wait = slot.run.resume(&mut self.world);
                if slot.wait == Wait::Done {
                    report.completed += 1;
                }
            }
            if !progressed {
                break;
            }
        }
        self.processes.retain(|slot| slot.wait != Wait::Done);
    }

    fn phase_hygiene(&mut self, now: Ticks, report: &mut TickReport) {
        let World { vessels, events, .. } = &mut self.world;
        for (id, vessel) in vessels.iter_mut() {
            for track in vessel.check_hold_time(now) {
                warn!(vessel = %vessel.name, track = track.name(), tick = now, "clean hold time exceeded, forced dirty");
                events.emit(Event::HoldTimeExpired { vessel: id, track, tick: now });
                report.hold_time_resets += 1;
            }
        }
    }

    fn phase_observe(&mut self, now: Ticks, observer: &mut dyn Observer) {
        observer.begin_tick(now);
        for record in self.world.unreported.drain(..) {
            observer.record_interval(&record.label, &record.resource, record.start, record.end);
        }
        for var in &self.variables {
            if let Some(value) = Self::read(&self.world, var.source) {
                observer.sample(&var.subject, var.key, value);
            }
        }
    }

    fn read(world: &World, source: Source) -> Option<f64> {
        match source {
            Source::CipState(id) => world.vessels.get(id).map(|v| f64::from(v.state(Track::Cip).code())),
            Source::SipState(id) => world.vessels.get(id).map(|v| f64::from(v.state(Track::Sip).code())),
            Source::Volume(id) => world.vessels.get(id).map(|v| fixed64_to_f64(v.volume())),
            Source::PoolAvailable => Some(f64::from(world.pool.available())),
            Source::PoolReserved => Some(f64::from(world.pool.reserved())),
        }
    }

    /// Run ticks until the clock reaches `horizon`.
    pub fn run_until(&mut self, horizon: Ticks, observer: &mut dyn Observer) {
        while self.world.sim.tick < horizon {
            self.tick(observer);
        }
    }

    /// Run until every process has finished or the clock reaches `horizon`.
    /// Returns whether everything finished.
    pub fn run_until_idle(&mut self, horizon: Ticks, observer: &mut dyn Observer) -> bool {
        while self.world.sim.tick < horizon {
            if self.live_processes() == 0 {
                return true;
            }
            self.tick(observer);
        }
        self.live_processes() == 0
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The next tick to execute.
    pub fn now(&self) -> Ticks {
        self.world.sim.tick
    }

    pub fn config(&self) -> &PlantConfig {
        &self.world.config
    }

    pub fn pool(&self) -> &CapacityPool {
        &self.world.pool
    }

    pub fn locks(&self) -> &LockTable {
        &self.world.locks
    }

    pub fn vessel(&self, id: VesselId) -> Option<&Vessel> {
        self.world.vessels.get(id)
    }

    pub fn vessel_by_name(&self, name: &str) -> Option<VesselId> {
        self.world
            .vessels
            .iter()
            .find_map(|(id, v)| (v.name == name).then_some(id))
    }

    pub fn vessels(&self) -> impl Iterator<Item = (VesselId, &Vessel)> {
        self.world.vessels.iter()
    }

    pub fn events(&self) -> &EventLog {
        &self.world.events
    }

    /// Mutable access for suppression and listener registration.
    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.world.events
    }

    /// Every completed task, in completion order.
    pub fn records(&self) -> &[TaskRecord] {
        &self.world.records
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    fn slot(&self, handle: ProcessHandle) -> Option<&ProcessSlot> {
        self.processes
            .binary_search_by_key(&handle.id(), |s| s.run.pid())
            .ok()
            .map(|i| &self.processes[i])
    }

    /// Whether `handle` was launched by this plant.
    fn launched(&self, handle: ProcessHandle) -> bool {
        handle.id().0 < self.next_process
    }

    pub fn is_finished(&self, handle: ProcessHandle) -> bool {
        self.launched(handle) && self.slot(handle).is_none_or(|s| s.wait == Wait::Done)
    }

    /// What the process is waiting for, if it was launched by this plant.
    pub fn wait_of(&self, handle: ProcessHandle) -> Option<Wait> {
        if !self.launched(handle) {
            return None;
        }
        Some(self.slot(handle).map_or(Wait::Done, |s| s.wait))
    }

    /// A live process. Finished processes are no longer kept.
    pub fn process(&self, handle: ProcessHandle) -> Option<&RecipeRun> {
        self.slot(handle).map(|s| &s.run)
    }

    pub fn live_processes(&self) -> usize {
        self.processes.len()
    }

    /// Deterministic fingerprint of the observable plant state.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.world.sim.tick);
        h.write_u32(self.world.pool.available());
        h.write_u32(self.world.pool.reserved());
        for (_, v) in self.world.vessels.iter() {
            h.write(&[v.state(Track::Cip).code(), v.state(Track::Sip).code()]);
            h.write_fixed64(v.volume());
            h.write_u64(v.hygiene.last_cleaned);
            h.write_u64(v.hygiene.last_sanitized);
        }
        for (_, lock) in self.world.locks.iter() {
            h.write_u64(lock.holder().map_or(u64::MAX, |p| p.0));
        }
        h.write_u64(self.world.rng.state());
        h.write_u64(self.world.records.len() as u64);
        h.finish()
    }
}
