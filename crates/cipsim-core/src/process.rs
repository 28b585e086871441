//! Resumable recipe processes.
//!
//! A [`RecipeRun`] walks its plan's op list. Each op either completes inline
//! (zero time) or suspends the process with a [`Wait`] telling the scheduler
//! when to resume it. The phase records which half of a two-part op is
//! pending, so a resumed process picks up exactly where it stopped.

use tracing::{debug, error, info, trace, warn};

use crate::engine::World;
use crate::event::Event;
use crate::fixed::{fixed64_to_f64, flow_ticks, Fixed64, Ticks};
use crate::hygiene::{HygieneState, Track};
use crate::id::{LockId, ProcessId, VesselId};
use crate::lock::LockRequest;
use crate::observer::TaskRecord;
use crate::pool::Reservation;
use crate::recipe::{Condition, FillAmount, Mark, Op, RecipePlan};

/// Handle to a launched process. The driver never awaits it; it can only
/// ask the plant whether the process has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessHandle(pub(crate) ProcessId);

impl ProcessHandle {
    pub fn id(&self) -> ProcessId {
        self.0
    }
}

/// Why a process is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Resume at the given tick.
    Until(Ticks),
    /// Resume once the process holds this lock.
    Lock(LockId),
    /// Finished; never resumes.
    Done,
}

/// Volume in flight, one portion per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Fill { vessel: VesselId },
    Transfer { donor: VesselId, receiver: VesselId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flowing {
    movement: Movement,
    /// Portions still to move.
    remaining: Ticks,
    step: Fixed64,
    /// Volume still to move. The last portion takes all of it.
    left: Fixed64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// About to start the op at `pc`.
    Ready,
    /// Queued on a lock; resumed once granted.
    Queued(LockId),
    /// Fixed or flexible delay running.
    Delaying,
    /// Legal transition waiting out the dwell before it commits.
    Dwelling {
        vessel: VesselId,
        track: Track,
        to: HygieneState,
        mark: Mark,
    },
    /// Utility reservation held until the step ends.
    Holding,
    Flowing(Flowing),
}

enum Flow {
    Next,
    Suspend(Wait),
}

/// One running recipe instance.
#[derive(Debug)]
pub struct RecipeRun {
    pid: ProcessId,
    plan: RecipePlan,
    pc: usize,
    phase: Phase,
    /// Locks held, in acquisition order.
    held: Vec<LockId>,
    reservation: Option<Reservation>,
    launched_at: Ticks,
    opened_at: Option<Ticks>,
    /// Delay actually executed so far: fixed steps, clamped buckets, holds
    /// and volume movement. Waits and dwells are not counted.
    executed: Ticks,
}

impl RecipeRun {
    pub fn new(pid: ProcessId, plan: RecipePlan, launched_at: Ticks) -> Self {
        Self {
            pid,
            plan,
            pc: 0,
            phase: Phase::Ready,
            held: Vec::new(),
            reservation: None,
            launched_at,
            opened_at: None,
            executed: 0,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn plan(&self) -> &RecipePlan {
        &self.plan
    }

    pub fn executed(&self) -> Ticks {
        self.executed
    }

    pub fn held_locks(&self) -> &[LockId] {
        &self.held
    }

    pub fn is_finished(&self) -> bool {
        self.pc >= self.plan.ops.len()
    }

    /// Run until the next suspension point. Running off the end of the plan
    /// releases any capacity and locks the run still holds.
    pub fn resume(&mut self, world: &mut World) -> Wait {
        loop {
            let flow = match std::mem::replace(&mut self.phase, Phase::Ready) {
                Phase::Ready => match self.plan.ops.get(self.pc).cloned() {
                    Some(op) => self.start(op, world),
                    None => {
                        self.release_capacity(world);
                        self.release_locks(world);
                        return Wait::Done;
                    }
                },
                Phase::Queued(lock) => {
                    self.held.push(lock);
                    trace!(vessel = %self.plan.resource, ?lock, tick = world.sim.tick, "lock handed over");
                    Flow::Next
                }
                Phase::Delaying => Flow::Next,
                Phase::Dwelling { vessel, track, to, mark } => {
                    self.commit(world, vessel, track, to, mark);
                    Flow::Next
                }
                Phase::Holding => {
                    self.release_capacity(world);
                    Flow::Next
                }
                Phase::Flowing(flowing) => self.advance_flow(world, flowing),
            };
            match flow {
                Flow::Next => self.pc += 1,
                Flow::Suspend(wait) => return wait,
            }
        }
    }

    fn start(&mut self, op: Op, world: &mut World) -> Flow {
        let now = world.sim.tick;
        match op {
            Op::Cycle(n) => {
                debug!(vessel = %self.plan.resource, recipe = %self.plan.label, cycle = n, tick = now, "cycle");
                Flow::Next
            }
            Op::WaitFor(condition) => self.wait_for(world, &condition),
            Op::Lock(lock) => self.lock(world, lock),
            Op::UnlockAll => {
                self.release_locks(world);
                Flow::Next
            }
            Op::Transition { vessel, track, to, mark } => self.transition(world, vessel, track, to, mark),
            Op::Delay(ticks) => self.delay(now, ticks),
            Op::Flexible(bucket) => self.delay(now, bucket.max(0) as Ticks),
            Op::Utility { line, rate, ticks } => {
                let Some(reservation) = world.pool.try_reserve(rate) else {
                    return Flow::Suspend(Wait::Until(now + world.config.poll_interval));
                };
                trace!(vessel = %self.plan.resource, line = line.tag(), rate, ticks, tick = now, "utility granted");
                self.hold(world, reservation);
                self.executed += ticks;
                if ticks == 0 {
                    self.release_capacity(world);
                    Flow::Next
                } else {
                    self.phase = Phase::Holding;
                    Flow::Suspend(Wait::Until(now + ticks))
                }
            }
            Op::Fill {
                vessel,
                line,
                rate,
                flow,
                amount,
            } => {
                let Some(current) = world.vessels.get(vessel).map(|v| v.volume()) else {
                    return Flow::Next;
                };
                let amount = match amount {
                    FillAmount::Fixed(amount) => amount,
                    FillAmount::TopUpTo(target) => target.saturating_sub(current),
                };
                if amount <= Fixed64::ZERO {
                    debug!(vessel = %self.plan.resource, tick = now, "nothing to fill");
                    return Flow::Next;
                }
                let ticks = flow_ticks(amount, flow).unwrap_or(0);
                if ticks == 0 {
                    warn!(vessel = %self.plan.resource, amount = fixed64_to_f64(amount), tick = now, "fill shorter than one tick, nothing moved");
                    return Flow::Next;
                }
                let Some(reservation) = world.pool.try_reserve(rate) else {
                    return Flow::Suspend(Wait::Until(now + world.config.poll_interval));
                };
                debug!(vessel = %self.plan.resource, line = line.tag(), amount = fixed64_to_f64(amount), ticks, tick = now, "fill");
                self.hold(world, reservation);
                self.executed += ticks;
                self.advance_flow(
                    world,
                    Flowing {
                        movement: Movement::Fill { vessel },
                        remaining: ticks,
                        step: amount / Fixed64::saturating_from_num(ticks),
                        left: amount,
                    },
                )
            }
            Op::Transfer { donor, receiver } => {
                let volume = world.vessels.get(donor).map_or(Fixed64::ZERO, |v| v.volume());
                let ticks = flow_ticks(volume, world.config.transfer_rate_fixed()).unwrap_or(0);
                if ticks == 0 {
                    warn!(vessel = %self.plan.resource, volume = fixed64_to_f64(volume), tick = now, "transfer shorter than one tick, nothing moved");
                    return Flow::Next;
                }
                debug!(vessel = %self.plan.resource, volume = fixed64_to_f64(volume), ticks, tick = now, "transfer");
                self.executed += ticks;
                self.advance_flow(
                    world,
                    Flowing {
                        movement: Movement::Transfer { donor, receiver },
                        remaining: ticks,
                        step: volume / Fixed64::saturating_from_num(ticks),
                        left: volume,
                    },
                )
            }
            Op::Record => {
                self.record(world);
                Flow::Next
            }
        }
    }

    fn wait_for(&mut self, world: &World, condition: &Condition) -> Flow {
        if condition.holds(&world.vessels) {
            Flow::Next
        } else {
            Flow::Suspend(Wait::Until(world.sim.tick + world.config.poll_interval))
        }
    }

    fn lock(&mut self, world: &mut World, lock: LockId) -> Flow {
        let now = world.sim.tick;
        match world.locks.request(lock, self.pid) {
            LockRequest::Granted => {
                if !self.held.contains(&lock) {
                    self.held.push(lock);
                    world.events.emit(Event::LockGranted {
                        lock,
                        process: self.pid,
                        tick: now,
                    });
                }
                Flow::Next
            }
            LockRequest::Queued { position } => {
                trace!(vessel = %self.plan.resource, ?lock, position, tick = now, "queued for lock");
                self.phase = Phase::Queued(lock);
                Flow::Suspend(Wait::Lock(lock))
            }
        }
    }

    fn release_locks(&mut self, world: &mut World) {
        let now = world.sim.tick;
        for lock in self.held.drain(..).rev() {
            match world.locks.release(lock, self.pid) {
                Ok(next) => {
                    world.events.emit(Event::LockReleased {
                        lock,
                        process: self.pid,
                        tick: now,
                    });
                    if let Some(next) = next {
                        world.events.emit(Event::LockGranted {
                            lock,
                            process: next,
                            tick: now,
                        });
                    }
                }
                Err(err) => error!(%err, "lock release failed"),
            }
        }
    }

    fn transition(&mut self, world: &mut World, vessel: VesselId, track: Track, to: HygieneState, mark: Mark) -> Flow {
        let now = world.sim.tick;
        if mark == Mark::Open && self.opened_at.is_none() {
            self.opened_at = Some(now);
        }
        let Some(from) = world.vessels.get(vessel).map(|v| v.state(track)) else {
            return Flow::Next;
        };
        if !from.can_transition(to) {
            trace!(vessel = %self.plan.resource, track = track.name(), ?from, ?to, tick = now, "transition not allowed, skipped");
            world.events.emit(Event::TransitionSkipped {
                vessel,
                track,
                from,
                to,
                tick: now,
            });
            return Flow::Next;
        }
        let dwell = world.config.state_dwell;
        if dwell == 0 {
            self.commit(world, vessel, track, to, mark);
            Flow::Next
        } else {
            self.phase = Phase::Dwelling { vessel, track, to, mark };
            Flow::Suspend(Wait::Until(now + dwell))
        }
    }

    fn commit(&mut self, world: &mut World, vessel: VesselId, track: Track, to: HygieneState, mark: Mark) {
        let now = world.sim.tick;
        let Some(v) = world.vessels.get_mut(vessel) else {
            return;
        };
        let from = v.state(track);
        // A hold-time reset during the dwell can make the change illegal.
        if !from.can_transition(to) {
            debug!(vessel = %v.name, track = track.name(), ?from, ?to, tick = now, "state moved during dwell, skipped");
            world.events.emit(Event::TransitionSkipped {
                vessel,
                track,
                from,
                to,
                tick: now,
            });
            return;
        }
        v.hygiene.set(track, to);
        if mark == Mark::Close {
            v.hygiene.stamp(track, now);
        }
        debug!(vessel = %v.name, track = track.name(), ?from, ?to, tick = now, "state changed");
        world.events.emit(Event::StateChanged {
            vessel,
            track,
            from,
            to,
            tick: now,
        });
    }

    fn delay(&mut self, now: Ticks, ticks: Ticks) -> Flow {
        self.executed += ticks;
        if ticks == 0 {
            Flow::Next
        } else {
            self.phase = Phase::Delaying;
            Flow::Suspend(Wait::Until(now + ticks))
        }
    }

    fn hold(&mut self, world: &mut World, reservation: Reservation) {
        world.events.emit(Event::CapacityGranted {
            process: self.pid,
            amount: reservation.amount(),
            tick: world.sim.tick,
        });
        if let Some(stale) = self.reservation.replace(reservation) {
            world.pool.release_reservation(stale);
        }
    }

    fn release_capacity(&mut self, world: &mut World) {
        if let Some(reservation) = self.reservation.take() {
            let amount = reservation.amount();
            world.pool.release_reservation(reservation);
            world.events.emit(Event::CapacityReleased {
                process: self.pid,
                amount,
                tick: world.sim.tick,
            });
        }
    }

    /// Move one portion, or finish the movement once all portions are done.
    fn advance_flow(&mut self, world: &mut World, mut flowing: Flowing) -> Flow {
        let now = world.sim.tick;
        if flowing.remaining == 0 {
            if matches!(flowing.movement, Movement::Fill { .. }) {
                self.release_capacity(world);
            }
            return Flow::Next;
        }

        let portion = if flowing.remaining == 1 { flowing.left } else { flowing.step };
        let moved = match flowing.movement {
            Movement::Fill { vessel } => world
                .vessels
                .get_mut(vessel)
                .map_or(Fixed64::ZERO, |v| v.deposit(portion)),
            Movement::Transfer { donor, receiver } => {
                let room = world.vessels.get(receiver).map_or(Fixed64::ZERO, |v| v.headroom());
                let taken = world
                    .vessels
                    .get_mut(donor)
                    .map_or(Fixed64::ZERO, |v| v.withdraw(portion.min(room)));
                world
                    .vessels
                    .get_mut(receiver)
                    .map_or(Fixed64::ZERO, |v| v.deposit(taken))
            }
        };
        if moved < portion {
            warn!(
                vessel = %self.plan.resource,
                wanted = fixed64_to_f64(portion),
                moved = fixed64_to_f64(moved),
                tick = now,
                "volume clamped"
            );
        }

        flowing.left = flowing.left.saturating_sub(portion);
        flowing.remaining -= 1;
        self.phase = Phase::Flowing(flowing);
        Flow::Suspend(Wait::Until(now + 1))
    }

    fn record(&mut self, world: &mut World) {
        let now = world.sim.tick;
        let record = TaskRecord {
            label: self.plan.label.clone(),
            resource: self.plan.resource.clone(),
            start: self.opened_at.unwrap_or(self.launched_at),
            end: now,
        };
        info!(
            vessel = %record.resource,
            recipe = %record.label,
            planned = ?self.plan.target(),
            executed = self.executed,
            elapsed = now - self.launched_at,
            tick = now,
            "recipe finished"
        );
        world.events.emit(Event::RecipeCompleted {
            process: self.pid,
            vessel: self.plan.subject,
            recipe: self.plan.kind,
            target: self.plan.target(),
            executed: self.executed,
            tick: now,
        });
        world.records.push(record.clone());
        world.unreported.push(record);
    }
}
