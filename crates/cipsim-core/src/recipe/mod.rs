//! Recipe plans: the ordered sub-steps a process executes.
//!
//! A plan is built and validated completely at launch, before the process is
//! registered. Everything a step needs from the configuration (pool rates,
//! flow times, lock sets) is resolved into the [`Op`] list here, so a
//! running process never consults the configuration again.

pub mod cip;
pub mod production;
pub mod reconcile;
pub mod sip;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::config::{RecipeKind, UtilityLine, VesselTypeConfig};
use crate::error::ConfigError;
use crate::fixed::{Fixed64, Ticks};
use crate::hygiene::{HygieneState, Track};
use crate::id::{LockId, VesselId};
use crate::vessel::Vessel;

pub use reconcile::Reconciliation;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// A predicate polled by [`Op::WaitFor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// A vessel track is in the given state.
    State {
        vessel: VesselId,
        track: Track,
        state: HygieneState,
    },
    /// Every inner condition holds.
    All(Vec<Condition>),
}

impl Condition {
    pub fn state(vessel: VesselId, track: Track, state: HygieneState) -> Self {
        Condition::State { vessel, track, state }
    }

    /// Evaluate against the plant's vessels. Unknown vessels never satisfy.
    pub fn holds(&self, vessels: &SlotMap<VesselId, Vessel>) -> bool {
        match self {
            Condition::State { vessel, track, state } => {
                vessels.get(*vessel).is_some_and(|v| v.state(*track) == *state)
            }
            Condition::All(inner) => inner.iter().all(|c| c.holds(vessels)),
        }
    }
}

/// How much a fill moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillAmount {
    /// A fixed volume in m3.
    Fixed(Fixed64),
    /// Whatever brings the vessel up to this level, computed when the step
    /// starts. Nothing happens if the vessel is already at or above it.
    TopUpTo(Fixed64),
}

/// Which completion a transition marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    /// Plain state change.
    None,
    /// Opens the recipe; the task interval starts here.
    Open,
    /// Closes the recipe and stamps the track's last completion time.
    Close,
}

/// One sub-step of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Log-only marker for a numbered cycle.
    Cycle(u8),
    /// Poll until the condition holds.
    WaitFor(Condition),
    /// Join a FIFO lock and wait for the grant.
    Lock(LockId),
    /// Release every held lock, newest first.
    UnlockAll,
    /// Hygiene transition. Illegal targets are skipped without consuming time.
    Transition {
        vessel: VesselId,
        track: Track,
        to: HygieneState,
        mark: Mark,
    },
    /// Fixed delay.
    Delay(Ticks),
    /// Flexible bucket; negative values are consumed as zero.
    Flexible(i64),
    /// Poll-reserve `rate` pool units, hold them for `ticks`, release.
    Utility {
        line: UtilityLine,
        rate: u32,
        ticks: Ticks,
    },
    /// Pool-gated, rate-limited fill of a vessel.
    Fill {
        vessel: VesselId,
        line: UtilityLine,
        rate: u32,
        flow: Fixed64,
        amount: FillAmount,
    },
    /// Move the donor's whole volume into the receiver over the transfer line.
    Transfer { donor: VesselId, receiver: VesselId },
    /// Emit the task record.
    Record,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A fully resolved recipe instance, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipePlan {
    pub kind: RecipeKind,
    /// Task label, e.g. `"CIP"`.
    pub label: String,
    /// The vessel the recipe is launched on.
    pub subject: VesselId,
    /// Resource name used for the task record.
    pub resource: String,
    pub ops: Vec<Op>,
    /// `None` for recipes without a sampled duration (production).
    pub reconciliation: Option<Reconciliation>,
}

impl RecipePlan {
    pub fn target(&self) -> Option<Ticks> {
        self.reconciliation.as_ref().map(|r| r.target)
    }

    pub fn fixed_total(&self) -> Ticks {
        self.reconciliation.as_ref().map_or(0, |r| r.fixed_total)
    }

    pub fn bucket_count(&self) -> usize {
        self.reconciliation.as_ref().map_or(0, |r| r.buckets.len())
    }

    /// Every lock the plan takes, in the order it takes them.
    pub fn locks(&self) -> impl Iterator<Item = LockId> + '_ {
        self.ops.iter().filter_map(|op| match op {
            Op::Lock(id) => Some(*id),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Planner input
// ---------------------------------------------------------------------------

/// A vessel together with its type configuration, as seen by a planner.
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    pub id: VesselId,
    pub vessel: &'a Vessel,
    pub config: &'a VesselTypeConfig,
}

impl<'a> Unit<'a> {
    pub fn new(id: VesselId, vessel: &'a Vessel, config: &'a VesselTypeConfig) -> Self {
        Self { id, vessel, config }
    }

    pub fn name(&self) -> &'a str {
        &self.vessel.name
    }

    pub fn utility_rate(&self, line: UtilityLine) -> Result<u32, ConfigError> {
        self.config.utility_rate(self.name(), line)
    }

    pub fn flow_rate(&self, line: UtilityLine) -> Result<Fixed64, ConfigError> {
        self.config.flow_rate(self.name(), line)
    }

    /// Reject an amount that could never fit the vessel.
    pub fn check_fits(&self, amount: Fixed64) -> Result<(), ConfigError> {
        if amount > self.vessel.capacity {
            return Err(ConfigError::Overfill {
                vessel: self.name().to_string(),
                amount,
                capacity: self.vessel.capacity,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates ops and their fixed cost, then reconciles the flexible
/// buckets against a target.
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    kind: RecipeKind,
    subject: VesselId,
    resource: String,
    ops: Vec<Op>,
    fixed_total: Ticks,
    /// `(op index, weight)` of each flexible bucket.
    flexible: Vec<(usize, u32)>,
}

impl RecipeBuilder {
    pub fn new(kind: RecipeKind, subject: VesselId, resource: impl Into<String>) -> Self {
        Self {
            kind,
            subject,
            resource: resource.into(),
            ops: Vec::new(),
            fixed_total: 0,
            flexible: Vec::new(),
        }
    }

    pub fn cycle(&mut self, n: u8) -> &mut Self {
        self.ops.push(Op::Cycle(n));
        self
    }

    pub fn wait_for(&mut self, condition: Condition) -> &mut Self {
        self.ops.push(Op::WaitFor(condition));
        self
    }

    pub fn lock(&mut self, lock: impl Into<LockId>) -> &mut Self {
        self.ops.push(Op::Lock(lock.into()));
        self
    }

    pub fn unlock_all(&mut self) -> &mut Self {
        self.ops.push(Op::UnlockAll);
        self
    }

    pub fn open(&mut self, vessel: VesselId, track: Track, to: HygieneState) -> &mut Self {
        self.transition_marked(vessel, track, to, Mark::Open)
    }

    pub fn close(&mut self, vessel: VesselId, track: Track, to: HygieneState) -> &mut Self {
        self.transition_marked(vessel, track, to, Mark::Close)
    }

    pub fn transition(&mut self, vessel: VesselId, track: Track, to: HygieneState) -> &mut Self {
        self.transition_marked(vessel, track, to, Mark::None)
    }

    fn transition_marked(&mut self, vessel: VesselId, track: Track, to: HygieneState, mark: Mark) -> &mut Self {
        self.ops.push(Op::Transition { vessel, track, to, mark });
        self
    }

    pub fn delay(&mut self, ticks: Ticks) -> &mut Self {
        self.fixed_total += ticks;
        self.ops.push(Op::Delay(ticks));
        self
    }

    /// A flexible bucket with the given weight. Its length is set by
    /// [`finish`](Self::finish).
    pub fn flexible(&mut self, weight: u32) -> &mut Self {
        self.flexible.push((self.ops.len(), weight));
        self.ops.push(Op::Flexible(0));
        self
    }

    pub fn utility(&mut self, line: UtilityLine, rate: u32, ticks: Ticks) -> &mut Self {
        self.fixed_total += ticks;
        self.ops.push(Op::Utility { line, rate, ticks });
        self
    }

    pub fn fill(
        &mut self,
        vessel: VesselId,
        line: UtilityLine,
        rate: u32,
        flow: Fixed64,
        amount: FillAmount,
    ) -> &mut Self {
        self.ops.push(Op::Fill {
            vessel,
            line,
            rate,
            flow,
            amount,
        });
        self
    }

    pub fn transfer(&mut self, donor: VesselId, receiver: VesselId) -> &mut Self {
        self.ops.push(Op::Transfer { donor, receiver });
        self
    }

    pub fn record(&mut self) -> &mut Self {
        self.ops.push(Op::Record);
        self
    }

    /// Sum of fixed step durations so far.
    pub fn fixed_total(&self) -> Ticks {
        self.fixed_total
    }

    pub fn weights(&self) -> Vec<u32> {
        self.flexible.iter().map(|&(_, w)| w).collect()
    }

    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    pub fn subject(&self) -> VesselId {
        self.subject
    }

    /// Reconcile against `target` (if any) and produce the plan. Without a
    /// target every flexible bucket stays at zero.
    pub fn finish(self, target: Option<Ticks>) -> RecipePlan {
        let RecipeBuilder {
            kind,
            subject,
            resource,
            mut ops,
            fixed_total,
            flexible,
        } = self;

        let reconciliation = target.map(|target| {
            let weights: Vec<u32> = flexible.iter().map(|&(_, w)| w).collect();
            let r = Reconciliation::new(target, fixed_total, &weights);
            for (&(index, _), &bucket) in flexible.iter().zip(&r.buckets) {
                ops[index] = Op::Flexible(bucket);
            }
            r
        });

        RecipePlan {
            kind,
            label: kind.label().to_string(),
            subject,
            resource,
            ops,
            reconciliation,
        }
    }
}
