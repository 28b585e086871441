//! Typed plant events with a pre-allocated ring buffer.
//!
//! Events are emitted while processes run and by the per-tick bookkeeping,
//! then delivered in one batch to passive listeners at the end of the tick.
//! The log keeps the most recent events in one chronological ring buffer so
//! tests can replay the order in which locks and states changed.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventLog::suppress`]. Suppressed
//! events are neither buffered nor delivered.

use crate::config::RecipeKind;
use crate::fixed::Ticks;
use crate::hygiene::{HygieneState, Track};
use crate::id::{LockId, ProcessId, VesselId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A plant event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Recipes --
    RecipeStarted {
        process: ProcessId,
        vessel: VesselId,
        recipe: RecipeKind,
        target: Option<Ticks>,
        tick: Ticks,
    },
    RecipeCompleted {
        process: ProcessId,
        vessel: VesselId,
        recipe: RecipeKind,
        target: Option<Ticks>,
        executed: Ticks,
        tick: Ticks,
    },

    // -- Hygiene --
    StateChanged {
        vessel: VesselId,
        track: Track,
        from: HygieneState,
        to: HygieneState,
        tick: Ticks,
    },
    /// A transition that was not in the table and therefore did nothing.
    TransitionSkipped {
        vessel: VesselId,
        track: Track,
        from: HygieneState,
        to: HygieneState,
        tick: Ticks,
    },
    HoldTimeExpired {
        vessel: VesselId,
        track: Track,
        tick: Ticks,
    },

    // -- Resources --
    CapacityGranted {
        process: ProcessId,
        amount: u32,
        tick: Ticks,
    },
    CapacityReleased {
        process: ProcessId,
        amount: u32,
        tick: Ticks,
    },
    LockGranted {
        lock: LockId,
        process: ProcessId,
        tick: Ticks,
    },
    LockReleased {
        lock: LockId,
        process: ProcessId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RecipeStarted,
    RecipeCompleted,
    StateChanged,
    TransitionSkipped,
    HoldTimeExpired,
    CapacityGranted,
    CapacityReleased,
    LockGranted,
    LockReleased,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 9;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RecipeStarted { .. } => EventKind::RecipeStarted,
            Event::RecipeCompleted { .. } => EventKind::RecipeCompleted,
            Event::StateChanged { .. } => EventKind::StateChanged,
            Event::TransitionSkipped { .. } => EventKind::TransitionSkipped,
            Event::HoldTimeExpired { .. } => EventKind::HoldTimeExpired,
            Event::CapacityGranted { .. } => EventKind::CapacityGranted,
            Event::CapacityReleased { .. } => EventKind::CapacityReleased,
            Event::LockGranted { .. } => EventKind::LockGranted,
            Event::LockReleased { .. } => EventKind::LockReleased,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::RecipeStarted { tick, .. }
            | Event::RecipeCompleted { tick, .. }
            | Event::StateChanged { tick, .. }
            | Event::TransitionSkipped { tick, .. }
            | Event::HoldTimeExpired { tick, .. }
            | Event::CapacityGranted { tick, .. }
            | Event::CapacityReleased { tick, .. }
            | Event::LockGranted { tick, .. }
            | Event::LockReleased { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer -- pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.events[(start + i) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Chronological event log with per-kind suppression and passive listeners.
pub struct EventLog {
    buffer: EventBuffer,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    /// Events emitted this tick, awaiting delivery.
    pending: Vec<Event>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("buffer", &self.buffer)
            .field("suppressed", &self.suppressed)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            pending: Vec::new(),
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event. No-op if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        if !self.listeners[idx].is_empty() {
            self.pending.push(event.clone());
        }
        self.buffer.push(event);
    }

    /// Register a passive listener for an event kind. Listeners are called in
    /// registration order when the tick's events are delivered.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Deliver the events emitted since the last delivery.
    pub fn deliver(&mut self) {
        for event in self.pending.drain(..) {
            for listener in &mut self.listeners[event.kind().index()] {
                listener(&event);
            }
        }
    }

    /// Iterate buffered events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.buffer.iter()
    }

    /// Buffered events of one kind, oldest first.
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.buffer.iter().filter(move |e| e.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn dropped_count(&self) -> u64 {
        self.buffer.dropped_count()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }
}
