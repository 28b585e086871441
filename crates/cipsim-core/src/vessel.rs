//! Vessels and the other hygienic units of the plant.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, Ticks};
use crate::hygiene::{HygieneState, HygieneTracks, Track};

/// What kind of unit a vessel is. Selects the recipe `start_cip` runs and
/// the per-type configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VesselKind {
    /// Dissolving tank (LB). Holds volume, donor in production.
    Dissolver,
    /// Filling tank (AB). Holds volume, receiver in production.
    Filler,
    ParticleFilter,
    TransferLine,
    SterileFilter,
    ValveNode,
}

impl VesselKind {
    /// Only tanks hold volume; the rest carry hygiene tracks only.
    pub fn holds_volume(self) -> bool {
        matches!(self, VesselKind::Dissolver | VesselKind::Filler)
    }

    pub fn name(self) -> &'static str {
        match self {
            VesselKind::Dissolver => "dissolver",
            VesselKind::Filler => "filler",
            VesselKind::ParticleFilter => "particle_filter",
            VesselKind::TransferLine => "transfer_line",
            VesselKind::SterileFilter => "sterile_filter",
            VesselKind::ValveNode => "valve_node",
        }
    }
}

/// Which of the two parallel filling lines a unit sits on. Picks the
/// line-specific route segments for fillers and sterile filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineSlot {
    #[default]
    One,
    Two,
}

/// A unit of the plant: volume plus two hygiene tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vessel {
    pub name: String,
    pub kind: VesselKind,
    pub slot: LineSlot,
    /// Volumetric capacity in m3. Zero for units that hold no volume.
    pub capacity: Fixed64,
    volume: Fixed64,
    pub hygiene: HygieneTracks,
    /// Longest a completed clean or sanitise stays valid.
    pub clean_hold_time: Ticks,
}

impl Vessel {
    pub fn new(
        name: impl Into<String>,
        kind: VesselKind,
        slot: LineSlot,
        capacity: Fixed64,
        clean_hold_time: Ticks,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            slot,
            capacity: capacity.max(Fixed64::ZERO),
            volume: Fixed64::ZERO,
            hygiene: HygieneTracks::new(),
            clean_hold_time,
        }
    }

    pub fn volume(&self) -> Fixed64 {
        self.volume
    }

    /// Room left before the vessel is full.
    pub fn headroom(&self) -> Fixed64 {
        self.capacity.saturating_sub(self.volume)
    }

    pub fn state(&self, track: Track) -> HygieneState {
        self.hygiene.state(track)
    }

    /// Add up to `amount`, clamped to the remaining capacity. Returns the
    /// amount actually added.
    pub fn deposit(&mut self, amount: Fixed64) -> Fixed64 {
        let added = amount.max(Fixed64::ZERO).min(self.headroom());
        self.volume += added;
        added
    }

    /// Remove up to `amount`, clamped to the current volume. Returns the
    /// amount actually removed.
    pub fn withdraw(&mut self, amount: Fixed64) -> Fixed64 {
        let removed = amount.max(Fixed64::ZERO).min(self.volume);
        self.volume -= removed;
        removed
    }

    /// Force every track whose completed state outlived the hold time back to
    /// dirty. Returns the tracks that were reset.
    pub fn check_hold_time(&mut self, now: Ticks) -> Vec<Track> {
        let expired: Vec<Track> = self.hygiene.expired(now, self.clean_hold_time).collect();
        for &track in &expired {
            self.hygiene.set(track, HygieneState::Dirty);
        }
        expired
    }

    pub fn is_volume_in_bounds(&self) -> bool {
        self.volume >= Fixed64::ZERO && self.volume <= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    fn tank(capacity: f64) -> Vessel {
        Vessel::new("LB", VesselKind::Dissolver, LineSlot::One, f64_to_fixed64(capacity), 7200)
    }

    #[test]
    fn new_vessel_is_empty_and_dirty() {
        let v = tank(6.0);
        assert_eq!(v.volume(), Fixed64::ZERO);
        assert_eq!(v.state(Track::Cip), HygieneState::Dirty);
        assert_eq!(v.state(Track::Sip), HygieneState::Dirty);
    }

    #[test]
    fn deposit_clamps_to_capacity() {
        let mut v = tank(6.0);
        assert_eq!(v.deposit(f64_to_fixed64(4.0)), f64_to_fixed64(4.0));
        assert_eq!(v.deposit(f64_to_fixed64(4.0)), f64_to_fixed64(2.0));
        assert_eq!(v.volume(), f64_to_fixed64(6.0));
        assert!(v.is_volume_in_bounds());
    }

    #[test]
    fn withdraw_clamps_to_zero() {
        let mut v = tank(6.0);
        v.deposit(f64_to_fixed64(1.5));
        assert_eq!(v.withdraw(f64_to_fixed64(2.0)), f64_to_fixed64(1.5));
        assert_eq!(v.volume(), Fixed64::ZERO);
    }

    #[test]
    fn zero_capacity_unit_never_holds_volume() {
        let mut v = Vessel::new("P", VesselKind::ParticleFilter, LineSlot::One, Fixed64::ZERO, 7200);
        assert_eq!(v.deposit(f64_to_fixed64(1.0)), Fixed64::ZERO);
        assert!(!v.kind.holds_volume());
    }

    #[test]
    fn hold_time_resets_completed_track() {
        let mut v = tank(6.0);
        v.hygiene.set(Track::Cip, HygieneState::Cleaned);
        v.hygiene.stamp(Track::Cip, 1000);
        assert!(v.check_hold_time(8200).is_empty());
        assert_eq!(v.check_hold_time(8201), vec![Track::Cip]);
        assert_eq!(v.state(Track::Cip), HygieneState::Dirty);
    }
}
