//! Hygiene state machine.
//!
//! Every vessel carries two independent tracks, one for cleaning (CIP) and
//! one for sanitisation (SIP), sharing one transition table. Illegal
//! transitions are not errors: [`HygieneTracks::can_transition`] reports
//! them and the caller skips the change without consuming time.

use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;

/// The hygiene state of one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HygieneState {
    #[default]
    Dirty,
    Cleaning,
    Cleaned,
    Sanitizing,
    Sanitized,
    Production,
}

impl HygieneState {
    pub const ALL: [HygieneState; 6] = [
        HygieneState::Dirty,
        HygieneState::Cleaning,
        HygieneState::Cleaned,
        HygieneState::Sanitizing,
        HygieneState::Sanitized,
        HygieneState::Production,
    ];

    /// Numeric code used when sampling (1 = dirty .. 6 = production).
    pub fn code(self) -> u8 {
        match self {
            HygieneState::Dirty => 1,
            HygieneState::Cleaning => 2,
            HygieneState::Cleaned => 3,
            HygieneState::Sanitizing => 4,
            HygieneState::Sanitized => 5,
            HygieneState::Production => 6,
        }
    }

    /// States reachable from `self` in one transition.
    pub fn successors(self) -> &'static [HygieneState] {
        use HygieneState::*;
        match self {
            Dirty => &[Cleaning, Sanitizing],
            Cleaning => &[Dirty, Cleaned],
            Cleaned => &[Dirty, Cleaning, Sanitizing],
            Sanitizing => &[Dirty, Sanitized],
            Sanitized => &[Dirty, Cleaning, Sanitizing, Production],
            Production => &[Dirty],
        }
    }

    /// Whether `self -> to` is a listed transition. Self-loops are not.
    pub fn can_transition(self, to: HygieneState) -> bool {
        self.successors().contains(&to)
    }

    /// States that count as a completed hygiene step and are subject to the
    /// clean-hold-time limit on the given track.
    fn is_held(self, track: Track) -> bool {
        matches!(
            (track, self),
            (Track::Cip, HygieneState::Cleaned) | (Track::Sip, HygieneState::Sanitized)
        )
    }
}

/// Which of the two hygiene tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Track {
    Cip,
    Sip,
}

impl Track {
    pub fn name(self) -> &'static str {
        match self {
            Track::Cip => "cip_state",
            Track::Sip => "sip_state",
        }
    }
}

/// The two tracks of one vessel and their last completion stamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HygieneTracks {
    pub cip_state: HygieneState,
    pub sip_state: HygieneState,
    /// Tick the last CIP completed (0 if never).
    pub last_cleaned: Ticks,
    /// Tick the last SIP completed (0 if never).
    pub last_sanitized: Ticks,
}

impl HygieneTracks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, track: Track) -> HygieneState {
        match track {
            Track::Cip => self.cip_state,
            Track::Sip => self.sip_state,
        }
    }

    pub fn can_transition(&self, track: Track, to: HygieneState) -> bool {
        self.state(track).can_transition(to)
    }

    /// Overwrite a track's state. Legality is the caller's responsibility.
    pub fn set(&mut self, track: Track, state: HygieneState) {
        match track {
            Track::Cip => self.cip_state = state,
            Track::Sip => self.sip_state = state,
        }
    }

    /// Record a completion on `track` at tick `now`.
    pub fn stamp(&mut self, track: Track, now: Ticks) {
        match track {
            Track::Cip => self.last_cleaned = now,
            Track::Sip => self.last_sanitized = now,
        }
    }

    pub fn last_completed(&self, track: Track) -> Ticks {
        match track {
            Track::Cip => self.last_cleaned,
            Track::Sip => self.last_sanitized,
        }
    }

    /// Tracks whose completed state has outlived `hold_time` at `now`.
    pub fn expired(&self, now: Ticks, hold_time: Ticks) -> impl Iterator<Item = Track> + '_ {
        [Track::Cip, Track::Sip].into_iter().filter(move |&track| {
            self.state(track).is_held(track)
                && now.saturating_sub(self.last_completed(track)) > hold_time
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use HygieneState::*;

    #[test]
    fn transition_table_matches_plant_rules() {
        assert!(Dirty.can_transition(Cleaning));
        assert!(Dirty.can_transition(Sanitizing));
        assert!(!Dirty.can_transition(Cleaned));
        assert!(!Dirty.can_transition(Production));

        assert!(Cleaning.can_transition(Cleaned));
        assert!(!Cleaning.can_transition(Sanitizing));

        assert!(Cleaned.can_transition(Sanitizing));
        assert!(Sanitizing.can_transition(Sanitized));
        assert!(Sanitized.can_transition(Production));
        assert!(Production.can_transition(Dirty));
        assert!(!Production.can_transition(Cleaning));
    }

    #[test]
    fn self_transitions_are_never_legal() {
        for state in HygieneState::ALL {
            assert!(!state.can_transition(state), "{state:?}");
        }
    }

    #[test]
    fn every_state_can_reach_dirty_except_dirty() {
        for state in HygieneState::ALL {
            if state != Dirty {
                assert!(state.can_transition(Dirty));
            }
        }
    }

    #[test]
    fn codes_are_one_based_and_distinct() {
        let codes: Vec<u8> = HygieneState::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn tracks_are_independent() {
        let mut tracks = HygieneTracks::new();
        tracks.set(Track::Cip, Cleaning);
        assert_eq!(tracks.state(Track::Cip), Cleaning);
        assert_eq!(tracks.state(Track::Sip), Dirty);
        assert!(tracks.can_transition(Track::Sip, Sanitizing));
        assert!(!tracks.can_transition(Track::Cip, Sanitizing));
    }

    #[test]
    fn hold_time_expiry_is_strict() {
        let mut tracks = HygieneTracks::new();
        tracks.set(Track::Cip, Cleaned);
        tracks.stamp(Track::Cip, 100);
        assert_eq!(tracks.expired(300, 200).count(), 0);
        assert_eq!(tracks.expired(301, 200).collect::<Vec<_>>(), vec![Track::Cip]);
    }

    #[test]
    fn hold_time_only_applies_to_completed_states() {
        let mut tracks = HygieneTracks::new();
        tracks.set(Track::Cip, Cleaning);
        tracks.set(Track::Sip, Production);
        assert_eq!(tracks.expired(10_000, 10).count(), 0);

        // A sanitized value on the cip track is not a held state.
        tracks.set(Track::Cip, Sanitized);
        assert_eq!(tracks.expired(10_000, 10).count(), 0);

        tracks.set(Track::Sip, Sanitized);
        assert_eq!(tracks.expired(10_000, 10).collect::<Vec<_>>(), vec![Track::Sip]);
    }
}
