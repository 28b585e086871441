use crate::config::{RecipeKind, UtilityLine};
use crate::fixed::{Fixed64, Ticks};
use crate::id::VesselId;
use crate::vessel::VesselKind;

/// Configuration problems detected when a plant is built or a recipe is
/// launched. A launch that fails with one of these registers no process and
/// consumes no time; the rest of the plant is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{vessel}: no utility rate configured for line {line:?}")]
    MissingUtilityRate { vessel: String, line: UtilityLine },

    #[error("{vessel}: no flow rate configured for line {line:?}")]
    MissingFlowRate { vessel: String, line: UtilityLine },

    #[error("no {recipe:?} duration configured for {kind:?}")]
    MissingDuration { kind: VesselKind, recipe: RecipeKind },

    #[error("{recipe:?} duration bounds must satisfy lower <= mean <= upper, got ({lower}, {mean}, {upper})")]
    InvalidDurationBounds {
        recipe: RecipeKind,
        lower: Ticks,
        mean: Ticks,
        upper: Ticks,
    },

    #[error("{vessel}: {amount} m3 does not fit capacity {capacity} m3")]
    Overfill {
        vessel: String,
        amount: Fixed64,
        capacity: Fixed64,
    },

    #[error("unknown vessel {0:?}")]
    UnknownVessel(VesselId),

    #[error("{vessel}: expected a {expected:?}, found {found:?}")]
    WrongVesselKind {
        vessel: String,
        expected: VesselKind,
        found: VesselKind,
    },

    #[error("{vessel}: filler production needs a donor vessel")]
    MissingDonor { vessel: String },

    #[error("line {line:?} has a non-positive flow rate")]
    ZeroRate { line: UtilityLine },

    #[error("transfer line rate must be positive")]
    ZeroTransferRate,

    #[error("no configuration block for vessel kind {0:?}")]
    MissingVesselType(VesselKind),

    #[error("poll interval must be at least one tick")]
    ZeroPollInterval,
}
