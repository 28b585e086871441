//! Sanitise-in-place plan.

use crate::config::RecipeKind;
use crate::hygiene::{HygieneState, Track};

use super::{Condition, RecipeBuilder, Unit};

/// Heat-up, sterilisation hold, cool-down.
pub const SIP_WEIGHTS: [u32; 3] = [1, 4, 2];

/// SIP has no fixed steps: its three buckets always sum to the target.
/// It waits for a finished CIP before taking the vessel lock.
pub fn plan(unit: Unit<'_>) -> RecipeBuilder {
    let id = unit.id;
    let mut b = RecipeBuilder::new(RecipeKind::Sip, id, unit.name());
    b.wait_for(Condition::state(id, Track::Cip, HygieneState::Cleaned))
        .lock(id)
        .open(id, Track::Sip, HygieneState::Sanitizing);
    for weight in SIP_WEIGHTS {
        b.flexible(weight);
    }
    b.close(id, Track::Sip, HygieneState::Sanitized).unlock_all().record();
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;
    use crate::fixed::f64_to_fixed64;
    use crate::id::VesselId;
    use crate::recipe::Op;
    use crate::vessel::{LineSlot, Vessel, VesselKind};
    use slotmap::SlotMap;

    #[test]
    fn sip_buckets_sum_to_target() {
        let config = PlantConfig::reference();
        let ty = config.vessel_type(VesselKind::Filler).unwrap();
        let mut vessels: SlotMap<VesselId, Vessel> = SlotMap::with_key();
        let id = vessels.insert(Vessel::new("AB", VesselKind::Filler, LineSlot::One, f64_to_fixed64(100.0), 7200));

        let b = plan(Unit::new(id, &vessels[id], ty));
        assert_eq!(b.fixed_total(), 0);
        let plan = b.finish(Some(5400));

        let buckets: Vec<i64> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Flexible(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(buckets, vec![771, 3086, 1543]);
        assert_eq!(buckets.iter().sum::<i64>(), 5400);
        assert!(matches!(plan.ops[0], Op::WaitFor(_)));
    }
}
