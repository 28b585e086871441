//! Production plans.
//!
//! The dissolver prepares a batch and stays in production as the donor. A
//! filler then pulls the batch over the product route, flushes the donor a
//! few times, hands the donor back as dirty and doses itself up to level.

use crate::config::{ProductionConfig, RecipeKind, UtilityLine};
use crate::error::ConfigError;
use crate::hygiene::{HygieneState, Track};
use crate::route::product_route;
use crate::vessel::VesselKind;

use super::{Condition, FillAmount, RecipeBuilder, Unit};

/// Plan production on `unit`. Fillers need a dissolver donor; dissolvers
/// ignore `donor`.
pub fn plan(unit: Unit<'_>, donor: Option<Unit<'_>>, config: &ProductionConfig) -> Result<RecipeBuilder, ConfigError> {
    match unit.vessel.kind {
        VesselKind::Dissolver => dissolver(unit, config),
        VesselKind::Filler => {
            let donor = donor.ok_or_else(|| ConfigError::MissingDonor {
                vessel: unit.name().to_string(),
            })?;
            if donor.vessel.kind != VesselKind::Dissolver {
                return Err(ConfigError::WrongVesselKind {
                    vessel: donor.name().to_string(),
                    expected: VesselKind::Dissolver,
                    found: donor.vessel.kind,
                });
            }
            filler(unit, donor, config)
        }
        found => Err(ConfigError::WrongVesselKind {
            vessel: unit.name().to_string(),
            expected: VesselKind::Filler,
            found,
        }),
    }
}

fn dissolver(unit: Unit<'_>, config: &ProductionConfig) -> Result<RecipeBuilder, ConfigError> {
    let batch = &config.batch;
    let flow = batch.flow()?;
    unit.check_fits(batch.amount())?;

    let id = unit.id;
    let mut b = RecipeBuilder::new(RecipeKind::Production, id, unit.name());
    b.wait_for(Condition::state(id, Track::Sip, HygieneState::Sanitized))
        .lock(id)
        .open(id, Track::Sip, HygieneState::Production)
        .fill(id, UtilityLine::Uv042, batch.utility_rate, flow, FillAmount::Fixed(batch.amount()))
        .unlock_all()
        .record();
    Ok(b)
}

fn filler(unit: Unit<'_>, donor: Unit<'_>, config: &ProductionConfig) -> Result<RecipeBuilder, ConfigError> {
    let pre_flow = config.pre_dose.flow()?;
    let flush_flow = config.flush.flow()?;
    let end_flow = config.end_dose.flow()?;
    unit.check_fits(config.pre_dose.amount())?;
    unit.check_fits(config.end_dose.amount())?;
    donor.check_fits(config.flush.amount())?;

    let id = unit.id;
    let from = donor.id;
    let mut b = RecipeBuilder::new(RecipeKind::Production, id, unit.name());
    b.wait_for(Condition::All(vec![
        Condition::state(id, Track::Sip, HygieneState::Sanitized),
        Condition::state(from, Track::Sip, HygieneState::Production),
    ]))
    .lock(from)
    .lock(id);
    for segment in product_route(unit.vessel.slot) {
        b.lock(segment);
    }
    b.open(id, Track::Sip, HygieneState::Production);

    b.fill(
        id,
        UtilityLine::Uv042,
        config.pre_dose.utility_rate,
        pre_flow,
        FillAmount::Fixed(config.pre_dose.amount()),
    )
    .transfer(from, id)
    .delay(config.pause);

    for _ in 0..config.flush_cycles {
        b.fill(
            from,
            UtilityLine::Uv042,
            config.flush.utility_rate,
            flush_flow,
            FillAmount::Fixed(config.flush.amount()),
        )
        .transfer(from, id)
        .delay(config.pause);
    }

    b.transition(from, Track::Sip, HygieneState::Dirty)
        .transition(from, Track::Cip, HygieneState::Dirty)
        .fill(
            id,
            UtilityLine::Uv042,
            config.end_dose.utility_rate,
            end_flow,
            FillAmount::TopUpTo(config.end_dose.amount()),
        )
        .unlock_all()
        .record();
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DoseConfig, PlantConfig};
    use crate::fixed::f64_to_fixed64;
    use crate::id::{LockId, VesselId};
    use crate::recipe::Op;
    use crate::route::RouteSegment;
    use crate::vessel::{LineSlot, Vessel};
    use slotmap::SlotMap;

    struct Fixture {
        config: PlantConfig,
        vessels: SlotMap<VesselId, Vessel>,
        lb: VesselId,
        ab: VesselId,
        filter: VesselId,
    }

    fn fixture() -> Fixture {
        let config = PlantConfig::reference();
        let mut vessels: SlotMap<VesselId, Vessel> = SlotMap::with_key();
        let lb = vessels.insert(Vessel::new("LB", VesselKind::Dissolver, LineSlot::One, f64_to_fixed64(6.0), 7200));
        let ab = vessels.insert(Vessel::new("AB", VesselKind::Filler, LineSlot::Two, f64_to_fixed64(100.0), 7200));
        let filter = vessels.insert(Vessel::new("P", VesselKind::ParticleFilter, LineSlot::One, f64_to_fixed64(0.0), 7200));
        Fixture {
            config,
            vessels,
            lb,
            ab,
            filter,
        }
    }

    impl Fixture {
        fn unit(&self, id: VesselId) -> Unit<'_> {
            let v = &self.vessels[id];
            Unit::new(id, v, self.config.vessel_type(v.kind).unwrap())
        }
    }

    #[test]
    fn filler_locks_donor_then_self_then_route() {
        let f = fixture();
        let plan = plan(f.unit(f.ab), Some(f.unit(f.lb)), &f.config.production)
            .unwrap()
            .finish(None);
        let locks: Vec<LockId> = plan.locks().collect();
        assert_eq!(
            locks,
            vec![
                LockId::Vessel(f.lb),
                LockId::Vessel(f.ab),
                LockId::Route(RouteSegment::DissolverToParticleFilter),
                LockId::Route(RouteSegment::ParticleFilterToTransfer),
                LockId::Route(RouteSegment::TransferToFiller2),
            ]
        );
    }

    #[test]
    fn filler_runs_configured_flush_cycles() {
        let f = fixture();
        let plan = plan(f.unit(f.ab), Some(f.unit(f.lb)), &f.config.production)
            .unwrap()
            .finish(None);
        let transfers = plan.ops.iter().filter(|op| matches!(op, Op::Transfer { .. })).count();
        assert_eq!(transfers, 4);
        assert!(matches!(
            plan.ops.iter().rev().nth(2),
            Some(Op::Fill { amount: FillAmount::TopUpTo(_), .. })
        ));
    }

    #[test]
    fn filler_without_donor_is_rejected() {
        let f = fixture();
        let err = plan(f.unit(f.ab), None, &f.config.production).unwrap_err();
        assert_eq!(err, ConfigError::MissingDonor { vessel: "AB".into() });
    }

    #[test]
    fn donor_must_be_a_dissolver() {
        let f = fixture();
        let err = plan(f.unit(f.ab), Some(f.unit(f.filter)), &f.config.production).unwrap_err();
        assert!(matches!(err, ConfigError::WrongVesselKind { expected: VesselKind::Dissolver, .. }));
    }

    #[test]
    fn production_on_a_filter_is_rejected() {
        let f = fixture();
        let err = plan(f.unit(f.filter), None, &f.config.production).unwrap_err();
        assert!(matches!(err, ConfigError::WrongVesselKind { expected: VesselKind::Filler, .. }));
    }

    #[test]
    fn oversized_batch_is_a_config_error() {
        let f = fixture();
        let mut production = f.config.production.clone();
        production.batch = DoseConfig::new(10, 12.0, 8.0);
        let err = plan(f.unit(f.lb), None, &production).unwrap_err();
        assert!(matches!(err, ConfigError::Overfill { .. }));
    }
}
