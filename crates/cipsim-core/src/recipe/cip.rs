//! Cleaning-in-place plans.
//!
//! Tanks run the five-cycle CIP with rinses through their inlets. Filters and
//! the transfer line run a short flush over their cleaning route, and the
//! valve node flushes with both sterile-filter segments held.

use crate::config::{RecipeKind, UtilityLine};
use crate::error::ConfigError;
use crate::fixed::{flow_ticks_litres, Ticks};
use crate::hygiene::{HygieneState, Track};
use crate::route::cleaning_route;
use crate::vessel::VesselKind;

use super::{RecipeBuilder, Unit};

/// Flexible bucket weights of the tank CIP: short pressure test, drain, long
/// pressure test, final drain, pressure build-up, blow-empty.
pub const TANK_CIP_WEIGHTS: [u32; 6] = [1, 10, 3, 20, 15, 10];

const INIT_DRAIN: Ticks = 30;
const INIT_AFTER_RUN: Ticks = 190;
const RINSE_RESET: Ticks = 33;
const DRAIN_DELAY: Ticks = 60;
const DRAIN_AFTER_RUN: Ticks = 180;
const FILL: Ticks = 300;
const FILL_RESET: Ticks = 35;
const AGITATOR: Ticks = 300;

/// Container inlet, hand addition, raw material inlet, media inlet, spray balls.
const DISSOLVER_RINSES: [u32; 5] = [60, 40, 60, 80, 300];
/// Media inlet, down pipe, spray balls.
const FILLER_RINSES: [u32; 3] = [80, 300, 300];
/// The filler's trans-in rinse runs for a fixed time through the transfer line.
const TRANS_IN: Ticks = 300;

const FILTER_FLUSH_LITRES: u32 = 100;
const FILTER_COOLING_LITRES: u32 = 50;

/// One capacity-gated rinse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rinse {
    line: UtilityLine,
    rate: u32,
    ticks: Ticks,
}

fn volume_rinse(unit: &Unit<'_>, line: UtilityLine, litres: u32) -> Result<Rinse, ConfigError> {
    let rate = unit.utility_rate(line)?;
    let flow = unit.flow_rate(line)?;
    let ticks = flow_ticks_litres(litres, flow).ok_or(ConfigError::ZeroRate { line })?;
    Ok(Rinse { line, rate, ticks })
}

fn rinse_sequence(unit: &Unit<'_>) -> Result<Vec<Rinse>, ConfigError> {
    match unit.vessel.kind {
        VesselKind::Filler => {
            let mut rinses = vec![Rinse {
                line: UtilityLine::Uv363,
                rate: unit.utility_rate(UtilityLine::Uv363)?,
                ticks: TRANS_IN,
            }];
            for litres in FILLER_RINSES {
                rinses.push(volume_rinse(unit, UtilityLine::Uv043, litres)?);
            }
            Ok(rinses)
        }
        _ => DISSOLVER_RINSES
            .iter()
            .map(|&litres| volume_rinse(unit, UtilityLine::Uv043, litres))
            .collect(),
    }
}

fn push_rinses(b: &mut RecipeBuilder, rinses: &[Rinse]) {
    for rinse in rinses {
        b.utility(rinse.line, rinse.rate, rinse.ticks).delay(RINSE_RESET);
    }
}

fn lock_unit_and_route(b: &mut RecipeBuilder, unit: &Unit<'_>) {
    b.lock(unit.id);
    for segment in cleaning_route(unit.vessel.kind, unit.vessel.slot) {
        b.lock(segment);
    }
}

/// Plan the CIP that fits the unit's kind. Buckets are reconciled later.
pub fn plan(unit: Unit<'_>) -> Result<RecipeBuilder, ConfigError> {
    match unit.vessel.kind {
        VesselKind::Dissolver | VesselKind::Filler => tank(unit),
        VesselKind::ParticleFilter | VesselKind::TransferLine | VesselKind::SterileFilter => filter(unit),
        VesselKind::ValveNode => node(unit),
    }
}

fn tank(unit: Unit<'_>) -> Result<RecipeBuilder, ConfigError> {
    let rinses = rinse_sequence(&unit)?;
    let id = unit.id;
    let mut b = RecipeBuilder::new(RecipeKind::Cip, id, unit.name());
    let [w_short, w_drain, w_long, w_final, w_build, w_blow] = TANK_CIP_WEIGHTS;

    lock_unit_and_route(&mut b, &unit);
    b.open(id, Track::Cip, HygieneState::Cleaning);

    b.cycle(0).delay(INIT_DRAIN).delay(INIT_AFTER_RUN).flexible(w_short);

    b.cycle(1);
    push_rinses(&mut b, &rinses);

    b.cycle(2)
        .flexible(w_drain)
        .delay(DRAIN_DELAY)
        .delay(DRAIN_AFTER_RUN)
        .flexible(w_long);

    b.cycle(3);
    push_rinses(&mut b, &rinses);
    b.delay(FILL).delay(FILL_RESET).delay(AGITATOR);

    b.cycle(4)
        .flexible(w_final)
        .delay(DRAIN_DELAY)
        .delay(DRAIN_AFTER_RUN)
        .flexible(w_build)
        .flexible(w_blow);

    b.close(id, Track::Cip, HygieneState::Cleaned).unlock_all().record();
    Ok(b)
}

fn filter(unit: Unit<'_>) -> Result<RecipeBuilder, ConfigError> {
    let flush = volume_rinse(&unit, UtilityLine::Uv373, FILTER_FLUSH_LITRES)?;
    let cooling = if unit.config.has_line(UtilityLine::Uv374) {
        Some(volume_rinse(&unit, UtilityLine::Uv374, FILTER_COOLING_LITRES)?)
    } else {
        None
    };

    let id = unit.id;
    let mut b = RecipeBuilder::new(RecipeKind::Cip, id, unit.name());
    lock_unit_and_route(&mut b, &unit);
    b.open(id, Track::Cip, HygieneState::Cleaning);
    b.utility(flush.line, flush.rate, flush.ticks).flexible(1);
    if let Some(cooling) = cooling {
        b.utility(cooling.line, cooling.rate, cooling.ticks);
    }
    b.close(id, Track::Cip, HygieneState::Cleaned).unlock_all().record();
    Ok(b)
}

fn node(unit: Unit<'_>) -> Result<RecipeBuilder, ConfigError> {
    let flush = volume_rinse(&unit, UtilityLine::Uv373, FILTER_FLUSH_LITRES)?;

    let id = unit.id;
    let mut b = RecipeBuilder::new(RecipeKind::Cip, id, unit.name());
    lock_unit_and_route(&mut b, &unit);
    b.open(id, Track::Cip, HygieneState::Cleaning);
    b.utility(flush.line, flush.rate, flush.ticks).flexible(1);
    b.close(id, Track::Cip, HygieneState::Cleaned).unlock_all().record();
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;
    use crate::fixed::f64_to_fixed64;
    use crate::id::{LockId, VesselId};
    use crate::recipe::Op;
    use crate::route::RouteSegment;
    use crate::vessel::{LineSlot, Vessel};
    use slotmap::SlotMap;

    fn plan_for(kind: VesselKind, slot: LineSlot, config: &PlantConfig) -> Result<RecipeBuilder, ConfigError> {
        let ty = config.vessel_type(kind)?;
        let mut vessels: SlotMap<VesselId, Vessel> = SlotMap::with_key();
        let id = vessels.insert(Vessel::new(
            "unit",
            kind,
            slot,
            f64_to_fixed64(ty.capacity),
            ty.clean_hold_time,
        ));
        plan(Unit::new(id, &vessels[id], ty))
    }

    #[test]
    fn dissolver_fixed_cost() {
        let b = plan_for(VesselKind::Dissolver, LineSlot::One, &PlantConfig::reference()).unwrap();
        assert_eq!(b.fixed_total(), 1989);
        assert_eq!(b.weights(), TANK_CIP_WEIGHTS.to_vec());
    }

    #[test]
    fn filler_fixed_cost_includes_trans_in() {
        let b = plan_for(VesselKind::Filler, LineSlot::One, &PlantConfig::reference()).unwrap();
        assert_eq!(b.fixed_total(), 2607);
    }

    #[test]
    fn dissolver_plan_reconciles_to_mean() {
        let b = plan_for(VesselKind::Dissolver, LineSlot::One, &PlantConfig::reference()).unwrap();
        let plan = b.finish(Some(3480));
        let executed: i64 = plan
            .ops
            .iter()
            .map(|op| match op {
                Op::Delay(t) => *t as i64,
                Op::Utility { ticks, .. } => *ticks as i64,
                Op::Flexible(t) => (*t).max(0),
                _ => 0,
            })
            .sum();
        assert_eq!(executed, 3480);
    }

    #[test]
    fn rinses_draw_vessel_rate() {
        let b = plan_for(VesselKind::Dissolver, LineSlot::One, &PlantConfig::reference()).unwrap();
        let plan = b.finish(Some(3480));
        let rates: Vec<u32> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Utility { rate, .. } => Some(*rate),
                _ => None,
            })
            .collect();
        assert_eq!(rates.len(), 10);
        assert!(rates.iter().all(|&r| r == 18));
    }

    #[test]
    fn filler_holds_its_transfer_segment() {
        let plan = plan_for(VesselKind::Filler, LineSlot::Two, &PlantConfig::reference())
            .unwrap()
            .finish(Some(4380));
        let locks: Vec<LockId> = plan.locks().collect();
        assert_eq!(locks.len(), 2);
        assert!(matches!(locks[0], LockId::Vessel(_)));
        assert_eq!(locks[1], LockId::Route(RouteSegment::TransferToFiller2));
    }

    #[test]
    fn sterile_filter_cools_when_configured() {
        let plan = plan_for(VesselKind::SterileFilter, LineSlot::One, &PlantConfig::reference())
            .unwrap()
            .finish(Some(1800));
        let lines: Vec<UtilityLine> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Utility { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![UtilityLine::Uv373, UtilityLine::Uv374]);
    }

    #[test]
    fn particle_filter_has_no_cooling() {
        let b = plan_for(VesselKind::ParticleFilter, LineSlot::One, &PlantConfig::reference()).unwrap();
        // 100 L at 10 m3/h.
        assert_eq!(b.fixed_total(), 36);
        assert_eq!(b.weights(), vec![1]);
    }

    #[test]
    fn node_locks_both_sterile_segments() {
        let plan = plan_for(VesselKind::ValveNode, LineSlot::One, &PlantConfig::reference())
            .unwrap()
            .finish(Some(900));
        let routes: Vec<LockId> = plan.locks().filter(|l| matches!(l, LockId::Route(_))).collect();
        assert_eq!(
            routes,
            vec![
                LockId::Route(RouteSegment::SterileFilter1ToValveNode),
                LockId::Route(RouteSegment::SterileFilter2ToValveNode),
            ]
        );
    }

    #[test]
    fn missing_rate_fails_before_planning() {
        let mut config = PlantConfig::reference();
        config
            .vessel_types
            .get_mut(&VesselKind::Filler)
            .unwrap()
            .utility_rates
            .remove(&UtilityLine::Uv363);
        let err = plan_for(VesselKind::Filler, LineSlot::One, &config).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingUtilityRate {
                vessel: "unit".into(),
                line: UtilityLine::Uv363,
            }
        );
    }
}
