//! Property-based tests for the plant core.
//!
//! Uses proptest to generate random pool traffic, volume movements, recipe
//! shapes and launch schedules, then verify the plant invariants hold.

use std::collections::BTreeMap;

use cipsim_core::config::{DurationBounds, RecipeKind, UtilityLine};
use cipsim_core::event::{Event, EventKind};
use cipsim_core::fixed::Ticks;
use cipsim_core::id::{LockId, ProcessId};
use cipsim_core::observer::NullObserver;
use cipsim_core::pool::CapacityPool;
use cipsim_core::recipe::{FillAmount, RecipeBuilder};
use cipsim_core::test_utils::*;
use cipsim_core::vessel::VesselKind;
use proptest::prelude::*;

const SHORT_CIP: DurationBounds = DurationBounds::new(100, 200, 300);

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum PoolOp {
    Request(u32),
    /// Release the n-th outstanding reservation (modulo count).
    Release(usize),
}

fn arb_pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        (1u32..40).prop_map(PoolOp::Request),
        (0usize..16).prop_map(PoolOp::Release),
    ]
}

#[derive(Debug, Clone)]
enum Movement {
    FillDissolver(f64),
    TopUpFiller(f64),
    Transfer,
}

fn arb_movement() -> impl Strategy<Value = Movement> {
    prop_oneof![
        (0.0f64..9.0).prop_map(Movement::FillDissolver),
        (0.0f64..120.0).prop_map(Movement::TopUpFiller),
        Just(Movement::Transfer),
    ]
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pool_conserves_capacity(ops in proptest::collection::vec(arb_pool_op(), 0..64)) {
        let mut pool = CapacityPool::new("WFI", 50);
        let mut outstanding = Vec::new();
        for op in ops {
            match op {
                PoolOp::Request(amount) => {
                    let before = (pool.available(), pool.reserved());
                    if pool.request(amount) {
                        outstanding.push(amount);
                    } else {
                        prop_assert_eq!(before, (pool.available(), pool.reserved()));
                    }
                }
                PoolOp::Release(n) => {
                    if !outstanding.is_empty() {
                        let amount = outstanding.remove(n % outstanding.len());
                        pool.release(amount);
                    }
                }
            }
            prop_assert!(pool.is_consistent());
            prop_assert_eq!(pool.reserved(), outstanding.iter().sum::<u32>());
        }
    }

    #[test]
    fn volumes_stay_within_capacity(moves in proptest::collection::vec(arb_movement(), 1..8)) {
        let mut plant = reference_plant();
        let lb = plant.add_vessel("LB", VesselKind::Dissolver).unwrap();
        let ab = plant.add_vessel("AB", VesselKind::Filler).unwrap();

        let mut b = RecipeBuilder::new(RecipeKind::Production, ab, "AB");
        for m in &moves {
            match *m {
                Movement::FillDissolver(m3) => {
                    b.fill(lb, UtilityLine::Uv042, 18, fixed(36.0), FillAmount::Fixed(fixed(m3)));
                }
                Movement::TopUpFiller(m3) => {
                    b.fill(ab, UtilityLine::Uv042, 30, fixed(60.0), FillAmount::TopUpTo(fixed(m3)));
                }
                Movement::Transfer => {
                    b.transfer(lb, ab);
                }
            }
        }
        b.record();
        let handle = plant.start_plan(b, None).unwrap();

        let mut obs = NullObserver;
        for _ in 0..50_000 {
            if plant.is_finished(handle) {
                break;
            }
            plant.tick(&mut obs);
            for (_, v) in plant.vessels() {
                prop_assert!(v.is_volume_in_bounds(), "{} out of bounds: {}", v.name, v.volume());
            }
            prop_assert!(plant.pool().is_consistent());
        }
        prop_assert!(plant.is_finished(handle));
    }

    #[test]
    fn executed_delay_follows_reconciliation_law(
        delays in proptest::collection::vec(0u64..400, 0..6),
        weights in proptest::collection::vec(1u32..20, 1..6),
        target in 0u64..2_000,
    ) {
        let mut plant = reference_plant();
        let p = plant.add_vessel("P", VesselKind::ParticleFilter).unwrap();
        let mut b = RecipeBuilder::new(RecipeKind::Cip, p, "P");
        for (i, &w) in weights.iter().enumerate() {
            if let Some(&d) = delays.get(i) {
                b.delay(d);
            }
            b.flexible(w);
        }
        for &d in delays.iter().skip(weights.len()) {
            b.delay(d);
        }
        b.record();
        let fixed_total: Ticks = delays.iter().sum();
        plant.start_plan(b, Some(target)).unwrap();
        run_to_completion(&mut plant, 10_000, &mut NullObserver);

        let expected = target.max(fixed_total) as i64;
        let tolerance = weights.len() as i64 - 1;
        let executed = plant
            .events()
            .of_kind(EventKind::RecipeCompleted)
            .find_map(|e| match e {
                Event::RecipeCompleted { executed, .. } => Some(*executed),
                _ => None,
            })
            .unwrap();
        prop_assert!((executed as i64 - expected).abs() <= tolerance);
        // No dwells or waits in this plan, so wall time equals executed delay.
        prop_assert_eq!(plant.records()[0].duration(), executed);
    }

    #[test]
    fn route_tokens_are_never_shared(launches in proptest::collection::vec(0u64..600, 1..6)) {
        let mut plant = plant_with(uniform_config(50, SHORT_CIP));
        let line = plant.add_vessel("T", VesselKind::TransferLine).unwrap();
        let mut schedule: Vec<(Ticks, usize)> = launches.iter().copied().zip(0..).collect();
        schedule.sort();

        let mut obs = NullObserver;
        plant.start_cip(line).unwrap();
        for (at, i) in schedule {
            plant.run_until(at, &mut obs);
            let p = plant.add_vessel(format!("P{i}"), VesselKind::ParticleFilter).unwrap();
            plant.start_cip(p).unwrap();
        }
        run_to_completion(&mut plant, 50_000, &mut obs);
        prop_assert_eq!(plant.events().dropped_count(), 0);

        let mut holders: BTreeMap<LockId, ProcessId> = BTreeMap::new();
        for event in plant.events().iter() {
            match event {
                Event::LockGranted { lock, process, .. } => {
                    prop_assert!(holders.insert(*lock, *process).is_none(), "{lock:?} granted while held");
                }
                Event::LockReleased { lock, process, .. } => {
                    prop_assert_eq!(holders.remove(lock), Some(*process));
                }
                _ => {}
            }
        }
        prop_assert!(holders.is_empty());
    }
}
