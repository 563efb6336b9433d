//! Property tests for evaluation invariants.
//!
//! Uses proptest to verify:
//! 1. Oracle dominance — oracle accuracy bounds every policy's
//! 2. Policy ordering — on corpora without regressions, conf ≥ fixed(1)
//! 3. Regression scoping — improving-to-correct sequences never regress
//! 4. Bootstrap intervals — the CI brackets are ordered

use depthlab_core::domain::{Checkpoint, Trajectory};
use depthlab_core::policy::{EvalParams, PolicyKind};
use depthlab_runner::{evaluate_oracle, evaluate_policy, paired_bootstrap, BootstrapConfig};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_trajectory(id: usize) -> impl Strategy<Value = Trajectory> {
    (
        prop::collection::vec((0u8..4, 0.0..=1.0_f64), 1..6),
        0u8..4,
    )
        .prop_map(move |(steps, gold)| {
            let cps = steps
                .into_iter()
                .map(|(a, c)| Checkpoint::new(a.to_string(), c))
                .collect();
            Trajectory::new(format!("ex{id}"), gold.to_string(), cps).expect("non-empty")
        })
}

fn arb_corpus() -> impl Strategy<Value = Vec<Trajectory>> {
    (1usize..30).prop_flat_map(|n| (0..n).map(arb_trajectory).collect::<Vec<_>>())
}

/// Once correct, stays correct.
fn arb_sticky_trajectory(id: usize) -> impl Strategy<Value = Trajectory> {
    (prop::collection::vec(0.0..=1.0_f64, 1..6), 0usize..7).prop_map(move |(confs, first_ok)| {
        let cps = confs
            .iter()
            .enumerate()
            .map(|(i, c)| Checkpoint::new(if i >= first_ok { "42" } else { "0" }, *c))
            .collect();
        Trajectory::new(format!("ex{id}"), "42", cps).expect("non-empty")
    })
}

fn arb_sticky_corpus() -> impl Strategy<Value = Vec<Trajectory>> {
    (1usize..30).prop_flat_map(|n| (0..n).map(arb_sticky_trajectory).collect::<Vec<_>>())
}

// ── 1. Oracle dominance ──────────────────────────────────────────────

proptest! {
    #[test]
    fn oracle_accuracy_bounds_every_policy(data in arb_corpus(), tau in 0.0..=1.0_f64) {
        let params = EvalParams::default().with_threshold(tau);
        let oracle = evaluate_oracle(&data, &params).metrics.acc;
        for kind in PolicyKind::ALL {
            let acc = evaluate_policy(&data, kind, &params).unwrap().metrics.acc;
            prop_assert!(oracle >= acc, "{kind}: {acc} > oracle {oracle}");
        }
    }
}

// ── 2. Policy ordering ───────────────────────────────────────────────

proptest! {
    #[test]
    fn conf_at_least_fixed_one_without_regressions(data in arb_sticky_corpus(), tau in 0.0..=1.0_f64) {
        let params = EvalParams::default().with_threshold(tau).with_k(1);
        let conf = evaluate_policy(&data, PolicyKind::Confidence, &params).unwrap().metrics.acc;
        let fixed = evaluate_policy(&data, PolicyKind::Fixed, &params).unwrap().metrics.acc;
        prop_assert!(conf >= fixed);
    }
}

// ── 3. Regression scoping ────────────────────────────────────────────

proptest! {
    #[test]
    fn improving_to_correct_never_regresses(
        confs in prop::collection::vec(0.0..=1.0_f64, 4),
        k in 0usize..6,
        tau in 0.0..=1.0_f64,
        seed in any::<u64>(),
    ) {
        let cps = confs
            .iter()
            .enumerate()
            .map(|(i, c)| Checkpoint::new(if i == 3 { "12".to_string() } else { format!("{}", 20 + i) }, *c))
            .collect();
        let data = vec![Trajectory::new("ex", "12", cps).unwrap()];
        let params = EvalParams::default().with_k(k).with_threshold(tau).with_seed(seed);
        for kind in PolicyKind::ALL {
            let report = evaluate_policy(&data, kind, &params).unwrap();
            prop_assert_eq!(report.metrics.regress_at_stop_rate, 0.0);
        }
    }
}

// ── 4. Bootstrap intervals ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bootstrap_interval_is_ordered(data in arb_corpus(), tau in 0.0..=1.0_f64) {
        let params = EvalParams::default().with_threshold(tau);
        let a = evaluate_policy(&data, PolicyKind::Confidence, &params).unwrap();
        let b = evaluate_policy(&data, PolicyKind::Fixed, &params).unwrap();
        let config = BootstrapConfig { n_resamples: 200, seed: 0 };
        let cmp = paired_bootstrap(&a.outcomes, &b.outcomes, &config).unwrap();
        for d in [cmp.accuracy, cmp.mean_depth, cmp.regression] {
            prop_assert!(d.ci_lower <= d.ci_upper);
            prop_assert!((0.0..=1.0).contains(&d.prob_improvement));
        }
    }
}
