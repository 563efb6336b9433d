//! Property tests for stopping-policy invariants.
//!
//! Uses proptest to verify:
//! 1. Range — every policy stops inside `[1, T]`
//! 2. Fixed clamping — `fixed(k)` is exactly `clamp(k, 1, T)`
//! 3. Threshold monotonicity — raising τ never stops earlier
//! 4. Oracle dominance — the oracle is correct whenever any depth is

use depthlab_core::domain::{answers_match, Checkpoint, Trajectory};
use depthlab_core::policy::{
    stop_confidence, stop_fixed, stop_oracle, stop_random, stop_stability, EvalParams, PolicyKind,
    StopHistogram, StopRule,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_checkpoint() -> impl Strategy<Value = Checkpoint> {
    (0u8..5, 0.0..=1.0_f64).prop_map(|(a, c)| Checkpoint::new(a.to_string(), c))
}

fn arb_trajectory() -> impl Strategy<Value = Trajectory> {
    (prop::collection::vec(arb_checkpoint(), 1..8), 0u8..5).prop_map(|(cps, gold)| {
        Trajectory::new("ex", gold.to_string(), cps).expect("non-empty by construction")
    })
}

// ── 1. Range ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn every_policy_stops_in_range(t in arb_trajectory(), seed in any::<u64>()) {
        let params = EvalParams::default();
        let mut rng = StdRng::seed_from_u64(seed);
        for kind in PolicyKind::ALL {
            let depth = StopRule::new(kind, &params).choose(&t, &mut rng).depth;
            prop_assert!(depth >= 1 && depth <= t.max_depth(), "{kind} stopped at {depth}");
        }
    }

    #[test]
    fn stability_in_range(t in arb_trajectory(), m in 0usize..6, min_step in 0usize..10) {
        let depth = stop_stability(t.checkpoints(), m, min_step);
        prop_assert!(depth >= 1 && depth <= t.max_depth());
    }

    #[test]
    fn random_in_range(t in arb_trajectory(), u in 0.0..1.0_f64) {
        let hist = StopHistogram::uniform(t.max_depth());
        let depth = stop_random(t.max_depth(), &hist, u).unwrap();
        prop_assert!(depth >= 1 && depth <= t.max_depth());
    }
}

// ── 2. Fixed clamping ────────────────────────────────────────────────

proptest! {
    #[test]
    fn fixed_is_clamped_k(t_len in 1usize..10, k in 0usize..20) {
        prop_assert_eq!(stop_fixed(t_len, k), k.clamp(1, t_len));
    }
}

// ── 3. Threshold monotonicity ────────────────────────────────────────

proptest! {
    #[test]
    fn higher_threshold_never_stops_earlier(
        t in arb_trajectory(),
        a in 0.0..=1.0_f64,
        b in 0.0..=1.0_f64,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(stop_confidence(t.checkpoints(), lo) <= stop_confidence(t.checkpoints(), hi));
    }
}

// ── 4. Oracle dominance ──────────────────────────────────────────────

proptest! {
    #[test]
    fn oracle_correct_whenever_any_depth_is(t in arb_trajectory()) {
        let any_correct = (1..=t.max_depth()).any(|d| t.is_correct_at(d));
        let s = stop_oracle(&t);
        if any_correct {
            prop_assert!(answers_match(t.answer_at(s), t.gold()));
        }
    }
}
