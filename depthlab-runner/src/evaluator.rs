//! Trajectory evaluator — run one stopping policy over a corpus.
//!
//! Scoring is pure and single-threaded: the same trajectories, policy and
//! parameters always give the same outcomes, in input order.

use depthlab_core::domain::Trajectory;
use depthlab_core::policy::{EvalParams, PolicyError, PolicyKind, StopHistogram, StopRule};
use depthlab_core::rng::{RngStreams, RANDOM_STOP_STREAM};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::metrics::EvalMetrics;
use crate::oracle::evaluate_oracle;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

// ─── Outcomes ────────────────────────────────────────────────────────

/// Scored decision for one trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleOutcome {
    pub id: String,
    pub stop_depth: usize,
    pub predicted: String,
    pub correct: bool,
    /// Cumulative cost through the stop depth.
    pub tokens: u64,
    /// The answer changed somewhere in depths `1..=stop_depth`.
    pub flip: bool,
    /// Stopped wrong although an earlier depth was correct.
    pub regress_at_stop: bool,
}

impl ExampleOutcome {
    /// Score a stop with exact normalized equality.
    pub fn score(trajectory: &Trajectory, stop_depth: usize) -> Self {
        let depth = trajectory.clamp_depth(stop_depth);
        Self::with_correctness(trajectory, depth, trajectory.is_correct_at(depth))
    }

    /// Score a stop with externally decided correctness.
    pub fn with_correctness(trajectory: &Trajectory, stop_depth: usize, correct: bool) -> Self {
        let depth = trajectory.clamp_depth(stop_depth);
        Self {
            id: trajectory.id().to_string(),
            stop_depth: depth,
            predicted: trajectory.answer_at(depth).to_string(),
            correct,
            tokens: trajectory.tokens_through(depth),
            flip: trajectory.answer_changes_through(depth),
            regress_at_stop: !correct && trajectory.correct_before(depth),
        }
    }
}

/// Everything one evaluation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub metrics: EvalMetrics,
    /// One per input trajectory, in input order.
    pub outcomes: Vec<ExampleOutcome>,
    /// Examples where the random policy's histogram did not fit and uniform was used.
    pub uniform_fallbacks: usize,
}

// ─── Entry points ────────────────────────────────────────────────────

/// Evaluate a policy by name. Unknown names fail with
/// [`PolicyError::UnknownPolicy`].
pub fn evaluate(
    trajectories: &[Trajectory],
    policy: &str,
    params: &EvalParams,
) -> Result<EvalReport, EvalError> {
    let kind: PolicyKind = policy.parse()?;
    evaluate_policy(trajectories, kind, params)
}

pub fn evaluate_policy(
    trajectories: &[Trajectory],
    kind: PolicyKind,
    params: &EvalParams,
) -> Result<EvalReport, EvalError> {
    validate_params(params)?;
    if kind.uses_labels() {
        return Ok(evaluate_oracle(trajectories, params));
    }

    let rule = StopRule::new(kind, params);
    let mut rng = RngStreams::new(params.seed).rng_for(RANDOM_STOP_STREAM, 0);
    let mut uniform_fallbacks = 0usize;

    let outcomes: Vec<ExampleOutcome> = trajectories
        .iter()
        .map(|t| {
            let choice = rule.choose(t, &mut rng);
            if choice.uniform_fallback {
                uniform_fallbacks += 1;
            }
            ExampleOutcome::score(t, choice.depth)
        })
        .collect();

    let depths: Vec<usize> = outcomes.iter().map(|o| o.stop_depth).collect();
    let histogram = StopHistogram::from_stop_depths(&depths);
    let metrics = EvalMetrics::from_outcomes(kind.name(), params, &outcomes, histogram);

    info!(
        policy = kind.name(),
        n = metrics.n,
        acc = metrics.acc,
        mean_steps = metrics.mean_steps,
        uniform_fallbacks,
        "evaluated policy"
    );

    Ok(EvalReport {
        metrics,
        outcomes,
        uniform_fallbacks,
    })
}

fn validate_params(params: &EvalParams) -> Result<(), EvalError> {
    if !params.threshold.is_finite() {
        return Err(EvalError::InvalidParams(format!(
            "threshold must be finite, got {}",
            params.threshold
        )));
    }
    if let Some(hist) = &params.random_hist {
        if hist.weights().iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(EvalError::InvalidParams(
                "random histogram weights must be finite and non-negative".into(),
            ));
        }
        if !hist.is_empty() && hist.total() <= 0.0 {
            return Err(EvalError::InvalidParams(
                "random histogram has no mass".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthlab_core::domain::Checkpoint;

    fn traj(id: &str, gold: &str, steps: &[(&str, f64)]) -> Trajectory {
        let cps = steps.iter().map(|(a, c)| Checkpoint::new(*a, *c)).collect();
        Trajectory::new(id, gold, cps).unwrap()
    }

    #[test]
    fn outcome_fields_follow_stop_depth() {
        let t = traj("a", "12", &[("7", 0.4), ("12", 0.85), ("9", 0.9)]);
        let o = ExampleOutcome::score(&t, 3);
        assert_eq!(o.predicted, "9");
        assert!(!o.correct);
        assert!(o.flip);
        assert!(o.regress_at_stop);
        assert_eq!(o.tokens, 3);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let err = evaluate(&[], "greedy", &EvalParams::default()).unwrap_err();
        assert!(matches!(err, EvalError::Policy(PolicyError::UnknownPolicy(_))));
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        for threshold in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let params = EvalParams::default().with_threshold(threshold);
            let err = evaluate(&[], "conf", &params).unwrap_err();
            assert!(matches!(err, EvalError::InvalidParams(_)), "{threshold}");
        }
    }

    #[test]
    fn zero_mass_histogram_is_rejected() {
        let params = EvalParams::default().with_random_hist(StopHistogram::new(vec![0.0, 0.0]));
        let err = evaluate(&[], "random", &params).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParams(_)));
    }

    #[test]
    fn finite_threshold_metrics_reload() {
        let data = vec![traj("a", "1", &[("1", 0.9)])];
        let params = EvalParams::default().with_threshold(2.0);
        let report = evaluate(&data, "conf", &params).unwrap();
        let json = report.metrics.to_json_pretty().unwrap();
        assert_eq!(EvalMetrics::from_json(&json).unwrap(), report.metrics);
    }

    #[test]
    fn mismatched_histogram_is_recovered_and_counted() {
        let data = vec![
            traj("a", "1", &[("1", 0.1), ("1", 0.1), ("1", 0.1)]),
            traj("b", "1", &[("1", 0.1), ("1", 0.1), ("1", 0.1), ("1", 0.1)]),
        ];
        let params = EvalParams::default()
            .with_random_hist(StopHistogram::new(vec![0.25, 0.25, 0.25, 0.25]));
        let report = evaluate(&data, "random", &params).unwrap();
        assert_eq!(report.uniform_fallbacks, 1);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn histogram_length_is_deepest_stop() {
        let data = vec![
            traj("a", "1", &[("1", 0.9), ("1", 0.9), ("1", 0.9)]),
            traj("b", "1", &[("2", 0.1), ("1", 0.9), ("1", 0.9)]),
        ];
        let report = evaluate(&data, "conf", &EvalParams::default()).unwrap();
        assert_eq!(report.metrics.stop_histogram.weights(), &[0.5, 0.5]);
    }
}
