//! Oracle evaluator — the label-using upper bound.
//!
//! Stops each trajectory at its earliest correct depth. Correctness here is
//! the lenient [`answers_match`] rather than exact equality, so oracle
//! accuracy is never below any policy's.

use depthlab_core::domain::{answers_match, Trajectory};
use depthlab_core::policy::{stop_oracle, EvalParams, PolicyKind, StopHistogram};
use tracing::info;

use crate::evaluator::{EvalReport, ExampleOutcome};
use crate::metrics::EvalMetrics;

/// Evaluate the oracle stop rule.
///
/// The stop histogram spans the longest trajectory in the corpus, so it lines
/// up with policy curves even when the oracle never stops late.
pub fn evaluate_oracle(trajectories: &[Trajectory], params: &EvalParams) -> EvalReport {
    let outcomes: Vec<ExampleOutcome> = trajectories
        .iter()
        .map(|t| {
            let depth = stop_oracle(t);
            let correct = answers_match(t.answer_at(depth), t.gold());
            ExampleOutcome::with_correctness(t, depth, correct)
        })
        .collect();

    let max_depth = trajectories.iter().map(Trajectory::max_depth).max().unwrap_or(0);
    let depths: Vec<usize> = outcomes.iter().map(|o| o.stop_depth).collect();
    let histogram = StopHistogram::from_stop_depths_with_len(&depths, max_depth);
    let metrics = EvalMetrics::from_outcomes(PolicyKind::Oracle.name(), params, &outcomes, histogram);

    info!(n = metrics.n, acc = metrics.acc, mean_steps = metrics.mean_steps, "evaluated oracle");

    EvalReport {
        metrics,
        outcomes,
        uniform_fallbacks: 0,
    }
}
