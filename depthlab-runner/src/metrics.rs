//! Aggregate metrics over per-example outcomes.
//!
//! Every statistic is defined on empty input (it reports zero) so a run over
//! an empty corpus still produces a well-formed metrics object.

use std::collections::BTreeMap;

use depthlab_core::policy::{EvalParams, StopHistogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluator::ExampleOutcome;

// ─── Statistics ──────────────────────────────────────────────────────

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Fraction of `true` flags; 0.0 for an empty iterator.
pub fn rate<I: IntoIterator<Item = bool>>(flags: I) -> f64 {
    let (hits, total) = flags
        .into_iter()
        .fold((0usize, 0usize), |(h, t), f| (h + usize::from(f), t + 1));
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Nearest-rank percentile: the `ceil(q·n)`-th smallest value, with the index
/// clamped into range. 0.0 for an empty slice.
pub fn percentile_nearest_rank(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q * sorted.len() as f64).ceil() as isize - 1;
    let idx = rank.clamp(0, sorted.len() as isize - 1) as usize;
    sorted[idx]
}

pub fn p95(values: &[f64]) -> f64 {
    percentile_nearest_rank(values, 0.95)
}

// ─── Metrics object ──────────────────────────────────────────────────

/// Run-level metrics. Serialized with keys in sorted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub n: usize,
    pub policy: String,
    pub k: usize,
    pub threshold: f64,
    pub m: usize,
    pub min_step: usize,
    pub seed: u64,
    pub acc: f64,
    pub mean_steps: f64,
    pub p95_steps: f64,
    pub mean_tokens: f64,
    pub p95_tokens: f64,
    /// Fraction of examples whose answer changed at or before the stop depth.
    pub flip_rate: f64,
    /// Fraction of examples that stopped wrong after an earlier correct depth.
    pub regress_at_stop_rate: f64,
    pub stop_histogram: StopHistogram,
}

impl EvalMetrics {
    /// Aggregate outcomes. The histogram is passed in because its length
    /// depends on the caller (observed stops for policies, corpus depth for
    /// the oracle).
    pub fn from_outcomes(
        policy: &str,
        params: &EvalParams,
        outcomes: &[ExampleOutcome],
        stop_histogram: StopHistogram,
    ) -> Self {
        let steps: Vec<f64> = outcomes.iter().map(|o| o.stop_depth as f64).collect();
        let tokens: Vec<f64> = outcomes.iter().map(|o| o.tokens as f64).collect();

        Self {
            n: outcomes.len(),
            policy: policy.to_string(),
            k: params.k,
            threshold: params.threshold,
            m: params.m,
            min_step: params.min_step,
            seed: params.seed,
            acc: rate(outcomes.iter().map(|o| o.correct)),
            mean_steps: mean(&steps),
            p95_steps: p95(&steps),
            mean_tokens: mean(&tokens),
            p95_tokens: p95(&tokens),
            flip_rate: rate(outcomes.iter().map(|o| o.flip)),
            regress_at_stop_rate: rate(outcomes.iter().map(|o| o.regress_at_stop)),
            stop_histogram,
        }
    }

    /// Two-space indented JSON with sorted keys; identical input gives
    /// byte-identical output.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let sorted: BTreeMap<String, Value> = serde_json::from_value(serde_json::to_value(self)?)?;
        serde_json::to_string_pretty(&sorted)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
