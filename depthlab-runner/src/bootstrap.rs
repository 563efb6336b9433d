//! Paired bootstrap — is system A really better than system B on the same
//! examples?
//!
//! Outcomes are matched by example id. Each resample draws `n` indices with
//! replacement and computes three deltas `mean(A) − mean(B)` from that one
//! index set: accuracy, chosen depth and regression rate.

use std::collections::HashMap;

use depthlab_core::rng::{RngStreams, BOOTSTRAP_STREAM};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluator::ExampleOutcome;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of resamples (default 20 000).
    pub n_resamples: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 20_000,
            seed: 0,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Which sign of Δ counts as an improvement for A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Improvement {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaEstimate {
    /// Δ on the original sample.
    pub observed: f64,
    /// 2.5th percentile of resampled Δ.
    pub ci_lower: f64,
    /// 97.5th percentile of resampled Δ.
    pub ci_upper: f64,
    /// Share of resamples with Δ in the improving direction.
    pub prob_improvement: f64,
    pub improvement: Improvement,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairedComparison {
    /// Examples present in both systems.
    pub n: usize,
    pub n_resamples: usize,
    /// Higher is better.
    pub accuracy: DeltaEstimate,
    /// Lower is better.
    pub mean_depth: DeltaEstimate,
    /// Lower is better.
    pub regression: DeltaEstimate,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no example ids shared by both systems")]
    NoOverlap,
    #[error("n_resamples must be at least 1")]
    NoResamples,
}

// ─── Paired bootstrap ────────────────────────────────────────────────

struct Paired {
    acc: Vec<(f64, f64)>,
    depth: Vec<(f64, f64)>,
    regress: Vec<(f64, f64)>,
}

fn pair_by_id(a: &[ExampleOutcome], b: &[ExampleOutcome]) -> Paired {
    let b_by_id: HashMap<&str, &ExampleOutcome> = b.iter().map(|o| (o.id.as_str(), o)).collect();
    let mut shared: Vec<(&ExampleOutcome, &ExampleOutcome)> = a
        .iter()
        .filter_map(|oa| b_by_id.get(oa.id.as_str()).map(|ob| (oa, *ob)))
        .collect();
    shared.sort_by(|x, y| x.0.id.cmp(&y.0.id));
    shared.dedup_by(|x, y| x.0.id == y.0.id);

    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    Paired {
        acc: shared.iter().map(|(x, y)| (flag(x.correct), flag(y.correct))).collect(),
        depth: shared
            .iter()
            .map(|(x, y)| (x.stop_depth as f64, y.stop_depth as f64))
            .collect(),
        regress: shared
            .iter()
            .map(|(x, y)| (flag(x.regress_at_stop), flag(y.regress_at_stop)))
            .collect(),
    }
}

fn delta(pairs: &[(f64, f64)], idx: &[usize]) -> f64 {
    let n = idx.len() as f64;
    idx.iter().map(|&i| pairs[i].0 - pairs[i].1).sum::<f64>() / n
}

fn observed(pairs: &[(f64, f64)]) -> f64 {
    pairs.iter().map(|(a, b)| a - b).sum::<f64>() / pairs.len() as f64
}

/// Bootstrap A − B over examples both systems scored.
///
/// Returns [`BootstrapError::NoOverlap`] when the two outcome sets share no id.
pub fn paired_bootstrap(
    a: &[ExampleOutcome],
    b: &[ExampleOutcome],
    config: &BootstrapConfig,
) -> Result<PairedComparison, BootstrapError> {
    if config.n_resamples == 0 {
        return Err(BootstrapError::NoResamples);
    }
    let paired = pair_by_id(a, b);
    let n = paired.acc.len();
    if n == 0 {
        return Err(BootstrapError::NoOverlap);
    }
    if n < a.len() || n < b.len() {
        warn!(shared = n, a = a.len(), b = b.len(), "comparing only shared example ids");
    }

    let mut rng = RngStreams::new(config.seed).rng_for(BOOTSTRAP_STREAM, 0);
    let mut acc = Vec::with_capacity(config.n_resamples);
    let mut depth = Vec::with_capacity(config.n_resamples);
    let mut regress = Vec::with_capacity(config.n_resamples);
    let mut idx = vec![0usize; n];

    for _ in 0..config.n_resamples {
        for slot in idx.iter_mut() {
            *slot = rng.gen_range(0..n);
        }
        acc.push(delta(&paired.acc, &idx));
        depth.push(delta(&paired.depth, &idx));
        regress.push(delta(&paired.regress, &idx));
    }

    let comparison = PairedComparison {
        n,
        n_resamples: config.n_resamples,
        accuracy: summarize(observed(&paired.acc), acc, Improvement::Positive),
        mean_depth: summarize(observed(&paired.depth), depth, Improvement::Negative),
        regression: summarize(observed(&paired.regress), regress, Improvement::Negative),
    };

    info!(
        n,
        acc_delta = comparison.accuracy.observed,
        depth_delta = comparison.mean_depth.observed,
        "paired bootstrap"
    );
    Ok(comparison)
}

fn summarize(observed: f64, mut deltas: Vec<f64>, improvement: Improvement) -> DeltaEstimate {
    deltas.sort_by(|x, y| x.total_cmp(y));
    let b = deltas.len();
    let improving = deltas
        .iter()
        .filter(|&&d| match improvement {
            Improvement::Positive => d > 0.0,
            Improvement::Negative => d < 0.0,
        })
        .count();

    DeltaEstimate {
        observed,
        ci_lower: quantile_index(&deltas, 0.025),
        ci_upper: quantile_index(&deltas, 0.975),
        prob_improvement: improving as f64 / b as f64,
        improvement,
    }
}

/// `sorted[floor(q · B)]`, clamped to the last element.
fn quantile_index(sorted: &[f64], q: f64) -> f64 {
    let i = ((q * sorted.len() as f64).floor() as usize).min(sorted.len().saturating_sub(1));
    sorted.get(i).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, correct: bool, depth: usize, regress: bool) -> ExampleOutcome {
        ExampleOutcome {
            id: id.to_string(),
            stop_depth: depth,
            predicted: String::new(),
            correct,
            tokens: depth as u64,
            flip: false,
            regress_at_stop: regress,
        }
    }

    #[test]
    fn defaults() {
        let c = BootstrapConfig::default();
        assert_eq!(c.n_resamples, 20_000);
        assert_eq!(c.seed, 0);
    }

    #[test]
    fn identical_systems_have_zero_deltas() {
        let a: Vec<_> = (0..20)
            .map(|i| outcome(&format!("e{i}"), i % 3 == 0, 1 + i % 4, false))
            .collect();
        let config = BootstrapConfig { n_resamples: 500, seed: 0 };
        let cmp = paired_bootstrap(&a, &a, &config).unwrap();
        assert_eq!(cmp.accuracy.observed, 0.0);
        assert_eq!(cmp.accuracy.ci_lower, 0.0);
        assert_eq!(cmp.accuracy.ci_upper, 0.0);
        assert_eq!(cmp.accuracy.prob_improvement, 0.0);
    }

    #[test]
    fn cheaper_system_shows_negative_depth_delta() {
        let a: Vec<_> = (0..30).map(|i| outcome(&format!("e{i}"), true, 2, false)).collect();
        let b: Vec<_> = (0..30).map(|i| outcome(&format!("e{i}"), true, 4, false)).collect();
        let config = BootstrapConfig { n_resamples: 200, seed: 1 };
        let cmp = paired_bootstrap(&a, &b, &config).unwrap();
        assert_eq!(cmp.mean_depth.observed, -2.0);
        assert_eq!(cmp.mean_depth.ci_upper, -2.0);
        assert_eq!(cmp.mean_depth.prob_improvement, 1.0);
        assert_eq!(cmp.mean_depth.improvement, Improvement::Negative);
    }

    #[test]
    fn pairs_only_shared_ids() {
        let a = vec![outcome("x", true, 1, false), outcome("y", true, 1, false)];
        let b = vec![outcome("y", false, 1, false), outcome("z", false, 1, false)];
        let cmp = paired_bootstrap(&a, &b, &BootstrapConfig { n_resamples: 10, seed: 0 }).unwrap();
        assert_eq!(cmp.n, 1);
        assert_eq!(cmp.accuracy.observed, 1.0);
    }

    #[test]
    fn disjoint_ids_are_an_error() {
        let a = vec![outcome("x", true, 1, false)];
        let b = vec![outcome("y", true, 1, false)];
        let err = paired_bootstrap(&a, &b, &BootstrapConfig::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::NoOverlap));
    }

    #[test]
    fn same_seed_same_interval() {
        let a: Vec<_> = (0..40).map(|i| outcome(&format!("e{i}"), i % 2 == 0, 1, false)).collect();
        let b: Vec<_> = (0..40).map(|i| outcome(&format!("e{i}"), i % 5 == 0, 4, i % 7 == 0)).collect();
        let config = BootstrapConfig { n_resamples: 300, seed: 9 };
        assert_eq!(
            paired_bootstrap(&a, &b, &config).unwrap(),
            paired_bootstrap(&a, &b, &config).unwrap()
        );
    }
}
