//! Confidence-threshold sweeps, budget matching and dev/test tuning.

use depthlab_core::domain::Trajectory;
use depthlab_core::policy::{EvalParams, PolicyKind};
use depthlab_core::rng::{RngStreams, SPLIT_STREAM};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evaluator::{evaluate_policy, EvalError};
use crate::metrics::EvalMetrics;

// ─── Grid ────────────────────────────────────────────────────────────

/// Ordered list of thresholds to try.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdGrid {
    thresholds: Vec<f64>,
}

impl ThresholdGrid {
    pub fn new(thresholds: Vec<f64>) -> Self {
        Self { thresholds }
    }

    /// `n` evenly spaced values from `min` to `max` inclusive.
    pub fn linspace(min: f64, max: f64, n: usize) -> Self {
        let thresholds = match n {
            0 => Vec::new(),
            1 => vec![min],
            _ => {
                let step = (max - min) / (n - 1) as f64;
                (0..n).map(|i| min + step * i as f64).collect()
            }
        };
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

impl Default for ThresholdGrid {
    /// 80 thresholds from 0.50 to 0.99.
    fn default() -> Self {
        Self::linspace(0.50, 0.99, 80)
    }
}

// ─── Sweep ───────────────────────────────────────────────────────────

/// One grid point's dev-set result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub threshold: f64,
    pub acc: f64,
    pub mean_steps: f64,
    pub mean_tokens: f64,
}

impl SweepPoint {
    fn from_metrics(threshold: f64, metrics: &EvalMetrics) -> Self {
        Self {
            threshold,
            acc: metrics.acc,
            mean_steps: metrics.mean_steps,
            mean_tokens: metrics.mean_tokens,
        }
    }
}

/// Runs the confidence policy once per grid threshold.
///
/// Runs share the input immutably and keep no state between them, so they
/// execute in parallel by default. Results are in grid order either way.
#[derive(Debug, Clone)]
pub struct ThresholdSweep {
    params: EvalParams,
    parallel: bool,
}

impl ThresholdSweep {
    pub fn new(params: EvalParams) -> Self {
        Self {
            params,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn params(&self) -> &EvalParams {
        &self.params
    }

    pub fn run(
        &self,
        trajectories: &[Trajectory],
        grid: &ThresholdGrid,
    ) -> Result<Vec<SweepPoint>, EvalError> {
        let run_one = |&threshold: &f64| -> Result<SweepPoint, EvalError> {
            let params = self.params.clone().with_threshold(threshold);
            let report = evaluate_policy(trajectories, PolicyKind::Confidence, &params)?;
            Ok(SweepPoint::from_metrics(threshold, &report.metrics))
        };

        let points = if self.parallel {
            grid.thresholds()
                .par_iter()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            grid.thresholds()
                .iter()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        };

        debug!(points = points.len(), n = trajectories.len(), "threshold sweep finished");
        Ok(points)
    }
}

// ─── Selection ───────────────────────────────────────────────────────

/// Grid point chosen to match a target mean depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetSelection {
    pub target_mean_steps: f64,
    pub point: SweepPoint,
}

/// For each target mean depth, the point minimizing `|mean_steps − target|`.
/// Ties go to the earlier grid point. Empty `points` gives no selections.
pub fn select_for_targets(points: &[SweepPoint], targets: &[f64]) -> Vec<BudgetSelection> {
    targets
        .iter()
        .filter_map(|&target| {
            closest_to(points, target).map(|point| BudgetSelection {
                target_mean_steps: target,
                point,
            })
        })
        .collect()
}

fn closest_to(points: &[SweepPoint], target: f64) -> Option<SweepPoint> {
    let mut best: Option<(f64, SweepPoint)> = None;
    for p in points {
        let gap = (p.mean_steps - target).abs();
        if best.map_or(true, |(g, _)| gap < g) {
            best = Some((gap, *p));
        }
    }
    best.map(|(_, p)| p)
}

/// Highest-accuracy point; ties go to the earlier grid point.
pub fn best_by_accuracy(points: &[SweepPoint]) -> Option<SweepPoint> {
    let mut best: Option<SweepPoint> = None;
    for p in points {
        if best.map_or(true, |b| p.acc > b.acc) {
            best = Some(*p);
        }
    }
    best
}

// ─── Dev/test split ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DevTestSplit {
    pub dev: Vec<Trajectory>,
    pub test: Vec<Trajectory>,
}

/// Deterministic split: ids sorted, shuffled by the seed's split stream, and
/// the first `floor(n · dev_frac)` go to dev. Every trajectory lands in
/// exactly one side.
pub fn split_dev_test(trajectories: &[Trajectory], dev_frac: f64, seed: u64) -> DevTestSplit {
    let mut order: Vec<usize> = (0..trajectories.len()).collect();
    order.sort_by(|&a, &b| trajectories[a].id().cmp(trajectories[b].id()));
    let mut rng = RngStreams::new(seed).rng_for(SPLIT_STREAM, 0);
    order.shuffle(&mut rng);

    let frac = if dev_frac.is_nan() { 0.0 } else { dev_frac.clamp(0.0, 1.0) };
    let cut = (trajectories.len() as f64 * frac).floor() as usize;
    let (dev_idx, test_idx) = order.split_at(cut.min(order.len()));

    DevTestSplit {
        dev: dev_idx.iter().map(|&i| trajectories[i].clone()).collect(),
        test: test_idx.iter().map(|&i| trajectories[i].clone()).collect(),
    }
}

/// A dev-selected threshold, re-evaluated on test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSelection {
    /// Target mean depth, or `None` for the best-dev-accuracy pick.
    pub target_mean_steps: Option<f64>,
    pub dev: SweepPoint,
    pub test: EvalMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    pub dev_points: Vec<SweepPoint>,
    pub selections: Vec<TestSelection>,
    pub best_dev: Option<TestSelection>,
    /// Always stopping at the last depth, on test.
    pub always_last: EvalMetrics,
}

/// Select thresholds on dev only, then report them and the always-last
/// baseline on test. `sweep` supplies the base parameters and parallelism.
pub fn tune_on_dev_report_on_test(
    split: &DevTestSplit,
    sweep: &ThresholdSweep,
    grid: &ThresholdGrid,
    targets: &[f64],
) -> Result<SplitReport, EvalError> {
    let params = sweep.params();
    let dev_points = sweep.run(&split.dev, grid)?;

    let on_test = |target: Option<f64>, dev: SweepPoint| -> Result<TestSelection, EvalError> {
        let test_params = params.clone().with_threshold(dev.threshold);
        let report = evaluate_policy(&split.test, PolicyKind::Confidence, &test_params)?;
        Ok(TestSelection {
            target_mean_steps: target,
            dev,
            test: report.metrics,
        })
    };

    let selections = select_for_targets(&dev_points, targets)
        .into_iter()
        .map(|s| on_test(Some(s.target_mean_steps), s.point))
        .collect::<Result<Vec<_>, _>>()?;
    let best_dev = best_by_accuracy(&dev_points)
        .map(|p| on_test(None, p))
        .transpose()?;

    let last_depth = split
        .test
        .iter()
        .map(Trajectory::max_depth)
        .max()
        .unwrap_or(1);
    let always_last = evaluate_policy(
        &split.test,
        PolicyKind::Fixed,
        &params.clone().with_k(last_depth),
    )?
    .metrics;

    info!(
        dev = split.dev.len(),
        test = split.test.len(),
        selections = selections.len(),
        "tuned thresholds on dev"
    );

    Ok(SplitReport {
        dev_points,
        selections,
        best_dev,
        always_last,
    })
}
