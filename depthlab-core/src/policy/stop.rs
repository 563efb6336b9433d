//! Stop rules. Each function maps a trajectory (or its shape) to a depth in
//! `[1, T]` and never looks at the gold answer, except [`stop_oracle`].

use crate::domain::{answers_match, Checkpoint, Trajectory};

use super::histogram::StopHistogram;
use super::PolicyError;

/// Always stop at depth `k`, clamped into `[1, T]`.
pub fn stop_fixed(max_depth: usize, k: usize) -> usize {
    k.clamp(1, max_depth.max(1))
}

/// First depth whose confidence reaches `threshold`, else the last depth.
pub fn stop_confidence(checkpoints: &[Checkpoint], threshold: f64) -> usize {
    checkpoints
        .iter()
        .position(|c| c.conf >= threshold)
        .map_or(checkpoints.len(), |i| i + 1)
}

/// First depth at or after `min_step` where the same answer has been seen
/// `m` times in a row (counting the current depth), else the last depth.
///
/// `m` and `min_step` below 1 are treated as 1, so `m = 1` stops at
/// `max(1, min_step)`.
pub fn stop_stability(checkpoints: &[Checkpoint], m: usize, min_step: usize) -> usize {
    let m = m.max(1);
    let min_step = min_step.max(1);
    let mut streak = 0usize;
    let mut last: Option<&str> = None;

    for (i, c) in checkpoints.iter().enumerate() {
        if last == Some(c.ans.as_str()) {
            streak += 1;
        } else {
            streak = 1;
            last = Some(c.ans.as_str());
        }
        let depth = i + 1;
        if depth >= min_step && streak >= m {
            return depth;
        }
    }
    checkpoints.len()
}

/// Inverse-CDF draw from `hist` with a uniform variate `u` in `[0, 1)`.
///
/// Returns the first depth whose cumulative mass reaches `u`; if rounding
/// leaves `u` above the total, returns `max_depth`.
pub fn stop_random(max_depth: usize, hist: &StopHistogram, u: f64) -> Result<usize, PolicyError> {
    if hist.len() != max_depth {
        return Err(PolicyError::HistogramLengthMismatch {
            expected: max_depth,
            actual: hist.len(),
        });
    }
    let mut cumulative = 0.0;
    for (i, p) in hist.weights().iter().enumerate() {
        cumulative += p;
        if u <= cumulative {
            return Ok(i + 1);
        }
    }
    Ok(max_depth)
}

/// Depth of the highest confidence; ties go to the earliest depth.
pub fn stop_argmax_confidence(checkpoints: &[Checkpoint]) -> usize {
    let mut best = 0usize;
    for (i, c) in checkpoints.iter().enumerate().skip(1) {
        if c.conf > checkpoints[best].conf {
            best = i;
        }
    }
    best + 1
}

/// Earliest depth whose answer matches gold, else the last depth.
///
/// Reads the label, so it is an upper bound for comparison only.
pub fn stop_oracle(trajectory: &Trajectory) -> usize {
    trajectory
        .checkpoints()
        .iter()
        .position(|c| answers_match(&c.ans, trajectory.gold()))
        .map_or(trajectory.max_depth(), |i| i + 1)
}
