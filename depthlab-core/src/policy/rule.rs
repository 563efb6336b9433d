//! Policy dispatch: a [`PolicyKind`] plus [`EvalParams`] become a concrete
//! [`StopRule`] that picks one depth per trajectory.

use rand::Rng;
use tracing::debug;

use crate::domain::Trajectory;

use super::histogram::StopHistogram;
use super::params::EvalParams;
use super::stop::{
    stop_argmax_confidence, stop_confidence, stop_fixed, stop_oracle, stop_random, stop_stability,
};
use super::{PolicyError, PolicyKind};

/// Depth picked for one trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopChoice {
    /// Always within `[1, T]`.
    pub depth: usize,
    /// The random policy's histogram did not fit this trajectory and uniform was used.
    pub uniform_fallback: bool,
}

impl StopChoice {
    fn at(depth: usize) -> Self {
        Self {
            depth,
            uniform_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopRule {
    Fixed { k: usize },
    Confidence { threshold: f64 },
    Stability { m: usize, min_step: usize },
    Random { hist: Option<StopHistogram> },
    ArgmaxConfidence,
    Oracle,
}

impl StopRule {
    pub fn new(kind: PolicyKind, params: &EvalParams) -> Self {
        match kind {
            PolicyKind::Fixed => StopRule::Fixed { k: params.k },
            PolicyKind::Confidence => StopRule::Confidence {
                threshold: params.threshold,
            },
            PolicyKind::Stability => StopRule::Stability {
                m: params.m,
                min_step: params.min_step,
            },
            PolicyKind::Random => StopRule::Random {
                hist: params.random_hist.clone(),
            },
            PolicyKind::ArgmaxConfidence => StopRule::ArgmaxConfidence,
            PolicyKind::Oracle => StopRule::Oracle,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            StopRule::Fixed { .. } => PolicyKind::Fixed,
            StopRule::Confidence { .. } => PolicyKind::Confidence,
            StopRule::Stability { .. } => PolicyKind::Stability,
            StopRule::Random { .. } => PolicyKind::Random,
            StopRule::ArgmaxConfidence => PolicyKind::ArgmaxConfidence,
            StopRule::Oracle => PolicyKind::Oracle,
        }
    }

    /// Pick a stop depth. Only the random rule draws from `rng`, exactly once.
    pub fn choose<R: Rng + ?Sized>(&self, trajectory: &Trajectory, rng: &mut R) -> StopChoice {
        let max_depth = trajectory.max_depth();
        let checkpoints = trajectory.checkpoints();

        let choice = match self {
            StopRule::Fixed { k } => StopChoice::at(stop_fixed(max_depth, *k)),
            StopRule::Confidence { threshold } => {
                StopChoice::at(stop_confidence(checkpoints, *threshold))
            }
            StopRule::Stability { m, min_step } => {
                StopChoice::at(stop_stability(checkpoints, *m, *min_step))
            }
            StopRule::Random { hist } => {
                let u: f64 = rng.gen();
                choose_random(trajectory, hist.as_ref(), u)
            }
            StopRule::ArgmaxConfidence => StopChoice::at(stop_argmax_confidence(checkpoints)),
            StopRule::Oracle => StopChoice::at(stop_oracle(trajectory)),
        };

        StopChoice {
            depth: trajectory.clamp_depth(choice.depth),
            ..choice
        }
    }
}

fn choose_random(trajectory: &Trajectory, hist: Option<&StopHistogram>, u: f64) -> StopChoice {
    let max_depth = trajectory.max_depth();
    let Some(hist) = hist else {
        return StopChoice::at(draw_uniform(max_depth, u));
    };
    match stop_random(max_depth, hist, u) {
        Ok(depth) => StopChoice::at(depth),
        Err(err @ PolicyError::HistogramLengthMismatch { .. }) => {
            debug!(id = trajectory.id(), %err, "using uniform stop distribution");
            StopChoice {
                depth: draw_uniform(max_depth, u),
                uniform_fallback: true,
            }
        }
        Err(_) => StopChoice::at(max_depth),
    }
}

fn draw_uniform(max_depth: usize, u: f64) -> usize {
    stop_random(max_depth, &StopHistogram::uniform(max_depth), u).unwrap_or(max_depth)
}
