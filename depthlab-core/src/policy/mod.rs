//! Stopping policies — when to commit to an answer.
//!
//! Every policy maps a trajectory to a depth in `[1, T]`:
//! - **fixed**: always depth `k`
//! - **conf**: first depth whose confidence reaches τ
//! - **stability**: first depth where the answer has held for `m` steps
//! - **random**: a draw from a stop-depth histogram (budget-matched baseline)
//! - **argmax_conf**: the most confident depth
//! - **oracle**: earliest correct depth (reads the label; upper bound only)

pub mod histogram;
pub mod params;
pub mod rule;
pub mod stop;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use histogram::StopHistogram;
pub use params::EvalParams;
pub use rule::{StopChoice, StopRule};
pub use stop::{
    stop_argmax_confidence, stop_confidence, stop_fixed, stop_oracle, stop_random, stop_stability,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
    #[error("stop histogram has {actual} entries, trajectory has {expected} depths")]
    HistogramLengthMismatch { expected: usize, actual: usize },
}

/// The closed set of stopping policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "conf")]
    Confidence,
    #[serde(rename = "stability")]
    Stability,
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "argmax_conf")]
    ArgmaxConfidence,
    #[serde(rename = "oracle")]
    Oracle,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 6] = [
        PolicyKind::Fixed,
        PolicyKind::Confidence,
        PolicyKind::Stability,
        PolicyKind::Random,
        PolicyKind::ArgmaxConfidence,
        PolicyKind::Oracle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Fixed => "fixed",
            PolicyKind::Confidence => "conf",
            PolicyKind::Stability => "stability",
            PolicyKind::Random => "random",
            PolicyKind::ArgmaxConfidence => "argmax_conf",
            PolicyKind::Oracle => "oracle",
        }
    }

    /// True for policies that read the gold answer.
    pub fn uses_labels(&self) -> bool {
        matches!(self, PolicyKind::Oracle)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| PolicyError::UnknownPolicy(s.to_string()))
    }
}
