//! Policy parameters.

use serde::{Deserialize, Serialize};

use super::histogram::StopHistogram;

/// Immutable parameter set shared by every policy in a run.
///
/// Each policy reads only the fields it needs; the rest are echoed into the
/// metrics object so a run can be reproduced from its output alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalParams {
    /// Fixed-depth policy target.
    pub k: usize,
    /// Confidence-threshold policy cut-off.
    pub threshold: f64,
    /// Stability policy streak length.
    pub m: usize,
    /// Earliest depth the stability policy may stop at.
    pub min_step: usize,
    /// Run seed for the random policy.
    pub seed: u64,
    /// Random-policy distribution. `None` means uniform over each example's depths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_hist: Option<StopHistogram>,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            k: 4,
            threshold: 0.8,
            m: 2,
            min_step: 1,
            seed: 0,
            random_hist: None,
        }
    }
}

impl EvalParams {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_random_hist(mut self, hist: StopHistogram) -> Self {
        self.random_hist = Some(hist);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = EvalParams::default();
        assert_eq!(p.k, 4);
        assert_eq!(p.threshold, 0.8);
        assert_eq!(p.m, 2);
        assert_eq!(p.min_step, 1);
        assert_eq!(p.seed, 0);
        assert!(p.random_hist.is_none());
    }

    #[test]
    fn partial_input_keeps_defaults() {
        let p: EvalParams = serde_json::from_str("{\"threshold\": 0.9}").unwrap();
        assert_eq!(p.threshold, 0.9);
        assert_eq!(p.k, 4);
    }
}
