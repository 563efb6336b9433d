//! Stop-depth histogram: a probability mass over depths `1..=len`.

use serde::{Deserialize, Serialize};

/// Entry `i` is the probability of stopping at depth `i + 1`.
///
/// Serialized as a bare JSON array of floats so a histogram written by one
/// run can be fed straight back into the random policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopHistogram(Vec<f64>);

impl StopHistogram {
    pub fn new(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    pub fn uniform(len: usize) -> Self {
        if len == 0 {
            return Self::default();
        }
        Self(vec![1.0 / len as f64; len])
    }

    /// Empirical distribution of stop depths, sized to the deepest stop seen.
    ///
    /// An empty slice gives an empty histogram.
    pub fn from_stop_depths(depths: &[usize]) -> Self {
        let len = depths.iter().copied().max().unwrap_or(0);
        Self::from_stop_depths_with_len(depths, len)
    }

    /// Empirical distribution over `1..=len`, normalized by the number of
    /// depths. Depths outside the range are ignored; if none land inside it
    /// the result is uniform.
    pub fn from_stop_depths_with_len(depths: &[usize], len: usize) -> Self {
        if len == 0 {
            return Self::default();
        }
        let mut counts = vec![0usize; len];
        for &depth in depths {
            if (1..=len).contains(&depth) {
                counts[depth - 1] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        if total == 0 {
            return Self::uniform(len);
        }
        Self(
            counts
                .into_iter()
                .map(|c| c as f64 / depths.len() as f64)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Expected stop depth under this distribution.
    pub fn mean_depth(&self) -> f64 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, p)| (i + 1) as f64 * p)
            .sum()
    }
}

impl From<Vec<f64>> for StopHistogram {
    fn from(weights: Vec<f64>) -> Self {
        Self(weights)
    }
}
