//! Cross-system comparison: regressions in a full pipeline, whether an
//! ablated pipeline fixes them, and last-step answer flipping.

use std::collections::HashMap;

use depthlab_core::domain::Trajectory;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A trajectory that ends wrong after some earlier depth was correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionCase {
    pub id: String,
    pub gold: String,
    /// Full pipeline's answer at each depth.
    pub full_answers: Vec<String>,
    /// Full pipeline's confidence at its last depth.
    pub full_last_conf: f64,
    /// Ablated pipeline's last answer, when it has this id.
    pub ablated_last: Option<String>,
    pub ablated_correct: Option<bool>,
    pub problem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAnalysis {
    /// Trajectories in the full set.
    pub total: usize,
    pub cases: Vec<RegressionCase>,
    /// `cases / total`.
    pub rate: f64,
    /// Cases whose id also appears in the ablated set.
    pub matched: usize,
    /// Matched cases the ablated pipeline gets right at its last depth.
    pub fixed: usize,
    pub still_wrong: usize,
    /// `fixed / matched`.
    pub fix_rate: f64,
}

/// True when the last depth is wrong and some earlier depth was correct.
pub fn is_regression(trajectory: &Trajectory) -> bool {
    let last = trajectory.max_depth();
    !trajectory.is_correct_at(last) && trajectory.correct_before(last)
}

/// Find regression cases in `full` and check each against `ablated` by id.
pub fn regression_analysis(full: &[Trajectory], ablated: &[Trajectory]) -> RegressionAnalysis {
    let ablated_by_id: HashMap<&str, &Trajectory> =
        ablated.iter().map(|t| (t.id(), t)).collect();

    let cases: Vec<RegressionCase> = full
        .iter()
        .filter(|t| is_regression(t))
        .map(|t| {
            let other = ablated_by_id.get(t.id());
            RegressionCase {
                id: t.id().to_string(),
                gold: t.gold().to_string(),
                full_answers: t.checkpoints().iter().map(|c| c.ans.clone()).collect(),
                full_last_conf: t.checkpoint(t.max_depth()).map_or(0.0, |c| c.conf),
                ablated_last: other.map(|a| a.answer_at(a.max_depth()).to_string()),
                ablated_correct: other.map(|a| a.is_correct_at(a.max_depth())),
                problem: t.problem().map(str::to_string),
            }
        })
        .collect();

    let matched = cases.iter().filter(|c| c.ablated_correct.is_some()).count();
    let fixed = cases
        .iter()
        .filter(|c| c.ablated_correct == Some(true))
        .count();
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    let analysis = RegressionAnalysis {
        total: full.len(),
        rate: ratio(cases.len(), full.len()),
        matched,
        fixed,
        still_wrong: matched - fixed,
        fix_rate: ratio(fixed, matched),
        cases,
    };

    info!(
        total = analysis.total,
        regressions = analysis.cases.len(),
        fixed = analysis.fixed,
        "regression analysis"
    );
    analysis
}

/// Fraction of trajectories with at least two depths whose last two answers
/// differ. Unlike the evaluator's `flip_rate`, this ignores where a policy
/// would stop.
pub fn last_step_flip_rate(trajectories: &[Trajectory]) -> f64 {
    let (flips, eligible) = trajectories
        .iter()
        .filter(|t| t.max_depth() >= 2)
        .fold((0usize, 0usize), |(f, n), t| {
            let last = t.max_depth();
            let flipped = t.answer_at(last - 1) != t.answer_at(last);
            (f + usize::from(flipped), n + 1)
        });
    if eligible == 0 {
        0.0
    } else {
        flips as f64 / eligible as f64
    }
}
