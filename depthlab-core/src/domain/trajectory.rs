//! Checkpoints and trajectories — the normalized, immutable input to every
//! stopping policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One observation at a reasoning depth.
///
/// The depth itself is implied by position in the owning [`Trajectory`]
/// (index 0 is depth 1), which makes "ordered, unique, starting at 1" hold by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Normalized answer string.
    pub ans: String,
    /// Self-reported confidence in [0, 1]. Absent confidences are stored as 0.0.
    pub conf: f64,
    /// Token cost of producing this checkpoint, when the exporter recorded it.
    pub tokens: Option<u64>,
}

impl Checkpoint {
    pub fn new(ans: impl Into<String>, conf: f64) -> Self {
        Self {
            ans: ans.into(),
            conf,
            tokens: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

/// Errors from trajectory construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrajectoryError {
    #[error("trajectory '{id}' has no checkpoints")]
    Empty { id: String },
}

/// One example's full anytime record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectoryRecord")]
pub struct Trajectory {
    id: String,
    gold: String,
    checkpoints: Vec<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

/// Serialized shape of a [`Trajectory`], checked through [`Trajectory::new`].
#[derive(Deserialize)]
struct TrajectoryRecord {
    id: String,
    gold: String,
    checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    problem: Option<String>,
}

impl TryFrom<TrajectoryRecord> for Trajectory {
    type Error = TrajectoryError;

    fn try_from(record: TrajectoryRecord) -> Result<Self, Self::Error> {
        let trajectory = Trajectory::new(record.id, record.gold, record.checkpoints)?;
        Ok(match record.problem {
            Some(problem) => trajectory.with_problem(problem),
            None => trajectory,
        })
    }
}

impl Trajectory {
    /// Build a trajectory from normalized parts. Fails when `checkpoints` is empty.
    pub fn new(
        id: impl Into<String>,
        gold: impl Into<String>,
        checkpoints: Vec<Checkpoint>,
    ) -> Result<Self, TrajectoryError> {
        let id = id.into();
        if checkpoints.is_empty() {
            return Err(TrajectoryError::Empty { id });
        }
        Ok(Self {
            id,
            gold: gold.into(),
            checkpoints,
            problem: None,
        })
    }

    /// Attach the problem text (used only for reporting).
    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gold(&self) -> &str {
        &self.gold
    }

    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Number of checkpoints, T. Always >= 1.
    pub fn max_depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Checkpoint at a 1-based depth.
    pub fn checkpoint(&self, depth: usize) -> Option<&Checkpoint> {
        depth.checked_sub(1).and_then(|i| self.checkpoints.get(i))
    }

    /// Answer at a 1-based depth, clamped into `[1, T]`.
    pub fn answer_at(&self, depth: usize) -> &str {
        &self.checkpoints[self.clamp_depth(depth) - 1].ans
    }

    pub fn clamp_depth(&self, depth: usize) -> usize {
        depth.clamp(1, self.max_depth())
    }

    /// Exact post-normalization correctness at a depth.
    pub fn is_correct_at(&self, depth: usize) -> bool {
        self.answer_at(depth) == self.gold
    }

    /// True when every checkpoint recorded its token cost.
    pub fn has_token_counts(&self) -> bool {
        self.checkpoints.iter().all(|c| c.tokens.is_some())
    }

    /// Cumulative cost through each depth (inclusive), saturating at `u64::MAX`.
    ///
    /// If any checkpoint lacks a token count, the whole trajectory falls back
    /// to one unit per step, so the cumulative cost through depth `s` is `s`.
    pub fn cumulative_tokens(&self) -> Vec<u64> {
        if self.has_token_counts() {
            self.checkpoints
                .iter()
                .scan(0u64, |running, c| {
                    *running = running.saturating_add(c.tokens.unwrap_or(0));
                    Some(*running)
                })
                .collect()
        } else {
            (1..=self.max_depth() as u64).collect()
        }
    }

    /// Cumulative cost through a 1-based depth (clamped).
    pub fn tokens_through(&self, depth: usize) -> u64 {
        let depth = self.clamp_depth(depth);
        self.cumulative_tokens()
            .get(depth - 1)
            .copied()
            .unwrap_or(depth as u64)
    }

    /// True if the answer changes anywhere within depths `1..=depth`.
    pub fn answer_changes_through(&self, depth: usize) -> bool {
        let depth = self.clamp_depth(depth);
        self.checkpoints[..depth]
            .windows(2)
            .any(|pair| pair[0].ans != pair[1].ans)
    }

    /// True if some depth strictly before `depth` was exactly correct.
    pub fn correct_before(&self, depth: usize) -> bool {
        let depth = self.clamp_depth(depth);
        self.checkpoints[..depth - 1]
            .iter()
            .any(|c| c.ans == self.gold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traj(answers: &[&str], gold: &str) -> Trajectory {
        let cps = answers.iter().map(|a| Checkpoint::new(*a, 0.5)).collect();
        Trajectory::new("ex", gold, cps).unwrap()
    }

    #[test]
    fn empty_trajectory_is_rejected() {
        let err = Trajectory::new("ex-1", "5", Vec::new()).unwrap_err();
        assert_eq!(err, TrajectoryError::Empty { id: "ex-1".into() });
    }

    #[test]
    fn depths_are_one_based() {
        let t = traj(&["7", "12", "9"], "12");
        assert_eq!(t.max_depth(), 3);
        assert_eq!(t.checkpoint(1).unwrap().ans, "7");
        assert_eq!(t.checkpoint(3).unwrap().ans, "9");
        assert!(t.checkpoint(0).is_none());
        assert!(t.checkpoint(4).is_none());
        assert!(t.is_correct_at(2));
        assert!(!t.is_correct_at(3));
    }

    #[test]
    fn unit_cost_fallback_when_any_count_missing() {
        let cps = vec![
            Checkpoint::new("1", 0.1).with_tokens(100),
            Checkpoint::new("1", 0.2),
            Checkpoint::new("1", 0.3).with_tokens(50),
        ];
        let t = Trajectory::new("ex", "1", cps).unwrap();
        assert!(!t.has_token_counts());
        assert_eq!(t.cumulative_tokens(), vec![1, 2, 3]);
        assert_eq!(t.tokens_through(2), 2);
    }

    #[test]
    fn recorded_costs_accumulate() {
        let cps = vec![
            Checkpoint::new("1", 0.1).with_tokens(96),
            Checkpoint::new("1", 0.2).with_tokens(160),
            Checkpoint::new("1", 0.3).with_tokens(224),
        ];
        let t = Trajectory::new("ex", "1", cps).unwrap();
        assert_eq!(t.cumulative_tokens(), vec![96, 256, 480]);
        assert_eq!(t.tokens_through(2), 256);
        assert_eq!(t.tokens_through(9), 480);
    }

    #[test]
    fn answer_change_window_includes_stop_depth() {
        let t = traj(&["5", "5", "6", "6"], "6");
        assert!(!t.answer_changes_through(1));
        assert!(!t.answer_changes_through(2));
        assert!(t.answer_changes_through(3));
    }

    #[test]
    fn correct_before_ignores_stop_depth() {
        let t = traj(&["7", "12", "12", "9"], "12");
        assert!(!t.correct_before(1));
        assert!(!t.correct_before(2));
        assert!(t.correct_before(3));
        assert!(t.correct_before(4));
    }

    #[test]
    fn huge_costs_saturate() {
        let cps = vec![
            Checkpoint::new("1", 0.1).with_tokens(u64::MAX),
            Checkpoint::new("1", 0.2).with_tokens(2),
        ];
        let t = Trajectory::new("ex", "1", cps).unwrap();
        assert_eq!(t.cumulative_tokens(), vec![u64::MAX, u64::MAX]);
        assert_eq!(t.tokens_through(2), u64::MAX);
    }

    #[test]
    fn deserialize_rejects_empty_checkpoints() {
        let res = serde_json::from_str::<Trajectory>(r#"{"id":"a","gold":"1","checkpoints":[]}"#);
        let err = res.unwrap_err();
        assert!(err.to_string().contains("has no checkpoints"));
    }

    #[test]
    fn serde_round_trip_keeps_problem() {
        let t = traj(&["7", "12"], "12").with_problem("2 + 10");
        let json = serde_json::to_string(&t).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.problem(), Some("2 + 10"));
    }
}
