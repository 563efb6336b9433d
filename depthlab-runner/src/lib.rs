//! DepthLab Runner — evaluation, sweeps and comparisons over anytime
//! reasoning trajectories.
//!
//! This crate builds on `depthlab-core` to provide:
//! - Policy evaluation with aggregate quality, cost and stability metrics
//! - The oracle upper bound
//! - Confidence-threshold sweeps, budget matching and dev/test tuning
//! - Regression / fix-rate / flip analysis across two pipelines
//! - Paired bootstrap confidence intervals
//! - TOML run configuration and artifact export

pub mod bootstrap;
pub mod compare;
pub mod config;
pub mod evaluator;
pub mod export;
pub mod metrics;
pub mod oracle;
pub mod sweep;

pub use bootstrap::{paired_bootstrap, BootstrapConfig, BootstrapError, DeltaEstimate, PairedComparison};
pub use compare::{last_step_flip_rate, regression_analysis, RegressionAnalysis, RegressionCase};
pub use config::{ConfigError, RunConfig};
pub use evaluator::{evaluate, evaluate_policy, EvalError, EvalReport, ExampleOutcome};
pub use metrics::EvalMetrics;
pub use oracle::evaluate_oracle;
pub use sweep::{
    best_by_accuracy, select_for_targets, split_dev_test, tune_on_dev_report_on_test,
    BudgetSelection, DevTestSplit, SplitReport, SweepPoint, ThresholdGrid, ThresholdSweep,
};
