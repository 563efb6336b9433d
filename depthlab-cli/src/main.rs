//! DepthLab CLI — evaluate, sweep and compare depth-stopping policies.
//!
//! Commands:
//! - `eval` — run one stopping policy (or the oracle) over a JSONL file
//! - `sweep` — confidence-threshold sweep with budget matching and dev/test tuning
//! - `compare` — regression analysis and paired bootstrap between two pipelines
//! - `hist` — extract a stop histogram from a metrics file
//! - `summary` — append a metrics file to a summary CSV
//! - `example-config` — print a sample TOML run configuration
//!
//! Machine-readable results go to stdout as JSON; logs and human summaries
//! go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depthlab_core::domain::Trajectory;
use depthlab_core::ingest::load_trajectories;
use depthlab_core::policy::{EvalParams, PolicyKind};
use depthlab_runner::config::SweepConfig;
use depthlab_runner::export::{
    append_summary_row, read_histogram, read_metrics_json, regression_cases_tsv,
    sweep_points_csv, write_histogram, write_metrics_json, write_text, SummaryRow,
    MAX_CASE_ROWS,
};
use depthlab_runner::{
    best_by_accuracy, evaluate, evaluate_policy, last_step_flip_rate, paired_bootstrap,
    regression_analysis, select_for_targets, split_dev_test, tune_on_dev_report_on_test,
    BootstrapConfig, BootstrapError, BudgetSelection, DeltaEstimate, DevTestSplit,
    PairedComparison, RunConfig, SweepPoint, ThresholdSweep,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "depthlab",
    about = "DepthLab — depth-stopping policy evaluation for anytime reasoning"
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// TOML run configuration. Flags override its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one stopping policy over a JSONL file.
    Eval {
        /// JSONL trajectories (one per record, or one step per record).
        #[arg(long)]
        data: PathBuf,

        /// Policy: fixed, conf, stability, random, argmax_conf, oracle.
        #[arg(long)]
        policy: String,

        /// Depth for the fixed policy.
        #[arg(long)]
        k: Option<usize>,

        /// Confidence threshold for the conf policy.
        #[arg(long)]
        threshold: Option<f64>,

        /// Consecutive identical answers required by the stability policy.
        #[arg(long)]
        m: Option<usize>,

        /// Earliest depth the stability policy may stop at.
        #[arg(long)]
        min_step: Option<usize>,

        /// Stop histogram (JSON array) driving the random policy.
        #[arg(long)]
        random_hist_path: Option<PathBuf>,

        /// RNG seed for the random policy.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the metrics JSON here as well as to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sweep confidence thresholds and pick budget-matched operating points.
    Sweep {
        /// Trajectories to tune on.
        #[arg(long)]
        dev: PathBuf,

        /// Held-out trajectories to report selected thresholds on.
        #[arg(long, conflicts_with = "dev_frac")]
        test: Option<PathBuf>,

        #[arg(long)]
        threshold_min: Option<f64>,

        #[arg(long)]
        threshold_max: Option<f64>,

        /// Number of grid points.
        #[arg(long)]
        n: Option<usize>,

        /// Target mean depths, comma separated (e.g. 1,2,3,4).
        #[arg(long, value_delimiter = ',')]
        target_mean_steps: Option<Vec<f64>>,

        /// Split `--dev` into dev/test with this dev share.
        #[arg(long)]
        dev_frac: Option<f64>,

        /// Seed for the dev/test split.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the full sweep grid as CSV.
        #[arg(long)]
        out_grid: Option<PathBuf>,
    },
    /// Compare a full pipeline against an ablated one.
    Compare {
        #[arg(long)]
        full: PathBuf,

        #[arg(long)]
        ablated: PathBuf,

        /// Threshold of the early-stopping system bootstrapped against always-last.
        #[arg(long)]
        tau: Option<f64>,

        /// Bootstrap resamples.
        #[arg(long)]
        n_boot: Option<usize>,

        /// Bootstrap seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Write regression cases as TSV.
        #[arg(long)]
        cases_out: Option<PathBuf>,
    },
    /// Extract the stop histogram from a metrics JSON file.
    Hist {
        #[arg(long)]
        metrics: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
    /// Append one summary row for a metrics JSON file.
    Summary {
        #[arg(long)]
        metrics: PathBuf,

        #[arg(long)]
        csv: PathBuf,

        /// Split label, e.g. dev or test.
        #[arg(long)]
        split: String,

        /// Budget label, e.g. B2.
        #[arg(long)]
        budget_tag: String,
    },
    /// Print a sample TOML run configuration.
    ExampleConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::Eval {
            data,
            policy,
            k,
            threshold,
            m,
            min_step,
            random_hist_path,
            seed,
            out,
        } => {
            let mut params = config.eval;
            if let Some(k) = k {
                params.k = k;
            }
            if let Some(threshold) = threshold {
                params.threshold = threshold;
            }
            if let Some(m) = m {
                params.m = m;
            }
            if let Some(min_step) = min_step {
                params.min_step = min_step;
            }
            if let Some(seed) = seed {
                params.seed = seed;
            }
            if let Some(path) = random_hist_path {
                params.random_hist = Some(read_histogram(&path)?);
            }
            run_eval(&data, &policy, &params, out.as_deref())
        }
        Commands::Sweep {
            dev,
            test,
            threshold_min,
            threshold_max,
            n,
            target_mean_steps,
            dev_frac,
            seed,
            out_grid,
        } => {
            let mut sweep = config.sweep;
            if let Some(v) = threshold_min {
                sweep.threshold_min = v;
            }
            if let Some(v) = threshold_max {
                sweep.threshold_max = v;
            }
            if let Some(v) = n {
                sweep.n = v;
            }
            if let Some(v) = target_mean_steps {
                sweep.target_mean_steps = v;
            }
            if dev_frac.is_some() {
                sweep.dev_frac = dev_frac;
            }
            let mut params = config.eval;
            if let Some(seed) = seed {
                params.seed = seed;
            }
            let split = split_source(test, &sweep);
            run_sweep(&dev, split, &sweep, &params, out_grid.as_deref())
        }
        Commands::Compare {
            full,
            ablated,
            tau,
            n_boot,
            seed,
            cases_out,
        } => {
            let tau = tau.unwrap_or(config.compare.tau);
            let params = config.eval;
            let mut boot = config.bootstrap;
            if let Some(n) = n_boot {
                boot.n_resamples = n;
            }
            if let Some(seed) = seed {
                boot.seed = seed;
            }
            run_compare(&full, &ablated, &params, tau, &boot, cases_out.as_deref())
        }
        Commands::Hist { metrics, out } => {
            let metrics = read_metrics_json(&metrics)?;
            write_histogram(&out, &metrics.stop_histogram)?;
            info!(
                policy = %metrics.policy,
                len = metrics.stop_histogram.len(),
                mean_depth = metrics.stop_histogram.mean_depth(),
                "histogram written to {}",
                out.display()
            );
            Ok(())
        }
        Commands::Summary {
            metrics,
            csv,
            split,
            budget_tag,
        } => {
            let metrics = read_metrics_json(&metrics)?;
            append_summary_row(&csv, &SummaryRow::new(&split, &budget_tag, &metrics))?;
            info!(policy = %metrics.policy, "summary row appended to {}", csv.display());
            Ok(())
        }
        Commands::ExampleConfig => {
            print_example_config();
            Ok(())
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set subscriber")
}

fn load_data(path: &Path) -> Result<Vec<Trajectory>> {
    let normalized = load_trajectories(path)
        .with_context(|| format!("failed to load trajectories from {}", path.display()))?;
    if !normalized.rejected.is_empty() {
        warn!(
            rejected = normalized.rejected.len(),
            "skipped unusable records in {}",
            path.display()
        );
    }
    Ok(normalized.trajectories)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

// ─── eval ───────────────────────────────────────────────────────────

fn run_eval(data: &Path, policy: &str, params: &EvalParams, out: Option<&Path>) -> Result<()> {
    let trajectories = load_data(data)?;
    let report = evaluate(&trajectories, policy, params)?;

    let json = report
        .metrics
        .to_json_pretty()
        .context("failed to serialize metrics")?;
    println!("{json}");

    if let Some(path) = out {
        write_metrics_json(path, &report.metrics)?;
        info!("metrics written to {}", path.display());
    }
    Ok(())
}

// ─── sweep ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum SplitSource {
    Files(PathBuf),
    Fraction(f64),
}

/// A `--test` file wins over a dev share; a dev share may come from the
/// flag or from `[sweep] dev_frac`.
fn split_source(test: Option<PathBuf>, sweep: &SweepConfig) -> Option<SplitSource> {
    match (test, sweep.dev_frac) {
        (Some(test), _) => Some(SplitSource::Files(test)),
        (None, Some(frac)) => Some(SplitSource::Fraction(frac)),
        (None, None) => None,
    }
}

#[derive(Serialize)]
struct SweepOutput {
    points: usize,
    selections: Vec<BudgetSelection>,
    best: Option<SweepPoint>,
}

fn run_sweep(
    dev: &Path,
    split: Option<SplitSource>,
    sweep: &SweepConfig,
    params: &EvalParams,
    out_grid: Option<&Path>,
) -> Result<()> {
    let grid = sweep.grid();
    let sweeper = ThresholdSweep::new(params.clone()).with_parallelism(sweep.parallel);
    let dev_data = load_data(dev)?;

    let split = match split {
        Some(SplitSource::Files(test)) => DevTestSplit {
            dev: dev_data,
            test: load_data(&test)?,
        },
        Some(SplitSource::Fraction(frac)) => split_dev_test(&dev_data, frac, params.seed),
        None => {
            let points = sweeper.run(&dev_data, &grid)?;
            write_grid(out_grid, &points)?;
            return print_json(&SweepOutput {
                points: points.len(),
                selections: select_for_targets(&points, &sweep.target_mean_steps),
                best: best_by_accuracy(&points),
            });
        }
    };

    let report = tune_on_dev_report_on_test(&split, &sweeper, &grid, &sweep.target_mean_steps)?;
    write_grid(out_grid, &report.dev_points)?;
    print_json(&report)
}

fn write_grid(path: Option<&Path>, points: &[SweepPoint]) -> Result<()> {
    if let Some(path) = path {
        write_text(path, &sweep_points_csv(points)?)?;
        info!(points = points.len(), "sweep grid written to {}", path.display());
    }
    Ok(())
}

// ─── compare ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompareOutput {
    total: usize,
    regressions: usize,
    regression_rate: f64,
    matched: usize,
    fixed: usize,
    still_wrong: usize,
    fix_rate: f64,
    last_step_flip_rate_full: f64,
    last_step_flip_rate_ablated: f64,
    tau: f64,
    early_stop_vs_last: PairedComparison,
    ablated_vs_full: Option<PairedComparison>,
}

fn always_last(base: &EvalParams, trajectories: &[Trajectory]) -> EvalParams {
    let last = trajectories.iter().map(Trajectory::max_depth).max().unwrap_or(1);
    base.clone().with_k(last)
}

fn run_compare(
    full_path: &Path,
    ablated_path: &Path,
    base: &EvalParams,
    tau: f64,
    boot: &BootstrapConfig,
    cases_out: Option<&Path>,
) -> Result<()> {
    let full = load_data(full_path)?;
    let ablated = load_data(ablated_path)?;

    let analysis = regression_analysis(&full, &ablated);
    if let Some(path) = cases_out {
        write_text(path, &regression_cases_tsv(&analysis.cases, MAX_CASE_ROWS)?)?;
        info!(
            cases = analysis.cases.len().min(MAX_CASE_ROWS),
            "regression cases written to {}",
            path.display()
        );
    }

    let full_last = evaluate_policy(&full, PolicyKind::Fixed, &always_last(base, &full))?;
    let early = evaluate_policy(
        &full,
        PolicyKind::Confidence,
        &base.clone().with_threshold(tau),
    )?;
    let early_stop_vs_last = paired_bootstrap(&early.outcomes, &full_last.outcomes, boot)
        .context("bootstrap of early stopping vs always-last failed")?;
    print_comparison(&format!("conf(τ={tau}) vs always-last"), &early_stop_vs_last);

    let ablated_last = evaluate_policy(&ablated, PolicyKind::Fixed, &always_last(base, &ablated))?;
    let ablated_vs_full = match paired_bootstrap(&ablated_last.outcomes, &full_last.outcomes, boot)
    {
        Ok(cmp) => {
            print_comparison("ablated-last vs full-last", &cmp);
            Some(cmp)
        }
        Err(BootstrapError::NoOverlap) => {
            warn!("full and ablated sets share no example ids; skipping their bootstrap");
            None
        }
        Err(err) => return Err(err.into()),
    };

    print_json(&CompareOutput {
        total: analysis.total,
        regressions: analysis.cases.len(),
        regression_rate: analysis.rate,
        matched: analysis.matched,
        fixed: analysis.fixed,
        still_wrong: analysis.still_wrong,
        fix_rate: analysis.fix_rate,
        last_step_flip_rate_full: last_step_flip_rate(&full),
        last_step_flip_rate_ablated: last_step_flip_rate(&ablated),
        tau,
        early_stop_vs_last,
        ablated_vs_full,
    })
}

fn print_comparison(label: &str, cmp: &PairedComparison) {
    eprintln!();
    eprintln!("=== {label} ===");
    eprintln!("Paired examples: {}", cmp.n);
    eprintln!("Resamples:       {}", cmp.n_resamples);
    print_delta("Accuracy", &cmp.accuracy);
    print_delta("Mean depth", &cmp.mean_depth);
    print_delta("Regression", &cmp.regression);
}

fn print_delta(name: &str, d: &DeltaEstimate) {
    eprintln!(
        "{name:<12} Δ={:+.4}  95% CI [{:+.4}, {:+.4}]  P(better)={:.3}",
        d.observed, d.ci_lower, d.ci_upper, d.prob_improvement
    );
}

// ─── example-config ─────────────────────────────────────────────────

const EXAMPLE_CONFIG: &str = r#"# depthlab run configuration
# Every table and key is optional; command-line flags override these values.

[eval]
k = 4            # fixed policy depth
threshold = 0.8  # conf policy threshold
m = 2            # stability: consecutive identical answers
min_step = 1     # stability: earliest stopping depth
seed = 0         # random policy / dev-test split seed
# random_hist = [0.1, 0.2, 0.3, 0.4]

[sweep]
threshold_min = 0.50
threshold_max = 0.99
n = 80
target_mean_steps = [1.0, 2.0, 3.0, 4.0]
# dev_frac = 0.5   # split a single --dev file into dev/test
parallel = true

[compare]
tau = 0.71

[bootstrap]
n_resamples = 20000
seed = 0
"#;

fn print_example_config() {
    println!("{EXAMPLE_CONFIG}");
}
