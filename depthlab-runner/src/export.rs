//! Artifact export — metrics JSON, stop histograms, summary CSV rows, sweep
//! grids and regression-case TSV.

use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use depthlab_core::policy::StopHistogram;
use serde::Serialize;

use crate::compare::RegressionCase;
use crate::metrics::EvalMetrics;
use crate::sweep::SweepPoint;

/// Default cap on exported regression-case rows.
pub const MAX_CASE_ROWS: usize = 300;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn write_metrics_json(path: &Path, metrics: &EvalMetrics) -> Result<()> {
    let json = metrics
        .to_json_pretty()
        .context("failed to serialize metrics to JSON")?;
    write_text(path, &json)
}

pub fn read_metrics_json(path: &Path) -> Result<EvalMetrics> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics {}", path.display()))?;
    EvalMetrics::from_json(&content)
        .with_context(|| format!("failed to parse metrics {}", path.display()))
}

pub fn write_histogram(path: &Path, hist: &StopHistogram) -> Result<()> {
    let json = serde_json::to_string_pretty(hist).context("failed to serialize histogram")?;
    write_text(path, &json)
}

/// Read a histogram file: a bare JSON array of floats.
pub fn read_histogram(path: &Path) -> Result<StopHistogram> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read histogram {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("histogram {} must be a JSON array of numbers", path.display()))
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One line of the cross-run summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub split: String,
    pub policy: String,
    pub budget_tag: String,
    /// `k=..;thr=..;m=..;min_step=..`
    pub params: String,
    pub acc: f64,
    pub mean_steps: f64,
    pub p95_steps: f64,
    pub mean_tokens: f64,
    pub p95_tokens: f64,
    pub flip_rate: f64,
    pub regress_at_stop_rate: f64,
}

impl SummaryRow {
    pub fn new(split: &str, budget_tag: &str, metrics: &EvalMetrics) -> Self {
        Self {
            split: split.to_string(),
            policy: metrics.policy.clone(),
            budget_tag: budget_tag.to_string(),
            params: format!(
                "k={};thr={};m={};min_step={}",
                metrics.k, metrics.threshold, metrics.m, metrics.min_step
            ),
            acc: metrics.acc,
            mean_steps: metrics.mean_steps,
            p95_steps: metrics.p95_steps,
            mean_tokens: metrics.mean_tokens,
            p95_tokens: metrics.p95_tokens,
            flip_rate: metrics.flip_rate,
            regress_at_stop_rate: metrics.regress_at_stop_rate,
        }
    }
}

/// Append a summary row, writing the header first if the file is new or empty.
pub fn append_summary_row(path: &Path, row: &SummaryRow) -> Result<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    wtr.serialize(row).context("failed to write summary row")?;
    wtr.flush().context("failed to flush summary CSV")?;
    Ok(())
}

/// Sweep grid as CSV: threshold, acc, mean_steps, mean_tokens.
pub fn sweep_points_csv(points: &[SweepPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for p in points {
        wtr.serialize(p)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── TSV ────────────────────────────────────────────────────────────

/// Regression cases as TSV, at most `max_rows` rows.
///
/// Columns: uid, ablated_correct_last, ablated_pred_last, full_pred_t1 ..
/// full_pred_tN (N = deepest case), full_conf_last, gold, problem. Tabs and
/// newlines inside the problem text become spaces.
pub fn regression_cases_tsv(cases: &[RegressionCase], max_rows: usize) -> Result<String> {
    let rows = &cases[..cases.len().min(max_rows)];
    let depth = rows.iter().map(|c| c.full_answers.len()).max().unwrap_or(0);

    let mut header = vec![
        "uid".to_string(),
        "ablated_correct_last".to_string(),
        "ablated_pred_last".to_string(),
    ];
    header.extend((1..=depth).map(|t| format!("full_pred_t{t}")));
    header.extend(["full_conf_last", "gold", "problem"].map(String::from));

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(vec![]);
    wtr.write_record(&header)?;

    for c in rows {
        let mut record = vec![
            flatten(&c.id),
            c.ablated_correct.map(|b| b.to_string()).unwrap_or_default(),
            c.ablated_last.as_deref().map(flatten).unwrap_or_default(),
        ];
        record.extend((0..depth).map(|i| c.full_answers.get(i).map(|a| flatten(a)).unwrap_or_default()));
        record.push(c.full_last_conf.to_string());
        record.push(flatten(&c.gold));
        record.push(c.problem.as_deref().map(flatten).unwrap_or_default());
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush TSV writer")?;
    String::from_utf8(data).context("TSV output is not valid UTF-8")
}

fn flatten(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write text, creating parent directories as needed.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthlab_core::policy::EvalParams;

    fn metrics() -> EvalMetrics {
        EvalMetrics::from_outcomes(
            "conf",
            &EvalParams::default(),
            &[],
            StopHistogram::new(vec![0.25, 0.75]),
        )
    }

    fn case(id: &str, answers: &[&str], problem: Option<&str>) -> RegressionCase {
        RegressionCase {
            id: id.to_string(),
            gold: "12".to_string(),
            full_answers: answers.iter().map(|a| a.to_string()).collect(),
            full_last_conf: 0.9,
            ablated_last: Some("12".to_string()),
            ablated_correct: Some(true),
            problem: problem.map(str::to_string),
        }
    }

    #[test]
    fn metrics_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/metrics.json");
        write_metrics_json(&path, &metrics()).unwrap();
        assert_eq!(read_metrics_json(&path).unwrap(), metrics());
    }

    #[test]
    fn histogram_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.json");
        write_histogram(&path, &metrics().stop_histogram).unwrap();
        assert_eq!(read_histogram(&path).unwrap().weights(), &[0.25, 0.75]);
    }

    #[test]
    fn histogram_must_be_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.json");
        fs::write(&path, "{\"a\": 1}").unwrap();
        assert!(read_histogram(&path).is_err());
    }

    #[test]
    fn summary_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let row = SummaryRow::new("test", "B2", &metrics());
        append_summary_row(&path, &row).unwrap();
        append_summary_row(&path, &row).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("split,policy,budget_tag,params"));
        assert!(lines[1].starts_with("test,conf,B2,k=4;thr=0.8;m=2;min_step=1,"));
    }

    #[test]
    fn case_tsv_pads_short_trajectories_and_caps_rows() {
        let cases = vec![
            case("a", &["12", "12", "9"], Some("two\tlines\nhere")),
            case("b", &["12", "9"], None),
            case("c", &["12", "9"], None),
        ];
        let tsv = regression_cases_tsv(&cases, 2).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "uid\tablated_correct_last\tablated_pred_last\tfull_pred_t1\tfull_pred_t2\tfull_pred_t3\tfull_conf_last\tgold\tproblem"
        );
        assert_eq!(lines[1], "a\ttrue\t12\t12\t12\t9\t0.9\t12\ttwo lines here");
        assert_eq!(lines[2], "b\ttrue\t12\t12\t9\t\t0.9\t12\t");
    }

    #[test]
    fn sweep_csv_has_header() {
        let points = vec![SweepPoint {
            threshold: 0.5,
            acc: 0.7,
            mean_steps: 1.5,
            mean_tokens: 120.0,
        }];
        let csv = sweep_points_csv(&points).unwrap();
        assert!(csv.starts_with("threshold,acc,mean_steps,mean_tokens\n0.5,0.7,1.5,120.0"));
    }
}
