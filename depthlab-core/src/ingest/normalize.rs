//! Trajectory normalizer — heterogeneous JSONL records in, uniform
//! [`Trajectory`] values out.
//!
//! Two input layouts are accepted:
//! - **Trajectory per record**: each record carries a step list (`steps`,
//!   `trajectory`, `pred_steps` or `checkpoints`).
//! - **Flat steps**: one record per (example, depth). Rows are grouped by
//!   identifier, then secondary index, then a hash of the problem text, and each
//!   group is ordered by its step index.
//!
//! Leniencies, applied here and nowhere else:
//! - A missing confidence becomes 0.0, i.e. maximal uncertainty. Confidence
//!   threshold policies therefore keep going on such steps rather than stop.
//! - Finite confidences outside [0, 1] are clamped.
//! - Missing token counts are kept as `None`; the cost fallback lives on
//!   [`Trajectory::cumulative_tokens`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::{normalize_answer_value, Checkpoint, Trajectory};

use super::aliases::{
    ANSWER, CONFIDENCE, GOLD_FLAT, GOLD_TRAJECTORY, INDEX, PROBLEM, STEPS, STEP_INDEX, TOKENS,
    UID,
};
use super::error::{IngestError, RecordError};
use super::jsonl::{read_jsonl, JsonlBatch, RawRecord};

/// Number of leading records inspected for a step-list field.
pub const DETECT_WINDOW: usize = 16;

/// Confidence assigned to steps that do not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.0;

/// Detected input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    TrajectoryPerRecord,
    FlatSteps,
}

/// Normalizer output: trajectories plus every record that was rejected.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub format: InputFormat,
    pub trajectories: Vec<Trajectory>,
    pub rejected: Vec<RecordError>,
}

enum Failure {
    Fatal(IngestError),
    Rejected(RecordError),
}

impl From<RecordError> for Failure {
    fn from(err: RecordError) -> Self {
        Failure::Rejected(err)
    }
}

/// Strict internal step, after alias resolution.
#[derive(Debug, Clone)]
struct ResolvedStep {
    ans: String,
    conf: f64,
    tokens: Option<u64>,
}

impl From<ResolvedStep> for Checkpoint {
    fn from(step: ResolvedStep) -> Self {
        Checkpoint {
            ans: step.ans,
            conf: step.conf,
            tokens: step.tokens,
        }
    }
}

/// Read and normalize a JSONL file.
pub fn load_trajectories(path: &Path) -> Result<Normalized, IngestError> {
    let batch = read_jsonl(path)?;
    normalize(batch)
}

/// Normalize a parsed batch, carrying over its parse failures.
pub fn normalize(batch: JsonlBatch) -> Result<Normalized, IngestError> {
    let mut normalized = normalize_records(&batch.records)?;
    let mut rejected = batch.rejected;
    rejected.append(&mut normalized.rejected);
    rejected.sort_by_key(RecordError::line);
    normalized.rejected = rejected;
    Ok(normalized)
}

/// Decide the layout from the first [`DETECT_WINDOW`] records.
pub fn detect_format(records: &[RawRecord]) -> InputFormat {
    let has_steps = records
        .iter()
        .take(DETECT_WINDOW)
        .filter_map(|r| r.value.as_object())
        .any(|obj| STEPS.any_present(obj));
    if has_steps {
        InputFormat::TrajectoryPerRecord
    } else {
        InputFormat::FlatSteps
    }
}

/// Normalize already-parsed records.
///
/// Fails with [`IngestError::MalformedTrajectory`] when a record's step list is
/// empty or a flat group has no row with a usable step index. Any other bad
/// record is skipped and reported in [`Normalized::rejected`].
pub fn normalize_records(records: &[RawRecord]) -> Result<Normalized, IngestError> {
    let format = detect_format(records);
    let (trajectories, rejected) = match format {
        InputFormat::TrajectoryPerRecord => normalize_per_record(records)?,
        InputFormat::FlatSteps => normalize_flat(records)?,
    };

    for err in &rejected {
        warn!(%err, "skipping record");
    }
    info!(
        format = ?format,
        trajectories = trajectories.len(),
        rejected = rejected.len(),
        "normalized trajectories"
    );

    Ok(Normalized {
        format,
        trajectories,
        rejected,
    })
}

// ─── Trajectory-per-record layout ────────────────────────────────────

fn normalize_per_record(
    records: &[RawRecord],
) -> Result<(Vec<Trajectory>, Vec<RecordError>), IngestError> {
    let mut trajectories = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (ordinal, record) in records.iter().enumerate() {
        match trajectory_from_record(ordinal, record) {
            Ok(t) => trajectories.push(t),
            Err(Failure::Rejected(err)) => rejected.push(err),
            Err(Failure::Fatal(err)) => return Err(err),
        }
    }

    Ok((trajectories, rejected))
}

fn trajectory_from_record(ordinal: usize, record: &RawRecord) -> Result<Trajectory, Failure> {
    let line = record.line;
    let obj = record
        .value
        .as_object()
        .ok_or(RecordError::NotAnObject { line })?;

    let id = UID
        .resolve(obj)
        .map(|(_, v)| identifier(v))
        .unwrap_or_else(|| format!("#{ordinal}"));
    let gold = GOLD_TRAJECTORY
        .resolve(obj)
        .map(|(_, v)| normalize_answer_value(v))
        .unwrap_or_default();

    let Some((key, raw_steps)) = STEPS.resolve(obj) else {
        return Err(Failure::Fatal(IngestError::MalformedTrajectory {
            id,
            reason: "record has no step list".into(),
        }));
    };
    let raw_steps = raw_steps
        .as_array()
        .ok_or(RecordError::StepsNotArray { line, key })?;
    if raw_steps.is_empty() {
        return Err(Failure::Fatal(IngestError::MalformedTrajectory {
            id,
            reason: format!("'{key}' is empty"),
        }));
    }

    let mut checkpoints: Vec<Checkpoint> = Vec::with_capacity(raw_steps.len());
    for (index, raw) in raw_steps.iter().enumerate() {
        let step_obj = raw
            .as_object()
            .ok_or(RecordError::StepNotObject { line, index })?;
        checkpoints.push(resolve_step(line, step_obj)?.into());
    }

    let trajectory =
        Trajectory::new(id, gold, checkpoints).map_err(|e| Failure::Fatal(e.into()))?;
    Ok(match problem_text(obj) {
        Some(problem) => trajectory.with_problem(problem),
        None => trajectory,
    })
}

// ─── Flat per-step layout ────────────────────────────────────────────

#[derive(Debug)]
struct FlatGroup {
    key: String,
    gold: Option<String>,
    problem: Option<String>,
    /// Keyed by step index; a repeated index keeps the last row.
    steps: BTreeMap<i64, ResolvedStep>,
    unindexed_rows: usize,
}

fn normalize_flat(
    records: &[RawRecord],
) -> Result<(Vec<Trajectory>, Vec<RecordError>), IngestError> {
    let mut groups: Vec<FlatGroup> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut rejected = Vec::new();

    for record in records {
        let row = match resolve_flat_row(record) {
            Ok(row) => row,
            Err(err) => {
                rejected.push(err);
                continue;
            }
        };

        let slot = *by_key.entry(row.key.clone()).or_insert_with(|| {
            groups.push(FlatGroup {
                key: row.key.clone(),
                gold: None,
                problem: None,
                steps: BTreeMap::new(),
                unindexed_rows: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        if row.gold.is_some() {
            group.gold = row.gold;
        }
        if group.problem.is_none() {
            group.problem = row.problem;
        }
        match row.index {
            Some(index) => {
                group.steps.insert(index, row.step);
            }
            None => group.unindexed_rows += 1,
        }
    }

    let mut trajectories = Vec::with_capacity(groups.len());
    for group in groups {
        if group.steps.is_empty() {
            return Err(IngestError::MalformedTrajectory {
                id: group.key,
                reason: format!(
                    "{} row(s) but no resolvable step index",
                    group.unindexed_rows
                ),
            });
        }
        let checkpoints = group.steps.into_values().map(Checkpoint::from).collect();
        let trajectory = Trajectory::new(group.key, group.gold.unwrap_or_default(), checkpoints)?;
        trajectories.push(match group.problem {
            Some(problem) => trajectory.with_problem(problem),
            None => trajectory,
        });
    }

    Ok((trajectories, rejected))
}

struct FlatRow {
    key: String,
    index: Option<i64>,
    gold: Option<String>,
    problem: Option<String>,
    step: ResolvedStep,
}

fn resolve_flat_row(record: &RawRecord) -> Result<FlatRow, RecordError> {
    let line = record.line;
    let obj = record
        .value
        .as_object()
        .ok_or(RecordError::NotAnObject { line })?;

    let key = group_key(obj).ok_or(RecordError::MissingIdentifier { line })?;
    let index = STEP_INDEX
        .resolve(obj)
        .map(|(_, v)| step_index(line, v))
        .transpose()?;
    let step = resolve_step(line, obj)?;
    let gold = GOLD_FLAT.resolve(obj).map(|(_, v)| normalize_answer_value(v));

    Ok(FlatRow {
        key,
        index,
        gold,
        problem: problem_text(obj),
        step,
    })
}

/// Identifier, then secondary index, then a stable hash of the problem text.
fn group_key(obj: &Map<String, Value>) -> Option<String> {
    if let Some((_, v)) = UID.resolve(obj) {
        return Some(identifier(v));
    }
    if let Some((_, v)) = INDEX.resolve(obj) {
        return Some(identifier(v));
    }
    problem_text(obj).map(|text| {
        let hash = blake3::hash(text.as_bytes());
        format!("problem:{}", &hash.to_hex()[..16])
    })
}

// ─── Field resolution ────────────────────────────────────────────────

fn resolve_step(line: usize, obj: &Map<String, Value>) -> Result<ResolvedStep, RecordError> {
    let ans = ANSWER
        .resolve(obj)
        .map(|(_, v)| normalize_answer_value(v))
        .unwrap_or_default();
    let conf = match CONFIDENCE.resolve(obj) {
        Some((_, v)) => number(line, CONFIDENCE.field, v)?.clamp(0.0, 1.0),
        None => DEFAULT_CONFIDENCE,
    };
    let tokens = TOKENS
        .resolve(obj)
        .map(|(_, v)| token_count(line, v))
        .transpose()?;

    Ok(ResolvedStep { ans, conf, tokens })
}

fn identifier(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn problem_text(obj: &Map<String, Value>) -> Option<String> {
    PROBLEM
        .resolve(obj)
        .and_then(|(_, v)| v.as_str())
        .map(str::to_string)
}

fn non_numeric(line: usize, field: &'static str, value: &Value) -> RecordError {
    RecordError::NonNumeric {
        line,
        field,
        value: value.to_string(),
    }
}

fn number(line: usize, field: &'static str, value: &Value) -> Result<f64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| !v.is_nan())
        .ok_or_else(|| non_numeric(line, field, value))
}

fn integral(value: f64) -> Option<f64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value)
}

fn token_count(line: usize, value: &Value) -> Result<u64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral).filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| non_numeric(line, TOKENS.field, value))
}

fn step_index(line: usize, value: &Value) -> Result<i64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral).map(|v| v as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| non_numeric(line, STEP_INDEX.field, value))
}
