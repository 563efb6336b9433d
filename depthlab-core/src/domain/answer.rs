//! Answer normalization and matching.
//!
//! Every answer and gold value passes through [`normalize_answer`] exactly once,
//! at ingestion. Downstream scoring compares the normalized strings directly,
//! so numeric formatting differences ("42", "42.0", " 42 ") never count as
//! disagreements.

use serde_json::Value;

/// Values this close to an integer render as that integer.
const INTEGRAL_TOLERANCE: f64 = 1e-9;

/// Largest magnitude that still formats exactly through `i64`.
const EXACT_INT_LIMIT: f64 = 9.0e15;

/// Canonicalize a raw answer string.
///
/// - Surrounding whitespace is trimmed.
/// - Numeric strings (optionally with thousands separators) are rendered
///   canonically: integral values drop their fraction (`"42.0"` → `"42"`),
///   other values use the shortest representation without trailing zeros.
/// - Anything else (including `inf` / `nan`) passes through trimmed.
pub fn normalize_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    match parse_numeric(trimmed) {
        Some(value) => canonical_number(value),
        None => trimmed.to_string(),
    }
}

/// Normalize a JSON value holding an answer.
///
/// `null` becomes the empty string; numbers go through the same numeric
/// canonicalization as strings.
pub fn normalize_answer_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => normalize_answer(s),
        Value::Number(n) => normalize_answer(&n.to_string()),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Render a finite number canonically.
fn canonical_number(value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() < INTEGRAL_TOLERANCE {
        if rounded.abs() < EXACT_INT_LIMIT {
            return format!("{}", rounded as i64);
        }
        return format!("{rounded:.0}");
    }
    let rendered = format!("{value}");
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

fn parse_numeric(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let value = match s.parse::<f64>() {
        Ok(v) => v,
        Err(_) if s.contains(',') && is_grouped_number(s) => s.replace(',', "").parse().ok()?,
        Err(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// `1,234` / `-12,000.5` style: sign, digits and commas, optional fraction.
fn is_grouped_number(s: &str) -> bool {
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let mut groups = int_part.split(',');
    let head_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    head_ok
        && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
        && frac_part.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Extract the last number appearing in free text, with thousands separators
/// removed.
///
/// Matches `[-+]?\d+(,\d{3})*(\.\d+)?` left to right and keeps the final match.
pub fn extract_last_number(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut last = None;
    let mut i = 0;

    while i < len {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = if i > 0 && matches!(bytes[i - 1], b'-' | b'+') {
            i - 1
        } else {
            i
        };
        let mut end = i;
        while end < len && bytes[end].is_ascii_digit() {
            end += 1;
        }
        while end + 3 < len
            && bytes[end] == b','
            && bytes[end + 1..end + 4].iter().all(u8::is_ascii_digit)
        {
            end += 4;
        }
        if end + 1 < len && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
            end += 1;
            while end < len && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        last = Some(text[start..end].replace(',', ""));
        i = end;
    }

    last
}

/// Label-side matching used by the oracle.
///
/// Two answers match when their normalized strings are equal, or when the last
/// number in each canonicalizes to the same value. The first clause keeps this
/// at least as permissive as exact scoring.
pub fn answers_match(pred: &str, gold: &str) -> bool {
    if pred == gold {
        return true;
    }
    match (extract_last_number(pred), extract_last_number(gold)) {
        (Some(p), Some(g)) => normalize_answer(&p) == normalize_answer(&g),
        _ => false,
    }
}
