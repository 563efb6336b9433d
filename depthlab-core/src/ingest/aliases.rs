//! Field alias tables.
//!
//! Upstream exporters disagree on field names. Each logical field gets an
//! ordered list of accepted keys; the first key present with a non-empty value
//! wins. Resolution happens once, in the normalizer. Nothing downstream of
//! [`crate::ingest::normalize`] ever sees a raw field name.

use serde_json::{Map, Value};

/// Ordered list of accepted keys for one logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAliases {
    /// Logical field name, used in error messages.
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

impl FieldAliases {
    /// First alias present with a usable value, together with the key that matched.
    ///
    /// `null` and blank strings count as absent.
    pub fn resolve<'a>(&self, obj: &'a Map<String, Value>) -> Option<(&'static str, &'a Value)> {
        self.keys.iter().find_map(|key| {
            obj.get(*key)
                .filter(|value| !is_absent(value))
                .map(|value| (*key, value))
        })
    }

    /// True if any alias key is present at all, even with a null value.
    pub fn any_present(&self, obj: &Map<String, Value>) -> bool {
        self.keys.iter().any(|key| obj.contains_key(*key))
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Per-trajectory step list (format A).
pub const STEPS: FieldAliases = FieldAliases {
    field: "steps",
    keys: &["steps", "trajectory", "pred_steps", "checkpoints"],
};

/// Example identifier.
pub const UID: FieldAliases = FieldAliases {
    field: "uid",
    keys: &["uid", "id", "example_id", "qid", "custom_id", "problem_id"],
};

/// Secondary index, used for grouping when no identifier exists.
pub const INDEX: FieldAliases = FieldAliases {
    field: "idx",
    keys: &["idx", "index"],
};

/// Problem text, last-resort grouping key.
pub const PROBLEM: FieldAliases = FieldAliases {
    field: "problem",
    keys: &["problem", "question", "prompt"],
};

/// Gold answer on a trajectory-per-record row.
pub const GOLD_TRAJECTORY: FieldAliases = FieldAliases {
    field: "gold",
    keys: &["gold", "answer", "target"],
};

/// Gold answer on a flat per-step row. `answer` is the prediction there.
pub const GOLD_FLAT: FieldAliases = FieldAliases {
    field: "gold",
    keys: &["gold", "target", "label", "gt"],
};

/// Depth / budget index on a flat row.
pub const STEP_INDEX: FieldAliases = FieldAliases {
    field: "t",
    keys: &["t", "budget", "step", "k"],
};

/// Predicted answer.
pub const ANSWER: FieldAliases = FieldAliases {
    field: "answer",
    keys: &["ans", "answer", "pred", "pred_answer", "final_answer", "output"],
};

/// Self-reported confidence.
pub const CONFIDENCE: FieldAliases = FieldAliases {
    field: "conf",
    keys: &["conf", "confidence", "p_correct"],
};

/// Token cost, or a token-budget hint as a proxy.
pub const TOKENS: FieldAliases = FieldAliases {
    field: "tokens",
    keys: &["tokens", "n_tokens", "tok", "token_count", "max_new_tokens"],
};
