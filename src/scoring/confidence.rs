use serde::Serialize;
use serde_json::Value;

use crate::model::{RecognitionOutput, value_as_f64, value_as_i64};

/// PV reports confidence on a 0..100 scale.
const PV_CONFIDENCE_SCALE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceSummary {
    pub rows_count: i64,
    pub avg_confidence: f64,
    /// Field names that survived cleaning.
    pub retained_fields: Vec<String>,
}

impl ConfidenceSummary {
    pub fn empty() -> Self {
        Self {
            rows_count: 0,
            avg_confidence: 0.0,
            retained_fields: Vec::new(),
        }
    }
}

/// Every field counts, zero-confidence ones included.
pub fn aggregate_se(output: &RecognitionOutput) -> ConfidenceSummary {
    if output.data.is_none() {
        return ConfidenceSummary::empty();
    }

    let mut rows_count = 0_i64;
    let mut confidence_total = 0_i64;
    let mut retained_fields = Vec::new();

    for (key, field) in output.fields() {
        let confidence = field_confidence(field).and_then(value_as_i64).unwrap_or(0);
        confidence_total = confidence_total.saturating_add(confidence);
        rows_count += 1;
        retained_fields.push(key.clone());
    }

    let avg_confidence = if rows_count == 0 {
        0.0
    } else {
        confidence_total as f64 / rows_count as f64
    };

    ConfidenceSummary {
        rows_count,
        avg_confidence,
        retained_fields,
    }
}

/// Starts from the stated `rows_count`, drops zero-confidence fields, and
/// normalizes the average to 0..1. A failed run keeps nothing.
pub fn aggregate_pv(output: &RecognitionOutput) -> ConfidenceSummary {
    if output.data.is_none() || output.is_failure() {
        return ConfidenceSummary::empty();
    }

    let mut rows_count = output
        .stated_rows_count()
        .unwrap_or_else(|| output.fields().count() as i64);
    let mut confidence_total = 0.0_f64;
    let mut retained_fields = Vec::new();

    for (key, field) in output.fields() {
        let confidence = field_confidence(field);
        if confidence.is_some_and(is_zero_confidence) {
            rows_count -= 1;
            continue;
        }

        confidence_total += confidence.and_then(value_as_f64).unwrap_or(0.0);
        retained_fields.push(key.clone());
    }

    let rows_count = rows_count.max(0);
    let avg_confidence = if rows_count == 0 {
        0.0
    } else {
        confidence_total / rows_count as f64 / PV_CONFIDENCE_SCALE
    };

    ConfidenceSummary {
        rows_count,
        avg_confidence,
        retained_fields,
    }
}

fn field_confidence(field: &Value) -> Option<&Value> {
    field.get("confidence")
}

fn is_zero_confidence(confidence: &Value) -> bool {
    match confidence {
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.is_empty() || trimmed.parse::<f64>().ok() == Some(0.0)
        }
        Value::Bool(flag) => !flag,
        _ => false,
    }
}
