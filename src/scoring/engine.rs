use crate::model::{GroundTruthRecord, RecognitionOutput};
use crate::scoring::confidence::{ConfidenceSummary, aggregate_pv, aggregate_se};
use crate::scoring::record::{FieldAccuracy, field_accuracy};

/// Minimum number of cleaned PV fields for a usable extraction.
pub const PV_MIN_ROWS_FOR_SUCCESS: i64 = 6;

const SE_METRICS: &[&str] = &[
    "rows_counts",
    "avg_confidence",
    "pages",
    "accuracy_series",
    "accuracy_number",
    "accuracy_surname",
    "accuracy_name",
    "accuracy_patronymic",
    "accuracy_date",
    "accuracy_authority",
    "accuracy_z1",
    "accuracy_z2",
    "accuracy_z3",
];

const PV_METRICS: &[&str] = &["rows_counts", "avg_confidence", "accuracy_z3"];

/// Engine-specific rules for reading one recognizer's output.
pub trait RecognitionEngineAdapter {
    /// Short id used as report key and chart prefix.
    fn id(&self) -> &'static str;

    /// Directory holding this engine's outputs below the result root.
    fn output_dir(&self) -> &str;

    fn aggregate_confidence(&self, output: &RecognitionOutput) -> ConfidenceSummary;

    /// Per-field mismatch scores, `None` when the engine's fields are not mapped to ground truth.
    fn field_accuracy(
        &self,
        record: &GroundTruthRecord,
        output: &RecognitionOutput,
    ) -> Option<FieldAccuracy>;

    fn is_success(&self, output: &RecognitionOutput, confidence: &ConfidenceSummary) -> bool;

    /// Chart metrics recorded for every record, see `EngineEvaluation::metric`.
    fn metric_names(&self) -> &'static [&'static str];
}

#[derive(Debug, Clone)]
pub struct SeAdapter {
    output_dir: String,
}

impl SeAdapter {
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }
}

impl RecognitionEngineAdapter for SeAdapter {
    fn id(&self) -> &'static str {
        "se"
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn aggregate_confidence(&self, output: &RecognitionOutput) -> ConfidenceSummary {
        aggregate_se(output)
    }

    fn field_accuracy(
        &self,
        record: &GroundTruthRecord,
        output: &RecognitionOutput,
    ) -> Option<FieldAccuracy> {
        Some(field_accuracy(record, output))
    }

    fn is_success(&self, output: &RecognitionOutput, _confidence: &ConfidenceSummary) -> bool {
        output.matches_count() > 0
    }

    fn metric_names(&self) -> &'static [&'static str] {
        SE_METRICS
    }
}

#[derive(Debug, Clone)]
pub struct PvAdapter {
    output_dir: String,
}

impl PvAdapter {
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }
}

impl RecognitionEngineAdapter for PvAdapter {
    fn id(&self) -> &'static str {
        "pv"
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn aggregate_confidence(&self, output: &RecognitionOutput) -> ConfidenceSummary {
        aggregate_pv(output)
    }

    fn field_accuracy(
        &self,
        _record: &GroundTruthRecord,
        _output: &RecognitionOutput,
    ) -> Option<FieldAccuracy> {
        None
    }

    fn is_success(&self, _output: &RecognitionOutput, confidence: &ConfidenceSummary) -> bool {
        confidence.rows_count >= PV_MIN_ROWS_FOR_SUCCESS
    }

    fn metric_names(&self) -> &'static [&'static str] {
        PV_METRICS
    }
}

pub fn default_adapters(se_dir: &str, pv_dir: &str) -> Vec<Box<dyn RecognitionEngineAdapter>> {
    vec![Box::new(SeAdapter::new(se_dir)), Box::new(PvAdapter::new(pv_dir))]
}
