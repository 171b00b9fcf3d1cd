use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{GroundTruthRecord, RecognitionOutput};
use crate::recognition::{Loaded, OutputStatus};
use crate::scoring::comparator::{accuracy, is_mismatch};
use crate::scoring::confidence::ConfidenceSummary;
use crate::scoring::engine::RecognitionEngineAdapter;

/// Reference fields compared against recognized values, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Series,
    Number,
    Surname,
    Name,
    Patronymic,
    Date,
    Authority,
}

impl TrackedField {
    pub const ALL: [TrackedField; 7] = [
        Self::Series,
        Self::Number,
        Self::Surname,
        Self::Name,
        Self::Patronymic,
        Self::Date,
        Self::Authority,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Number => "number",
            Self::Surname => "surname",
            Self::Name => "name",
            Self::Patronymic => "patronymic",
            Self::Date => "date",
            Self::Authority => "authority",
        }
    }

    /// Key of the field inside a recognizer `data` object.
    pub fn recognized_key(self) -> &'static str {
        match self {
            Self::Date => "issue_date",
            other => other.as_str(),
        }
    }

    pub fn reference(self, record: &GroundTruthRecord) -> &str {
        match self {
            Self::Series => &record.series,
            Self::Number => &record.number,
            Self::Surname => &record.surname,
            Self::Name => &record.name,
            Self::Patronymic => &record.patronymic,
            Self::Date => &record.issue_date,
            Self::Authority => &record.issuing_authority,
        }
    }

    /// Core fields are everything but the issuing authority.
    pub fn is_core(self) -> bool {
        self != Self::Authority
    }
}

pub type FieldAccuracy = BTreeMap<TrackedField, i64>;

pub fn field_accuracy(record: &GroundTruthRecord, output: &RecognitionOutput) -> FieldAccuracy {
    TrackedField::ALL
        .iter()
        .map(|field| {
            let recognized = output.field_value(field.recognized_key());
            (*field, accuracy(field.reference(record), &recognized))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    /// z1: mismatched fields among all tracked fields.
    pub all_fields_mismatched: Option<u32>,
    /// z2: mismatched fields among the core fields.
    pub core_fields_mismatched: Option<u32>,
    /// z3: processing time reported by the engine.
    pub processing_time: Option<f64>,
}

impl CompositeScore {
    pub fn derive(accuracy: Option<&FieldAccuracy>, output: &RecognitionOutput) -> Self {
        let count = |core_only: bool| {
            accuracy.map(|scores| {
                scores
                    .iter()
                    .filter(|(field, score)| {
                        (!core_only || field.is_core()) && is_mismatch(**score)
                    })
                    .count() as u32
            })
        };

        Self {
            all_fields_mismatched: count(false),
            core_fields_mismatched: count(true),
            processing_time: output.time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineEvaluation {
    pub engine: &'static str,
    pub output_status: OutputStatus,
    pub confidence: ConfidenceSummary,
    pub matches_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<FieldAccuracy>,
    pub composite: CompositeScore,
    pub success: bool,
}

impl EngineEvaluation {
    /// Value of a named chart metric, `None` when the engine has no such value.
    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        match name {
            "rows_counts" => Some(MetricValue::Int(self.confidence.rows_count)),
            "avg_confidence" => Some(MetricValue::Float(self.confidence.avg_confidence)),
            "pages" => Some(MetricValue::Int(self.matches_count as i64)),
            "accuracy_z1" => self
                .composite
                .all_fields_mismatched
                .map(|count| MetricValue::Int(i64::from(count))),
            "accuracy_z2" => self
                .composite
                .core_fields_mismatched
                .map(|count| MetricValue::Int(i64::from(count))),
            "accuracy_z3" => self.composite.processing_time.map(MetricValue::Float),
            other => {
                let field = other.strip_prefix("accuracy_")?;
                let field = TrackedField::ALL
                    .into_iter()
                    .find(|candidate| candidate.as_str() == field)?;
                self.accuracy
                    .as_ref()
                    .and_then(|scores| scores.get(&field))
                    .map(|score| MetricValue::Int(*score))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordResult {
    pub record: GroundTruthRecord,
    pub engines: Vec<EngineEvaluation>,
}

impl RecordResult {
    pub fn engine(&self, id: &str) -> Option<&EngineEvaluation> {
        self.engines.iter().find(|evaluation| evaluation.engine == id)
    }
}

/// Scores one record for one engine: confidence first, then field comparison, then success.
pub fn score_engine(
    adapter: &dyn RecognitionEngineAdapter,
    record: &GroundTruthRecord,
    output: &Loaded<RecognitionOutput>,
) -> EngineEvaluation {
    let confidence = adapter.aggregate_confidence(&output.value);
    let accuracy = adapter.field_accuracy(record, &output.value);
    let composite = CompositeScore::derive(accuracy.as_ref(), &output.value);
    let success = adapter.is_success(&output.value, &confidence);

    EngineEvaluation {
        engine: adapter.id(),
        output_status: output.status,
        matches_count: output.value.matches_count(),
        confidence,
        accuracy,
        composite,
        success,
    }
}

/// Scores a record against every engine; `outputs` is aligned with `adapters`.
pub fn score_record(
    adapters: &[Box<dyn RecognitionEngineAdapter>],
    record: GroundTruthRecord,
    outputs: &[Loaded<RecognitionOutput>],
) -> RecordResult {
    let engines = adapters
        .iter()
        .zip(outputs)
        .map(|(adapter, output)| score_engine(adapter.as_ref(), &record, output))
        .collect();

    RecordResult { record, engines }
}

#[cfg(test)]
mod tests;
