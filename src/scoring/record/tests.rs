use serde_json::{Value, json};

use super::*;
use crate::scoring::comparator::EMPTY_RECOGNITION;
use crate::scoring::engine::{PvAdapter, SeAdapter, default_adapters};

fn record() -> GroundTruthRecord {
    GroundTruthRecord {
        id: "A-01".to_string(),
        series: "4510".to_string(),
        number: "123456".to_string(),
        surname: "Иванов".to_string(),
        name: "Иван".to_string(),
        patronymic: "Иванович".to_string(),
        issue_date: "04.03.2011".to_string(),
        issuing_authority: "ОВД РАЙОНА".to_string(),
    }
}

fn field(value: &str) -> Value {
    json!({ "value": value, "confidence": "1" })
}

fn exact_se_output(matches: Value) -> Loaded<RecognitionOutput> {
    let raw = json!({
        "matches": matches,
        "time": 412.0,
        "data": {
            "enough_data": true,
            "series": field("45 10"),
            "number": field("123456"),
            "surname": field("ИВАНОВ"),
            "name": field("иван"),
            "patronymic": field("ИВАНОВИЧ"),
            "issue_date": field("04.03.2011"),
            "authority": field("ОВД  района"),
            "gender": field("М")
        }
    });
    Loaded::present(serde_json::from_value(raw).expect("fixture should deserialize"))
}

#[test]
fn exact_recognition_scores_zero_everywhere() {
    let evaluation = score_engine(
        &SeAdapter::new("se"),
        &record(),
        &exact_se_output(json!([{ "score": 0.7, "type": "rf.passport" }])),
    );

    let accuracy = evaluation.accuracy.as_ref().expect("se compares fields");
    assert_eq!(accuracy.len(), 7);
    assert!(accuracy.values().all(|score| *score == 0));
    assert_eq!(evaluation.composite.all_fields_mismatched, Some(0));
    assert_eq!(evaluation.composite.core_fields_mismatched, Some(0));
    assert_eq!(evaluation.composite.processing_time, Some(412.0));
    assert_eq!(evaluation.confidence.rows_count, 8);
    assert!(evaluation.success);
}

#[test]
fn exact_recognition_without_matches_is_not_a_success() {
    let evaluation = score_engine(&SeAdapter::new("se"), &record(), &exact_se_output(json!([])));

    assert_eq!(evaluation.composite.all_fields_mismatched, Some(0));
    assert!(!evaluation.success);
}

#[test]
fn z1_counts_all_mismatches_and_z2_skips_authority() {
    let raw = json!({
        "data": {
            "series": field("4510"),
            "number": field("123456"),
            "surname": field("ИВАНОВ"),
            "name": field("ИВАН"),
            "patronymic": field("ИВАНОВИЧ"),
            "issue_date": field("05.03.2011"),
            "authority": field("ОВД")
        }
    });
    let output = Loaded::present(serde_json::from_value(raw).expect("fixture should deserialize"));

    let evaluation = score_engine(&SeAdapter::new("se"), &record(), &output);

    let accuracy = evaluation.accuracy.as_ref().expect("se compares fields");
    assert_eq!(accuracy[&TrackedField::Date], 1);
    assert!(accuracy[&TrackedField::Authority] > 0);
    assert_eq!(evaluation.composite.all_fields_mismatched, Some(2));
    assert_eq!(evaluation.composite.core_fields_mismatched, Some(1));
}

#[test]
fn missing_output_yields_empty_sentinels() {
    let evaluation = score_engine(&SeAdapter::new("se"), &record(), &Loaded::missing());

    let accuracy = evaluation.accuracy.as_ref().expect("se compares fields");
    assert!(accuracy.values().all(|score| *score == EMPTY_RECOGNITION));
    assert_eq!(evaluation.composite.all_fields_mismatched, Some(7));
    assert_eq!(evaluation.composite.core_fields_mismatched, Some(6));
    assert_eq!(evaluation.composite.processing_time, None);
    assert_eq!(evaluation.output_status, OutputStatus::Missing);
    assert!(!evaluation.success);
}

#[test]
fn pv_evaluation_only_passes_processing_time() {
    let raw = json!({ "time": 95.5, "data": { "rows_count": 0 } });
    let output = Loaded::present(serde_json::from_value(raw).expect("fixture should deserialize"));

    let evaluation = score_engine(&PvAdapter::new("pv"), &record(), &output);

    assert!(evaluation.accuracy.is_none());
    assert_eq!(evaluation.composite.all_fields_mismatched, None);
    assert_eq!(evaluation.composite.processing_time, Some(95.5));
    assert_eq!(evaluation.metric("accuracy_z3"), Some(MetricValue::Float(95.5)));
    assert_eq!(evaluation.metric("accuracy_z1"), None);
}

#[test]
fn metric_lookup_reads_per_field_scores() {
    let evaluation = score_engine(&SeAdapter::new("se"), &record(), &Loaded::missing());

    assert_eq!(
        evaluation.metric("accuracy_patronymic"),
        Some(MetricValue::Int(EMPTY_RECOGNITION))
    );
    assert_eq!(evaluation.metric("rows_counts"), Some(MetricValue::Int(0)));
    assert_eq!(evaluation.metric("accuracy_nonsense"), None);
    assert_eq!(evaluation.metric("unknown"), None);
}

#[test]
fn score_record_keeps_adapter_order() {
    let adapters = default_adapters("se", "pv");
    let result = score_record(
        &adapters,
        record(),
        &[exact_se_output(json!([{}])), Loaded::missing()],
    );

    assert_eq!(result.engines.len(), 2);
    assert!(result.engine("se").is_some_and(|se| se.success));
    assert!(result.engine("pv").is_some_and(|pv| !pv.success));
    assert!(result.engine("xx").is_none());
}
