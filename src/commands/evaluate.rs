use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cli::{EvaluateArgs, default_report_path};
use crate::ground_truth::load_ground_truth;
use crate::recognition::FsOutputSource;
use crate::scoring::aggregate::FieldTally;
use crate::scoring::dataset::{DegradedRecord, FailedRecord};
use crate::scoring::engine::default_adapters;
use crate::scoring::{BatchOutcome, DatasetAggregator, FeatureExporter, RecordResult};
use crate::util::{now_utc_string, ratio, sha256_file, write_json_pretty};

const REPORT_MANIFEST_VERSION: u32 = 1;
/// Engine whose fields are compared against ground truth and exported as features.
const FEATURE_ENGINE: &str = "se";

#[derive(Debug, Serialize)]
pub struct EvaluationReport<'a> {
    pub manifest_version: u32,
    pub generated_at: String,
    pub dataset: String,
    pub ground_truth_path: String,
    pub ground_truth_sha256: String,
    pub stat: ReportStat,
    pub field_summary: BTreeMap<&'static str, BTreeMap<&'static str, FieldSummary>>,
    pub charts: Map<String, Value>,
    pub entries: &'a [RecordResult],
    pub degraded_records: &'a [DegradedRecord],
    pub failed_records: &'a [FailedRecord],
}

#[derive(Debug, Serialize)]
pub struct ReportStat {
    pub counts: Map<String, Value>,
    pub success_rates: BTreeMap<&'static str, Option<f64>>,
}

#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub exact: usize,
    pub empty: usize,
    pub mismatched: usize,
    pub mean_distance: Option<f64>,
}

impl From<&FieldTally> for FieldSummary {
    fn from(tally: &FieldTally) -> Self {
        Self {
            exact: tally.exact,
            empty: tally.empty,
            mismatched: tally.mismatched,
            mean_distance: tally.mean_distance(),
        }
    }
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let ground_truth_path = args.layout.ground_truth_path(&args.data_dir);
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| default_report_path(&args.result_dir));

    info!(
        ground_truth = %ground_truth_path.display(),
        result_dir = %args.result_dir.display(),
        dataset = %args.layout.dataset,
        "evaluation requested"
    );

    let records = load_ground_truth(&ground_truth_path, args.layout.has_header)?;
    let ground_truth_sha256 = sha256_file(&ground_truth_path)?;

    let adapters = default_adapters(&args.layout.se_dir, &args.layout.pv_dir);
    let source = FsOutputSource::new(
        &args.result_dir,
        &args.layout.dataset,
        &args.layout.metadata_dir,
    );

    let outcome = DatasetAggregator::new(&adapters, &source).process(records);
    if !outcome.aggregate.is_aligned() {
        bail!("metric series length diverged from the record count");
    }

    let report = build_report(&args, &ground_truth_path, ground_truth_sha256, &outcome);
    write_json_pretty(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        all = outcome.aggregate.count_all,
        se = outcome.aggregate.success_count("se"),
        pv = outcome.aggregate.success_count("pv"),
        "wrote evaluation report"
    );

    if let Some(feature_path) = args.feature_path.as_deref() {
        export_features(feature_path, &outcome, &source)?;
    }

    if !outcome.failed.is_empty() {
        let ids = outcome
            .failed
            .iter()
            .map(|failed| failed.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if args.allow_partial {
            warn!(failed = outcome.failed.len(), records = %ids, "partial evaluation accepted");
        } else {
            bail!(
                "{} record(s) could not be evaluated: {ids}",
                outcome.failed.len()
            );
        }
    }

    Ok(())
}

pub fn build_report<'a>(
    args: &EvaluateArgs,
    ground_truth_path: &Path,
    ground_truth_sha256: String,
    outcome: &'a BatchOutcome,
) -> EvaluationReport<'a> {
    let aggregate = &outcome.aggregate;
    let success_rates: BTreeMap<&'static str, Option<f64>> = aggregate
        .success_counts
        .iter()
        .map(|(engine, count)| (*engine, ratio(*count, aggregate.count_all)))
        .collect();
    let field_summary: BTreeMap<&'static str, BTreeMap<&'static str, FieldSummary>> = aggregate
        .field_summary
        .iter()
        .map(|(engine, tallies)| {
            let fields: BTreeMap<&'static str, FieldSummary> = tallies
                .iter()
                .map(|(field, tally)| (field.as_str(), FieldSummary::from(tally)))
                .collect();
            (*engine, fields)
        })
        .collect();

    EvaluationReport {
        manifest_version: REPORT_MANIFEST_VERSION,
        generated_at: now_utc_string(),
        dataset: args.layout.dataset.clone(),
        ground_truth_path: ground_truth_path.display().to_string(),
        ground_truth_sha256,
        stat: ReportStat {
            counts: aggregate.counts(),
            success_rates,
        },
        field_summary,
        charts: aggregate.charts(),
        entries: &outcome.results,
        degraded_records: &outcome.degraded,
        failed_records: &outcome.failed,
    }
}

fn export_features(
    feature_path: &Path,
    outcome: &BatchOutcome,
    source: &FsOutputSource,
) -> Result<()> {
    let exporter = FeatureExporter::new(FEATURE_ENGINE)?;
    let features = exporter.export(&outcome.results, source)?;
    write_json_pretty(feature_path, &features)?;

    info!(
        path = %feature_path.display(),
        entries = features.len(),
        "wrote feature export"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use serde_json::json;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().expect("path has parent")).expect("dirs should exist");
        fs::write(path, contents).expect("fixture should be written");
    }

    fn evaluate_args(argv: &[&str]) -> EvaluateArgs {
        match Cli::parse_from(argv).command {
            Commands::Evaluate(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn fixture(root: &Path) {
        write(
            &root.join("data/good.csv"),
            "1;x;A;4510;123456;Иванов;Иван;Иванович;2011-03-04;ОВД\n\
             2;x;B;4511;654321;Петров;Петр;Петрович;2012-05-06;УФМС\n",
        );
        write(
            &root.join("result/se/good/A.jpg.json"),
            &json!({
                "matches": [{ "score": 0.9, "type": "rf.passport" }],
                "time": 250.0,
                "data": {
                    "series": { "value": "4510", "confidence": "1" },
                    "number": { "value": "123456", "confidence": "1" },
                    "surname": { "value": "ИВАНОВ", "confidence": "1" },
                    "name": { "value": "ИВАН", "confidence": "1" },
                    "patronymic": { "value": "ИВАНОВИЧ", "confidence": "1" },
                    "issue_date": { "value": "04.03.2011", "confidence": "1" },
                    "authority": { "value": "ОВД", "confidence": "0" }
                }
            })
            .to_string(),
        );
        write(&root.join("result/pv/good/B.jpg.json"), "{ broken");
        write(
            &root.join("result/gm/good/A.jpg.json"),
            &json!({
                "size": { "width": 10, "height": 20 },
                "Resolution": "72x72",
                "JPEG-Quality": "90",
                "Filesize": "10Ki"
            })
            .to_string(),
        );
    }

    #[test]
    fn run_writes_report_and_features() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let root = dir.path();
        fixture(root);

        let data = root.join("data");
        let result = root.join("result");
        let features = root.join("features.json");
        let args = evaluate_args(&[
            "docscore",
            "evaluate",
            data.to_str().expect("utf-8 path"),
            result.to_str().expect("utf-8 path"),
            features.to_str().expect("utf-8 path"),
        ]);

        run(args).expect("evaluation should succeed");

        let report: Value = serde_json::from_str(
            &fs::read_to_string(result.join("evaluation_report.json")).expect("report exists"),
        )
        .expect("report should parse");
        assert_eq!(report["stat"]["counts"], json!({ "all": 2, "se": 1, "pv": 0 }));
        assert_eq!(report["stat"]["success_rates"]["se"], json!(0.5));
        assert_eq!(report["charts"]["se_accuracy_z1"], json!([["", ""], ["A", 0], ["B", 7]]));
        assert_eq!(report["charts"]["pv_rows_counts"], json!([["", ""], ["A", 0], ["B", 0]]));
        assert_eq!(report["degraded_records"][0]["id"], json!("B"));
        assert_eq!(report["field_summary"]["se"]["authority"]["exact"], json!(1));
        assert_eq!(report["entries"].as_array().map(Vec::len), Some(2));

        let rows: Value = serde_json::from_str(
            &fs::read_to_string(&features).expect("features exist"),
        )
        .expect("features should parse");
        assert_eq!(rows[0]["image_area"], json!(200.0));
        assert_eq!(rows[0]["image_filesize"], json!(10240.0));
        assert_eq!(rows[1]["image_area"], json!(null));
    }

    #[test]
    fn evaluate_defaults_follow_positional_layout() {
        let args = evaluate_args(&["docscore", "evaluate"]);

        assert_eq!(
            args.layout.ground_truth_path(&args.data_dir),
            std::path::PathBuf::from("data/good.csv")
        );
        assert_eq!(
            default_report_path(&args.result_dir),
            std::path::PathBuf::from("result/evaluation_report.json")
        );
        assert!(args.feature_path.is_none());
        assert_eq!(args.layout.dataset, "good");
        assert!(!args.allow_partial);
    }
}
