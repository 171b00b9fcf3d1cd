use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::model::{ImageMetadata, value_as_f64};
use crate::recognition::{OutputSource, OutputStatus};
use crate::scoring::record::RecordResult;

const KIBI: f64 = 1024.0;
const MEBI: f64 = 1024.0 * 1024.0;

/// Flat per-record row for external analysis. Image fields are `null` when the
/// record has no usable image metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub matches: usize,
    pub success: u8,
    pub avg_confidence: f64,
    pub accuracy6: u8,
    pub accuracy7: u8,
    pub image_area: Option<f64>,
    pub image_resolution: Option<f64>,
    pub image_quality: Option<f64>,
    pub image_filesize: Option<f64>,
}

pub struct FeatureExporter {
    engine: &'static str,
    filesize_pattern: Regex,
}

impl FeatureExporter {
    pub fn new(engine: &'static str) -> Result<Self> {
        let filesize_pattern = Regex::new(r"^\s*([0-9]+(?:\.[0-9]*)?|\.[0-9]+)\s*(Ki|Mi)")
            .context("failed to compile filesize regex")?;

        Ok(Self {
            engine,
            filesize_pattern,
        })
    }

    pub fn export<S: OutputSource>(
        &self,
        results: &[RecordResult],
        source: &S,
    ) -> Result<Vec<FeatureVector>> {
        let mut features = Vec::with_capacity(results.len());

        for result in results {
            let metadata = source.image_metadata(&result.record.id).with_context(|| {
                format!("failed to load image metadata for {}", result.record.id)
            })?;
            let metadata = match metadata.status {
                OutputStatus::Present => Some(metadata.value),
                OutputStatus::Missing => {
                    warn!(record = %result.record.id, "image metadata missing");
                    None
                }
                OutputStatus::Malformed => {
                    warn!(
                        record = %result.record.id,
                        problem = %metadata.problem.unwrap_or_default(),
                        "image metadata malformed"
                    );
                    None
                }
            };

            features.push(self.feature_vector(result, metadata.as_ref()));
        }

        Ok(features)
    }

    pub fn feature_vector(
        &self,
        result: &RecordResult,
        metadata: Option<&ImageMetadata>,
    ) -> FeatureVector {
        let evaluation = result.engine(self.engine);
        let composite = evaluation.map(|evaluation| &evaluation.composite);
        let flag = |mismatched: Option<u32>| u8::from(mismatched != Some(0));

        FeatureVector {
            matches: evaluation.map_or(0, |evaluation| evaluation.matches_count),
            success: u8::from(evaluation.is_some_and(|evaluation| evaluation.success)),
            avg_confidence: evaluation
                .map_or(0.0, |evaluation| evaluation.confidence.avg_confidence),
            accuracy6: flag(composite.and_then(|composite| composite.core_fields_mismatched)),
            accuracy7: flag(composite.and_then(|composite| composite.all_fields_mismatched)),
            image_area: metadata
                .and_then(|metadata| metadata.size)
                .map(|size| size.width * size.height),
            image_resolution: metadata
                .and_then(|metadata| metadata.resolution.as_deref())
                .and_then(resolution_width),
            image_quality: metadata
                .and_then(|metadata| metadata.jpeg_quality.as_ref())
                .and_then(value_as_f64),
            image_filesize: metadata
                .and_then(|metadata| metadata.filesize.as_deref())
                .and_then(|filesize| self.filesize_bytes(filesize)),
        }
    }

    /// `"12.5Ki"` and `"3Mi"` style sizes in bytes; any other unit is unknown.
    pub fn filesize_bytes(&self, value: &str) -> Option<f64> {
        let captures = self.filesize_pattern.captures(value)?;
        let amount = captures.get(1)?.as_str().parse::<f64>().ok()?;
        match captures.get(2)?.as_str() {
            "Ki" => Some(amount * KIBI),
            "Mi" => Some(amount * MEBI),
            _ => None,
        }
    }
}

/// Width part of a `"WxH"` resolution string.
fn resolution_width(resolution: &str) -> Option<f64> {
    let (width, _) = resolution.split_once('x')?;
    width.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{GroundTruthRecord, RecognitionOutput};
    use crate::recognition::Loaded;
    use crate::scoring::engine::default_adapters;
    use crate::scoring::record::score_record;

    struct MetadataSource;

    impl OutputSource for MetadataSource {
        fn recognition_output(
            &self,
            _engine_dir: &str,
            _record_id: &str,
        ) -> Result<Loaded<RecognitionOutput>> {
            Ok(Loaded::missing())
        }

        fn image_metadata(&self, record_id: &str) -> Result<Loaded<ImageMetadata>> {
            if record_id != "A" {
                return Ok(Loaded::missing());
            }
            let metadata = serde_json::from_value(json!({
                "size": { "width": 2000, "height": 1500 },
                "Resolution": "300x300",
                "JPEG-Quality": 92,
                "Filesize": "1.5Mi"
            }))?;
            Ok(Loaded::present(metadata))
        }
    }

    fn record(id: &str) -> GroundTruthRecord {
        GroundTruthRecord {
            id: id.to_string(),
            series: "4510".to_string(),
            number: "123456".to_string(),
            surname: "ИВАНОВ".to_string(),
            name: "ИВАН".to_string(),
            patronymic: "ИВАНОВИЧ".to_string(),
            issue_date: "04.03.2011".to_string(),
            issuing_authority: "ОВД".to_string(),
        }
    }

    fn results() -> Vec<RecordResult> {
        let adapters = default_adapters("se", "pv");
        let field = |value: &str| json!({ "value": value, "confidence": "1" });
        let exact: RecognitionOutput = serde_json::from_value(json!({
            "matches": [{}, {}],
            "data": {
                "series": field("4510"),
                "number": field("123456"),
                "surname": field("ИВАНОВ"),
                "name": field("ИВАН"),
                "patronymic": field("ИВАНОВИЧ"),
                "issue_date": field("04.03.2011"),
                "authority": field("ОВД РАЙОНА")
            }
        }))
        .expect("fixture should deserialize");

        vec![
            score_record(
                &adapters,
                record("A"),
                &[Loaded::present(exact), Loaded::missing()],
            ),
            score_record(&adapters, record("B"), &[Loaded::missing(), Loaded::missing()]),
        ]
    }

    #[test]
    fn export_builds_one_row_per_record() {
        let exporter = FeatureExporter::new("se").expect("exporter should build");
        let features = exporter
            .export(&results(), &MetadataSource)
            .expect("export should succeed");

        assert_eq!(features.len(), 2);
        assert_eq!(
            features[0],
            FeatureVector {
                matches: 2,
                success: 1,
                avg_confidence: 1.0,
                accuracy6: 0,
                accuracy7: 1,
                image_area: Some(3_000_000.0),
                image_resolution: Some(300.0),
                image_quality: Some(92.0),
                image_filesize: Some(1.5 * 1024.0 * 1024.0),
            }
        );
    }

    #[test]
    fn missing_metadata_leaves_image_fields_null() {
        let exporter = FeatureExporter::new("se").expect("exporter should build");
        let features = exporter
            .export(&results(), &MetadataSource)
            .expect("export should succeed");

        let row = serde_json::to_value(&features[1]).expect("row should serialize");
        assert_eq!(row["image_area"], json!(null));
        assert_eq!(row["image_filesize"], json!(null));
        assert_eq!(row["success"], json!(0));
        assert_eq!(row["accuracy6"], json!(1));
    }

    #[test]
    fn filesize_understands_binary_units_only() {
        let exporter = FeatureExporter::new("se").expect("exporter should build");

        assert_eq!(exporter.filesize_bytes("12Ki"), Some(12.0 * 1024.0));
        assert_eq!(exporter.filesize_bytes("1.234KiB"), Some(1.234 * 1024.0));
        assert_eq!(exporter.filesize_bytes("2Mi"), Some(2.0 * 1024.0 * 1024.0));
        assert_eq!(exporter.filesize_bytes("800B"), None);
        assert_eq!(exporter.filesize_bytes("1.2Gi"), None);
        assert_eq!(exporter.filesize_bytes("Ki"), None);
    }

    #[test]
    fn resolution_width_takes_the_part_before_x() {
        assert_eq!(resolution_width("72x72"), Some(72.0));
        assert_eq!(resolution_width("300"), None);
    }
}
