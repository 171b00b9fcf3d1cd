use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{StatusArgs, default_inventory_path, default_report_path};
use crate::model::DatasetInventoryManifest;

/// The parts of an evaluation report that `status` prints.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportHeadline {
    pub generated_at: Option<String>,
    pub dataset: Option<String>,
    pub stat: Option<HeadlineStat>,
    #[serde(default)]
    pub degraded_records: Vec<Value>,
    #[serde(default)]
    pub failed_records: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadlineStat {
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub success_rates: BTreeMap<String, Option<f64>>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| default_report_path(&args.result_dir));
    let inventory_path = default_inventory_path(&args.result_dir);

    info!(result_dir = %args.result_dir.display(), "status requested");

    match read_optional::<ReportHeadline>(&report_path)? {
        Some(report) => {
            let stat = report.stat.as_ref();
            let count = |key: &str| {
                stat.and_then(|stat| stat.counts.get(key).copied())
                    .unwrap_or_default()
            };
            let rate = |key: &str| {
                stat.and_then(|stat| stat.success_rates.get(key).copied().flatten())
                    .map(|rate| format!("{:.1}%", rate * 100.0))
                    .unwrap_or_else(|| "n/a".to_string())
            };

            info!(
                generated_at = %report.generated_at.unwrap_or_default(),
                dataset = %report.dataset.unwrap_or_default(),
                all = count("all"),
                se = count("se"),
                pv = count("pv"),
                se_rate = %rate("se"),
                pv_rate = %rate("pv"),
                degraded = report.degraded_records.len(),
                failed = report.failed_records.len(),
                "loaded evaluation report"
            );
        }
        None => warn!(path = %report_path.display(), "evaluation report missing"),
    }

    match read_optional::<DatasetInventoryManifest>(&inventory_path)? {
        Some(inventory) => {
            info!(
                generated_at = %inventory.generated_at,
                records = inventory.record_count,
                duplicates = inventory.duplicate_ids.len(),
                "loaded inventory manifest"
            );
            for source in &inventory.sources {
                info!(
                    source = %source.source,
                    present = source.presence.present,
                    missing = source.presence.missing,
                    malformed = source.presence.malformed,
                    "inventory source"
                );
            }
        }
        None => warn!(path = %inventory_path.display(), "inventory manifest missing"),
    }

    Ok(())
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}
