use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{InventoryArgs, default_inventory_path};
use crate::ground_truth::load_ground_truth;
use crate::model::{DatasetInventoryManifest, DocumentPresence, GroundTruthRecord, SourceInventory};
use crate::recognition::{FsOutputSource, OutputSource, OutputStatus};
use crate::scoring::engine::default_adapters;
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const METADATA_SOURCE: &str = "image_metadata";

pub fn run(args: InventoryArgs) -> Result<()> {
    let ground_truth_path = args.layout.ground_truth_path(&args.data_dir);
    let manifest = build_manifest(&args, &ground_truth_path)?;

    for source in &manifest.sources {
        info!(
            source = %source.source,
            directory = %source.directory,
            present = source.presence.present,
            missing = source.presence.missing,
            malformed = source.presence.malformed,
            "source inventory"
        );
    }

    if args.dry_run {
        info!(
            records = manifest.record_count,
            duplicates = manifest.duplicate_ids.len(),
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| default_inventory_path(&args.result_dir));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(records = manifest.record_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(
    args: &InventoryArgs,
    ground_truth_path: &Path,
) -> Result<DatasetInventoryManifest> {
    let records = load_ground_truth(ground_truth_path, args.layout.has_header)?;
    let ground_truth_sha256 = sha256_file(ground_truth_path)?;
    let source = FsOutputSource::new(
        &args.result_dir,
        &args.layout.dataset,
        &args.layout.metadata_dir,
    );

    let mut sources = Vec::new();
    for adapter in default_adapters(&args.layout.se_dir, &args.layout.pv_dir) {
        let presence = survey(&records, |id| {
            Ok(source.recognition_output(adapter.output_dir(), id)?.status)
        })?;
        sources.push(SourceInventory {
            source: adapter.id().to_string(),
            directory: adapter.output_dir().to_string(),
            presence,
        });
    }

    let presence = survey(&records, |id| Ok(source.image_metadata(id)?.status))?;
    sources.push(SourceInventory {
        source: METADATA_SOURCE.to_string(),
        directory: args.layout.metadata_dir.clone(),
        presence,
    });

    let duplicate_ids = duplicate_ids(&records);
    if !duplicate_ids.is_empty() {
        warn!(count = duplicate_ids.len(), "ground truth has duplicate record ids");
    }

    Ok(DatasetInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        dataset: args.layout.dataset.clone(),
        ground_truth_path: ground_truth_path.display().to_string(),
        ground_truth_sha256,
        record_count: records.len(),
        duplicate_ids,
        sources,
    })
}

fn survey<F>(records: &[GroundTruthRecord], mut status_of: F) -> Result<DocumentPresence>
where
    F: FnMut(&str) -> Result<OutputStatus>,
{
    let mut presence = DocumentPresence::default();

    for record in records {
        match status_of(&record.id)? {
            OutputStatus::Present => presence.present += 1,
            OutputStatus::Missing => presence.missing += 1,
            OutputStatus::Malformed => {
                presence.malformed += 1;
                presence.malformed_ids.push(record.id.clone());
            }
        }
    }

    Ok(presence)
}

fn duplicate_ids(records: &[GroundTruthRecord]) -> Vec<String> {
    let mut seen = BTreeMap::<&str, usize>::new();
    for record in records {
        *seen.entry(record.id.as_str()).or_default() += 1;
    }

    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.to_string())
        .collect()
}
