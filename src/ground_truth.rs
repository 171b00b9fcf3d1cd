use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};
use tracing::{info, warn};

use crate::model::GroundTruthRecord;

// Column positions in the ground-truth export. Columns 0 and 1 carry export bookkeeping.
const COL_ID: usize = 2;
const COL_SERIES: usize = 3;
const COL_NUMBER: usize = 4;
const COL_SURNAME: usize = 5;
const COL_NAME: usize = 6;
const COL_PATRONYMIC: usize = 7;
const COL_ISSUE_DATE: usize = 8;
const COL_AUTHORITY: usize = 9;
const MIN_COLUMNS: usize = COL_AUTHORITY + 1;

pub fn load_ground_truth(path: &Path, has_header: bool) -> Result<Vec<GroundTruthRecord>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open ground truth: {}", path.display()))?;
    let records = parse_ground_truth(file, has_header)
        .with_context(|| format!("failed to load ground truth: {}", path.display()))?;

    info!(
        path = %path.display(),
        records = records.len(),
        "loaded ground truth"
    );
    Ok(records)
}

pub fn parse_ground_truth<R: Read>(input: R, has_header: bool) -> Result<Vec<GroundTruthRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .quoting(false)
        .has_headers(has_header)
        .flexible(true)
        .from_reader(input);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("failed to read ground truth row")?;
        let line = row.position().map_or(0, |position| position.line());

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() < MIN_COLUMNS {
            bail!(
                "ground truth line {line} has {} columns, expected at least {MIN_COLUMNS}",
                row.len()
            );
        }

        let record = record_from_row(&row);
        if record.id.is_empty() {
            bail!("ground truth line {line} has an empty record id");
        }
        records.push(record);
    }

    Ok(records)
}

fn record_from_row(row: &StringRecord) -> GroundTruthRecord {
    let cell = |index: usize| row.get(index).unwrap_or_default().trim().to_string();
    let id = cell(COL_ID);
    let issue_date = reformat_issue_date(&id, &cell(COL_ISSUE_DATE));

    GroundTruthRecord {
        series: cell(COL_SERIES),
        number: cell(COL_NUMBER),
        surname: cell(COL_SURNAME),
        name: cell(COL_NAME),
        patronymic: cell(COL_PATRONYMIC),
        issue_date,
        issuing_authority: cell(COL_AUTHORITY),
        id,
    }
}

/// `YYYY-MM-DD` (optionally followed by a time part) becomes `DD.MM.YYYY`.
///
/// Only the digit layout is checked, so `2011-02-30` still becomes `30.02.2011`.
fn reformat_issue_date(record_id: &str, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    match raw.get(..10).filter(|prefix| is_iso_date_shape(prefix)) {
        Some(prefix) => format!("{}.{}.{}", &prefix[8..10], &prefix[5..7], &prefix[..4]),
        None => {
            warn!(record = record_id, value = raw, "unparseable issue date kept as-is");
            raw.to_string()
        }
    }
}

fn is_iso_date_shape(prefix: &str) -> bool {
    prefix.bytes().enumerate().all(|(idx, byte)| match idx {
        4 | 7 => byte == b'-',
        _ => byte.is_ascii_digit(),
    })
}
