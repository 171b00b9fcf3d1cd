//! Reconciliation of recognizer outputs against ground truth and the dataset-wide fold.

pub mod aggregate;
pub mod comparator;
pub mod confidence;
pub mod dataset;
pub mod engine;
pub mod features;
pub mod record;

pub use self::dataset::{BatchOutcome, DatasetAggregator};
pub use self::features::FeatureExporter;
pub use self::record::RecordResult;
