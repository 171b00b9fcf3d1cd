use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{GroundTruthRecord, RecognitionOutput};
use crate::recognition::{Loaded, OutputSource, OutputStatus};
use crate::scoring::aggregate::DatasetAggregate;
use crate::scoring::engine::RecognitionEngineAdapter;
use crate::scoring::record::{RecordResult, score_record};

#[derive(Debug, Clone, Serialize)]
pub struct DegradedRecord {
    pub id: String,
    pub engine: &'static str,
    pub problem: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRecord {
    pub id: String,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub aggregate: DatasetAggregate,
    /// Scored records in input order; failed records are absent.
    pub results: Vec<RecordResult>,
    pub degraded: Vec<DegradedRecord>,
    pub failed: Vec<FailedRecord>,
}

/// Drives loading and scoring record by record, then folds the results.
pub struct DatasetAggregator<'a, S: OutputSource> {
    adapters: &'a [Box<dyn RecognitionEngineAdapter>],
    source: &'a S,
}

impl<'a, S: OutputSource> DatasetAggregator<'a, S> {
    pub fn new(adapters: &'a [Box<dyn RecognitionEngineAdapter>], source: &'a S) -> Self {
        Self { adapters, source }
    }

    pub fn process(&self, records: Vec<GroundTruthRecord>) -> BatchOutcome {
        let total = records.len();
        let mut results = Vec::with_capacity(total);
        let mut degraded = Vec::new();
        let mut failed = Vec::new();

        for record in records {
            let outputs = match self.load_outputs(&record) {
                Ok(outputs) => outputs,
                Err(err) => {
                    warn!(record = %record.id, error = %err, "record skipped");
                    failed.push(FailedRecord {
                        id: record.id,
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };

            for (adapter, output) in self.adapters.iter().zip(&outputs) {
                match output.status {
                    OutputStatus::Present => {}
                    OutputStatus::Missing => {
                        debug!(record = %record.id, engine = adapter.id(), "output missing");
                    }
                    OutputStatus::Malformed => {
                        let problem = output.problem.clone().unwrap_or_default();
                        warn!(
                            record = %record.id,
                            engine = adapter.id(),
                            problem = %problem,
                            "malformed output treated as missing"
                        );
                        degraded.push(DegradedRecord {
                            id: record.id.clone(),
                            engine: adapter.id(),
                            problem,
                        });
                    }
                }
            }

            results.push(score_record(self.adapters, record, &outputs));
        }

        let aggregate = DatasetAggregate::from_results(self.adapters, &results);
        info!(
            records = total,
            scored = aggregate.count_all,
            degraded = degraded.len(),
            failed = failed.len(),
            "dataset scored"
        );

        BatchOutcome {
            aggregate,
            results,
            degraded,
            failed,
        }
    }

    fn load_outputs(&self, record: &GroundTruthRecord) -> Result<Vec<Loaded<RecognitionOutput>>> {
        self.adapters
            .iter()
            .map(|adapter| {
                self.source
                    .recognition_output(adapter.output_dir(), &record.id)
            })
            .collect()
    }
}
