use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::scoring::comparator::EMPTY_RECOGNITION;
use crate::scoring::engine::RecognitionEngineAdapter;
use crate::scoring::record::{MetricValue, RecordResult, TrackedField};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub name: String,
    engine: &'static str,
    metric: &'static str,
    /// `(record id, value)`, one per absorbed record.
    pub points: Vec<(String, MetricValue)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldTally {
    pub exact: usize,
    pub empty: usize,
    pub mismatched: usize,
    pub distance_total: i64,
}

impl FieldTally {
    fn absorb(&mut self, score: i64) {
        match score {
            0 => self.exact += 1,
            EMPTY_RECOGNITION => self.empty += 1,
            distance => {
                self.mismatched += 1;
                self.distance_total += distance;
            }
        }
    }

    /// Mean edit distance over the fields that were recognized but wrong.
    pub fn mean_distance(&self) -> Option<f64> {
        if self.mismatched == 0 {
            None
        } else {
            Some(self.distance_total as f64 / self.mismatched as f64)
        }
    }
}

/// Dataset-wide totals and chart series, folded record by record.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAggregate {
    pub count_all: usize,
    /// Successful records per engine, in adapter order.
    pub success_counts: Vec<(&'static str, usize)>,
    pub series: Vec<MetricSeries>,
    pub field_summary: BTreeMap<&'static str, BTreeMap<TrackedField, FieldTally>>,
}

impl DatasetAggregate {
    pub fn seeded(adapters: &[Box<dyn RecognitionEngineAdapter>]) -> Self {
        let success_counts = adapters.iter().map(|adapter| (adapter.id(), 0)).collect();
        let series = adapters
            .iter()
            .flat_map(|adapter| {
                adapter.metric_names().iter().map(move |metric| MetricSeries {
                    name: format!("{}_{metric}", adapter.id()),
                    engine: adapter.id(),
                    metric: *metric,
                    points: Vec::new(),
                })
            })
            .collect();

        Self {
            count_all: 0,
            success_counts,
            series,
            field_summary: BTreeMap::new(),
        }
    }

    /// Folds one record in. Every series receives exactly one point; metrics an
    /// engine did not produce are recorded as 0.
    pub fn absorb(mut self, result: &RecordResult) -> Self {
        self.count_all += 1;

        for (engine, count) in &mut self.success_counts {
            if result.engine(*engine).is_some_and(|evaluation| evaluation.success) {
                *count += 1;
            }
        }

        for series in &mut self.series {
            let value = result
                .engine(series.engine)
                .and_then(|evaluation| evaluation.metric(series.metric))
                .unwrap_or(MetricValue::Int(0));
            series.points.push((result.record.id.clone(), value));
        }

        for evaluation in &result.engines {
            let Some(accuracy) = evaluation.accuracy.as_ref() else {
                continue;
            };
            let tallies = self.field_summary.entry(evaluation.engine).or_default();
            for (field, score) in accuracy {
                tallies.entry(*field).or_default().absorb(*score);
            }
        }

        self
    }

    pub fn from_results(
        adapters: &[Box<dyn RecognitionEngineAdapter>],
        results: &[RecordResult],
    ) -> Self {
        results
            .iter()
            .fold(Self::seeded(adapters), |aggregate, result| aggregate.absorb(result))
    }

    pub fn success_count(&self, engine: &str) -> usize {
        self.success_counts
            .iter()
            .find(|(id, _)| *id == engine)
            .map_or(0, |(_, count)| *count)
    }

    /// Every series holds one point per absorbed record.
    pub fn is_aligned(&self) -> bool {
        self.series
            .iter()
            .all(|series| series.points.len() == self.count_all)
    }

    pub fn series(&self, name: &str) -> Option<&MetricSeries> {
        self.series.iter().find(|series| series.name == name)
    }

    /// Chart payload: each series as `[label, value]` rows under a `["", ""]` header.
    pub fn charts(&self) -> Map<String, Value> {
        self.series
            .iter()
            .map(|series| {
                let rows = std::iter::once(json!(["", ""]))
                    .chain(
                        series
                            .points
                            .iter()
                            .map(|(label, value)| json!([label, value])),
                    )
                    .collect::<Vec<_>>();
                (series.name.clone(), Value::Array(rows))
            })
            .collect()
    }

    pub fn counts(&self) -> Map<String, Value> {
        let mut counts = Map::new();
        counts.insert("all".to_string(), json!(self.count_all));
        for (engine, count) in &self.success_counts {
            counts.insert((*engine).to_string(), json!(count));
        }
        counts
    }
}
