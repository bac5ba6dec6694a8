//! JSON output formatting
//!
//! One document per run: run metadata, per-entity statistics in collection
//! order, and run-wide totals. Extrema and means of entities without a
//! primary observation serialize as `null`.

use super::RunInfo;
use crate::collector::EntityResult;
use crate::stats::aggregator::{compute_totals, GlobalTotals};
use crate::stats::BUCKETS;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub metadata: JsonMetadata,
    pub entities: Vec<JsonEntity>,
    pub totals: JsonTotals,
}

/// Run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMetadata {
    /// RFC 3339 UTC timestamp of report generation
    pub timestamp: String,
    pub backend: String,
    pub parallelism: usize,
    pub elapsed_secs: f64,
    pub entities_per_sec: f64,
}

/// Per-entity statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEntity {
    pub entity: String,
    pub records: u64,
    pub observations: u64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub precipitation: f64,
    /// Mean per month bucket, `null` for empty buckets
    pub monthly_means: Vec<Option<f64>>,
}

impl From<&EntityResult> for JsonEntity {
    fn from(result: &EntityResult) -> Self {
        let stats = &result.stats;
        Self {
            entity: result.entity.clone(),
            records: stats.total_records,
            observations: stats.count,
            mean: stats.mean(),
            min: stats.min_value(),
            max: stats.max_value(),
            precipitation: stats.secondary_sum,
            monthly_means: (0..BUCKETS).map(|b| stats.bucket_mean(b)).collect(),
        }
    }
}

/// Run-wide totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTotals {
    pub entities: usize,
    pub records: u64,
    pub observations: u64,
    pub primary_sum: f64,
    pub global_mean: Option<f64>,
    pub precipitation: f64,
}

impl From<GlobalTotals> for JsonTotals {
    fn from(totals: GlobalTotals) -> Self {
        Self {
            entities: totals.entities,
            records: totals.total_records,
            observations: totals.total_primary_count,
            primary_sum: totals.total_primary_sum,
            global_mean: totals.global_mean(),
            precipitation: totals.total_secondary_sum,
        }
    }
}

/// Build the JSON report for a run
pub fn build_report(results: &[EntityResult], run: RunInfo) -> JsonReport {
    let totals = compute_totals(results);
    JsonReport {
        metadata: JsonMetadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            backend: run.backend.to_string(),
            parallelism: run.parallelism,
            elapsed_secs: run.elapsed.as_secs_f64(),
            entities_per_sec: run.entities_per_sec(totals.entities),
        },
        entities: results.iter().map(JsonEntity::from).collect(),
        totals: totals.into(),
    }
}

/// Write JSON report to file (pretty printed)
pub fn write_json_report(output_path: &Path, results: &[EntityResult], run: RunInfo) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    serde_json::to_writer_pretty(BufWriter::new(file), &build_report(results, run))
        .with_context(|| format!("Failed to write JSON output: {}", output_path.display()))?;

    Ok(())
}
