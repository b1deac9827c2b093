//! CSV export for benchmark records.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::core::schema::BenchRecord;

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "schema_version",
    "record_id",
    "timestamp",
    "workload",
    "workload_sha256",
    "backend_name",
    "backend_version",
    "backend_variant",
    "available",
    "status",
    "git_sha",
    "warmup",
    "iterations",
    "recorded",
    "warmup_failures",
    "total_ms",
    "mean_ms",
    "median_ms",
    "stddev_ms",
    "min_ms",
    "max_ms",
    "p95_ms",
    "times_ms",
];

/// Flattens records to one CSV row each.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Write `records` to `output`, replacing the file.
    pub fn export(&self, records: &[BenchRecord], output: &Path) -> Result<(), BenchError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(records, file)
    }

    pub fn export_to_writer<W: Write>(
        &self,
        records: &[BenchRecord],
        writer: W,
    ) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        for record in records {
            csv_writer
                .write_record(Self::record_to_row(record))
                .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }

    fn record_to_row(record: &BenchRecord) -> Vec<String> {
        let ms = |v: f64| format!("{v:.3}");
        let stat = |f: fn(&crate::core::TimingStat) -> Option<f64>| {
            record.stats.as_ref().and_then(f).map(ms).unwrap_or_default()
        };
        // Per-iteration latencies share one cell, separated by `;`.
        let times = record
            .times_ms
            .iter()
            .map(|t| ms(*t))
            .collect::<Vec<_>>()
            .join(";");

        vec![
            record.schema_version.to_string(),
            record.record_id.clone(),
            record.timestamp.clone(),
            record.workload.clone(),
            record.workload_sha256.clone(),
            record.backend.name.clone(),
            record.backend.version.clone().unwrap_or_default(),
            record.backend.variant.clone().unwrap_or_default(),
            record.available.to_string(),
            record.status.label().to_string(),
            record.env.git_sha.clone().unwrap_or_default(),
            record.config.warmup_iterations.to_string(),
            record.config.measured_iterations.to_string(),
            record.times_ms.len().to_string(),
            record.warmup_failures.to_string(),
            ms(record.total_ms),
            stat(|s| Some(s.mean_ms)),
            stat(|s| s.median_ms),
            stat(|s| s.stddev_ms),
            stat(|s| Some(s.min_ms)),
            stat(|s| Some(s.max_ms)),
            stat(|s| s.p95_ms),
            times,
        ]
    }
}
