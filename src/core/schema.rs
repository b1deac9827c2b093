//! BenchRecord schema v1 - the persisted form of a backend run.

use serde::{Deserialize, Serialize};

use crate::{BenchError, BenchResult};

use super::env::EnvironmentInfo;
use super::result::{RunResult, RunStatus};

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Warmup invocations per backend unless configured otherwise.
pub const DEFAULT_WARMUP_ITERATIONS: u32 = 15;
/// Measured invocations per backend unless configured otherwise.
pub const DEFAULT_MEASURED_ITERATIONS: u32 = 10;

/// Timing statistics over the measured iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStat {
    pub iterations: u32,
    pub total_ms: f64,
    pub mean_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_ms: Option<f64>,
    pub min_ms: f64,
    pub max_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
}

impl TimingStat {
    /// Create TimingStat from a slice of sample times in milliseconds
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return TimingStat {
                iterations: 0,
                total_ms: 0.0,
                mean_ms: 0.0,
                median_ms: None,
                stddev_ms: None,
                min_ms: 0.0,
                max_ms: 0.0,
                p95_ms: None,
            };
        }

        let total_ms: f64 = samples.iter().sum();
        let mean_ms = total_ms / n as f64;
        let variance = samples.iter().map(|x| (x - mean_ms).powi(2)).sum::<f64>() / n as f64;

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let median_ms = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        TimingStat {
            iterations: n as u32,
            total_ms,
            mean_ms,
            median_ms: Some(median_ms),
            stddev_ms: Some(variance.sqrt()),
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            p95_ms: Some(nearest_rank(&sorted, 0.95)),
        }
    }
}

// index = ceil(q * n) - 1, clamped to the slice
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let idx = ((q * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    sorted[idx]
}

/// Backend information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl BackendInfo {
    pub fn named(name: impl Into<String>) -> Self {
        BackendInfo {
            name: name.into(),
            version: None,
            variant: None,
        }
    }
}

/// Run configuration for benchmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub warmup_iterations: u32,
    pub measured_iterations: u32,
    /// Per-invocation timeout for backends that support one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            warmup_iterations: DEFAULT_WARMUP_ITERATIONS,
            measured_iterations: DEFAULT_MEASURED_ITERATIONS,
            timeout_secs: None,
        }
    }
}

impl RunConfig {
    pub fn new(warmup_iterations: u32, measured_iterations: u32) -> Self {
        RunConfig {
            warmup_iterations,
            measured_iterations,
            timeout_secs: None,
        }
    }

    /// Both iteration counts must be positive.
    pub fn validate(&self) -> BenchResult<()> {
        if self.warmup_iterations == 0 {
            return Err(BenchError::Message(
                "warmup iterations must be at least 1".into(),
            ));
        }
        if self.measured_iterations == 0 {
            return Err(BenchError::Message(
                "measured iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs
            .filter(|s| *s > 0)
            .map(std::time::Duration::from_secs)
    }
}

/// Canonical benchmark record - one per backend per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Unique identifier for this record
    pub record_id: String,

    /// ISO 8601 timestamp
    pub timestamp: String,

    /// Workload name (e.g. typescript-typecheck)
    pub workload: String,

    /// SHA-256 over the workload's sources
    pub workload_sha256: String,

    /// Environment information (CPU, OS, git, etc.)
    pub env: EnvironmentInfo,

    /// Backend measured
    pub backend: BackendInfo,

    /// Run configuration
    pub config: RunConfig,

    /// Whether the backend existed in the runtime
    pub available: bool,

    /// How the run ended
    pub status: RunStatus,

    /// Measured iteration latencies, in invocation order
    #[serde(default)]
    pub times_ms: Vec<f64>,

    /// Sum of `times_ms`
    pub total_ms: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<TimingStat>,

    #[serde(default)]
    pub warmup_failures: u32,

    /// Command line arguments used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cli_args: Vec<String>,
}

impl BenchRecord {
    /// Build the persisted record for one backend run.
    pub fn from_result(
        result: &RunResult,
        workload: &str,
        workload_sha256: &str,
        env: EnvironmentInfo,
        config: RunConfig,
    ) -> Self {
        let timestamp = crate::now_rfc3339();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let record_id = format!("{:x}-{}", nanos, result.backend_name());

        BenchRecord {
            schema_version: SCHEMA_VERSION,
            record_id,
            timestamp,
            workload: workload.to_string(),
            workload_sha256: workload_sha256.to_string(),
            env,
            backend: result.backend().clone(),
            config,
            available: result.available(),
            status: result.status().clone(),
            times_ms: result.times_ms(),
            total_ms: result.total_ms(),
            stats: result.stats(),
            warmup_failures: result.warmup_failures(),
            cli_args: Vec::new(),
        }
    }

    pub fn with_cli_args(mut self, args: Vec<String>) -> Self {
        self.cli_args = args;
        self
    }
}
