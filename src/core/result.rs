//! Per-backend outcome of one benchmark run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::schema::{BackendInfo, TimingStat};

/// How a backend run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Backend absent from the runtime; nothing was loaded
    Unavailable,
    /// Every measured iteration succeeded
    Completed,
    /// A measured invocation failed; durations before it are kept
    Partial { recorded: usize, error: String },
    /// The workload failed to load; no durations
    Failed { error: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Unavailable => "unavailable",
            RunStatus::Completed => "completed",
            RunStatus::Partial { .. } => "partial",
            RunStatus::Failed { .. } => "failed",
        }
    }
}

/// Result of running one backend. Immutable; the total is derived from the
/// recorded durations at construction.
#[derive(Debug, Clone)]
pub struct RunResult {
    backend: BackendInfo,
    available: bool,
    warmup_count: u32,
    warmup_failures: u32,
    iteration_durations: Vec<Duration>,
    total_duration: Duration,
    status: RunStatus,
}

impl RunResult {
    pub fn unavailable(backend: BackendInfo, warmup_count: u32) -> Self {
        Self::build(backend, false, warmup_count, 0, Vec::new(), RunStatus::Unavailable)
    }

    pub fn failed(backend: BackendInfo, warmup_count: u32, error: impl Into<String>) -> Self {
        Self::build(
            backend,
            true,
            warmup_count,
            0,
            Vec::new(),
            RunStatus::Failed {
                error: error.into(),
            },
        )
    }

    /// A run that reached the measured phase. `failure` is the error that
    /// stopped measurement early, if any.
    pub fn measured(
        backend: BackendInfo,
        warmup_count: u32,
        warmup_failures: u32,
        iteration_durations: Vec<Duration>,
        failure: Option<String>,
    ) -> Self {
        let status = match failure {
            Some(error) => RunStatus::Partial {
                recorded: iteration_durations.len(),
                error,
            },
            None => RunStatus::Completed,
        };
        Self::build(
            backend,
            true,
            warmup_count,
            warmup_failures,
            iteration_durations,
            status,
        )
    }

    fn build(
        backend: BackendInfo,
        available: bool,
        warmup_count: u32,
        warmup_failures: u32,
        iteration_durations: Vec<Duration>,
        status: RunStatus,
    ) -> Self {
        let total_duration = iteration_durations.iter().sum();
        RunResult {
            backend,
            available,
            warmup_count,
            warmup_failures,
            iteration_durations,
            total_duration,
            status,
        }
    }

    pub fn backend(&self) -> &BackendInfo {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        &self.backend.name
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn warmup_count(&self) -> u32 {
        self.warmup_count
    }

    pub fn warmup_failures(&self) -> u32 {
        self.warmup_failures
    }

    pub fn iteration_durations(&self) -> &[Duration] {
        &self.iteration_durations
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.status, RunStatus::Partial { .. })
    }

    /// Per-iteration latency in fractional milliseconds.
    pub fn times_ms(&self) -> Vec<f64> {
        self.iteration_durations
            .iter()
            .map(|d| duration_ms(*d))
            .collect()
    }

    pub fn total_ms(&self) -> f64 {
        duration_ms(self.total_duration)
    }

    /// Summary statistics over the measured iterations, if any were recorded.
    pub fn stats(&self) -> Option<TimingStat> {
        if self.iteration_durations.is_empty() {
            None
        } else {
            Some(TimingStat::from_samples(&self.times_ms()))
        }
    }
}

/// Milliseconds with sub-millisecond precision; exact for whole milliseconds.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> BackendInfo {
        BackendInfo {
            name: name.to_string(),
            version: None,
            variant: None,
        }
    }

    #[test]
    fn test_total_is_sum_of_durations() {
        let durations: Vec<Duration> = [5, 3, 8, 2].iter().map(|ms| Duration::from_millis(*ms)).collect();
        let result = RunResult::measured(info("a"), 15, 0, durations, None);
        assert_eq!(result.total_duration(), Duration::from_millis(18));
        assert_eq!(result.status(), &RunStatus::Completed);
        assert!(result.available());
    }

    #[test]
    fn test_unavailable_has_no_durations() {
        let result = RunResult::unavailable(info("nashorn"), 15);
        assert!(!result.available());
        assert!(result.iteration_durations().is_empty());
        assert_eq!(result.total_duration(), Duration::ZERO);
        assert!(result.stats().is_none());
    }

    #[test]
    fn test_partial_records_count() {
        let durations = vec![Duration::from_millis(4), Duration::from_millis(6)];
        let result = RunResult::measured(info("a"), 1, 0, durations, Some("boom".into()));
        assert!(result.is_partial());
        assert_eq!(
            result.status(),
            &RunStatus::Partial {
                recorded: 2,
                error: "boom".into()
            }
        );
        assert_eq!(result.total_duration(), Duration::from_millis(10));
    }

    #[test]
    fn test_failed_is_available_but_empty() {
        let result = RunResult::failed(info("a"), 15, "syntax error");
        assert!(result.available());
        assert!(result.is_failed());
        assert!(result.iteration_durations().is_empty());
        assert_eq!(result.status().label(), "failed");
    }
}
