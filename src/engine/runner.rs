//! Warmup/measure protocol for a single backend.
//!
//! One call to [`BenchmarkRunner::run`] goes through the phases
//! `Idle -> Loading -> WarmingUp -> Measuring -> Completed`, or ends in
//! `Failed` when the workload cannot be loaded. Warmup latencies are
//! discarded; measured latencies are kept in invocation order. The loaded
//! program is dropped (and its engine torn down) before the result is built,
//! whatever the outcome.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::BenchResult;
use crate::backend::{Backend, LoadError};
use crate::core::{BackendInfo, RunConfig, RunResult};
use crate::workload::Workload;

/// Phase of a single backend run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    WarmingUp,
    Measuring,
    Completed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Loading => "loading",
            RunPhase::WarmingUp => "warming-up",
            RunPhase::Measuring => "measuring",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The workload could not be loaded into a backend.
#[derive(Debug, Error)]
#[error("failed to load workload into `{backend}`: {cause}")]
pub struct BenchmarkLoadError {
    pub backend: String,
    #[source]
    pub cause: LoadError,
}

/// Runs the warmup/measure protocol with fixed iteration counts.
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    config: RunConfig,
}

impl BenchmarkRunner {
    pub fn new(config: RunConfig) -> BenchResult<Self> {
        config.validate()?;
        Ok(BenchmarkRunner { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Benchmark `workload` on `backend`.
    ///
    /// An unavailable backend yields an unavailable result without loading
    /// anything. A failed warmup invocation is skipped and counted; a failed
    /// measured invocation stops measurement and the durations recorded so
    /// far are kept as a partial result.
    pub fn run(
        &self,
        backend: &dyn Backend,
        workload: &Workload,
    ) -> Result<RunResult, BenchmarkLoadError> {
        let span = info_span!("run", backend = backend.name(), workload = workload.name());
        let _guard = span.enter();

        let mut phase = RunPhase::Idle;
        let warmup = self.config.warmup_iterations;
        let measured = self.config.measured_iterations;

        if !backend.is_available() {
            info!("backend unavailable, skipping");
            return Ok(RunResult::unavailable(BackendInfo::named(backend.name()), warmup));
        }

        let info = BackendInfo {
            name: backend.name().to_string(),
            version: backend.version(),
            variant: Some(backend.variant().to_string()),
        };

        transition(&mut phase, RunPhase::Loading);
        let mut program = match backend.load(workload) {
            Ok(program) => program,
            Err(cause) => {
                transition(&mut phase, RunPhase::Failed);
                return Err(BenchmarkLoadError {
                    backend: backend.name().to_string(),
                    cause,
                });
            }
        };

        transition(&mut phase, RunPhase::WarmingUp);
        info!(iterations = warmup, "warming up");
        let mut warmup_failures = 0u32;
        for i in 0..warmup {
            if let Err(e) = program.invoke() {
                warmup_failures += 1;
                warn!(iteration = i + 1, error = %e, "warmup invocation failed");
            }
        }

        transition(&mut phase, RunPhase::Measuring);
        info!(iterations = measured, "warmup finished, now measuring");
        let mut durations: Vec<Duration> = Vec::with_capacity(measured as usize);
        let mut failure = None;
        for i in 0..measured {
            match program.invoke() {
                Ok(elapsed) => {
                    debug!(iteration = i + 1, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "iteration");
                    durations.push(elapsed);
                }
                Err(e) => {
                    warn!(iteration = i + 1, error = %e, "measured invocation failed, stopping");
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        drop(program);
        transition(&mut phase, RunPhase::Completed);

        Ok(RunResult::measured(info, warmup, warmup_failures, durations, failure))
    }
}

fn transition(phase: &mut RunPhase, next: RunPhase) {
    debug!(from = %phase, to = %next, "phase");
    *phase = next;
}
