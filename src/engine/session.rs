//! A benchmark session: one workload, one runner, several backends.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::backend::Backend;
use crate::core::{BackendInfo, RunResult};
use crate::workload::Workload;

use super::runner::BenchmarkRunner;

/// How backends of a session are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// One backend after the other, in configuration order
    #[default]
    Sequential,
    /// Every backend on its own thread; results keep configuration order
    Parallel,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Sequential => f.write_str("sequential"),
            Schedule::Parallel => f.write_str("parallel"),
        }
    }
}

/// Runs the same workload and iteration counts on every backend. Each
/// backend loads its own engine instance; nothing is shared between them.
pub struct Session<'a> {
    runner: &'a BenchmarkRunner,
    workload: &'a Workload,
}

impl<'a> Session<'a> {
    pub fn new(runner: &'a BenchmarkRunner, workload: &'a Workload) -> Self {
        Session { runner, workload }
    }

    pub fn workload(&self) -> &Workload {
        self.workload
    }

    /// One result per backend, in the order given. A load failure on one
    /// backend is recorded as a failed result and does not stop the others.
    pub fn run(&self, backends: &[Box<dyn Backend>], schedule: Schedule) -> Vec<RunResult> {
        info!(
            workload = self.workload.name(),
            backends = backends.len(),
            %schedule,
            "starting session"
        );
        match schedule {
            Schedule::Sequential => backends
                .iter()
                .map(|b| {
                    let backend = b.as_ref();
                    panic::catch_unwind(AssertUnwindSafe(|| self.run_one(backend)))
                        .unwrap_or_else(|_| self.panicked(backend))
                })
                .collect(),
            Schedule::Parallel => thread::scope(|scope| {
                let handles: Vec<_> = backends
                    .iter()
                    .map(|b| {
                        let backend = b.as_ref();
                        (backend, scope.spawn(move || self.run_one(backend)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(backend, handle)| handle.join().unwrap_or_else(|_| self.panicked(backend)))
                    .collect()
            }),
        }
    }

    fn panicked(&self, backend: &dyn Backend) -> RunResult {
        error!(backend = backend.name(), "benchmark thread panicked");
        RunResult::failed(
            BackendInfo::named(backend.name()),
            self.runner.config().warmup_iterations,
            "benchmark thread panicked",
        )
    }

    fn run_one(&self, backend: &dyn Backend) -> RunResult {
        match self.runner.run(backend, self.workload) {
            Ok(result) => result,
            Err(e) => {
                error!(backend = backend.name(), error = %e, "load failed");
                let info = BackendInfo {
                    name: backend.name().to_string(),
                    version: backend.version(),
                    variant: Some(backend.variant().to_string()),
                };
                RunResult::failed(info, self.runner.config().warmup_iterations, e.cause.to_string())
            }
        }
    }
}

/// Names of backends whose load failed and that are listed in `mandatory`.
pub fn mandatory_failures(results: &[RunResult], mandatory: &[String]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.is_failed() && mandatory.iter().any(|m| m == r.backend_name()))
        .map(|r| r.backend_name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LoadError, LoadedProgram, MockBackend, MockConfig, Variant};
    use crate::core::{RunConfig, RunStatus};
    use crate::workload::ScriptSource;

    fn workload() -> Workload {
        Workload::new(
            "unit",
            ScriptSource::new("main.js", "function main() {}"),
            "main",
            Vec::new(),
        )
    }

    fn backends() -> Vec<Box<dyn Backend>> {
        vec![
            Box::new(MockBackend::new(MockConfig::new("first"))),
            Box::new(MockBackend::new(MockConfig::new("broken").load_fails("boom"))),
            Box::new(MockBackend::new(MockConfig::new("absent").unavailable())),
            Box::new(MockBackend::new(MockConfig::new("last"))),
        ]
    }

    #[test]
    fn test_sequential_keeps_order_and_continues_after_failure() {
        let runner = BenchmarkRunner::new(RunConfig::new(2, 3)).unwrap();
        let workload = workload();
        let results = Session::new(&runner, &workload).run(&backends(), Schedule::Sequential);

        let names: Vec<&str> = results.iter().map(|r| r.backend_name()).collect();
        assert_eq!(names, vec!["first", "broken", "absent", "last"]);
        assert_eq!(results[0].status(), &RunStatus::Completed);
        assert_eq!(
            results[1].status(),
            &RunStatus::Failed {
                error: "boom".into()
            }
        );
        assert_eq!(results[2].status(), &RunStatus::Unavailable);
        assert_eq!(results[3].iteration_durations().len(), 3);
    }

    #[test]
    fn test_parallel_matches_sequential_order() {
        let runner = BenchmarkRunner::new(RunConfig::new(1, 2)).unwrap();
        let workload = workload();
        let results = Session::new(&runner, &workload).run(&backends(), Schedule::Parallel);

        let labels: Vec<&str> = results.iter().map(|r| r.status().label()).collect();
        assert_eq!(labels, vec!["completed", "failed", "unavailable", "completed"]);
    }

    #[test]
    fn test_mandatory_failures_only_lists_failed_mandatory() {
        let runner = BenchmarkRunner::new(RunConfig::new(1, 1)).unwrap();
        let workload = workload();
        let results = Session::new(&runner, &workload).run(&backends(), Schedule::Sequential);

        let mandatory = vec!["broken".to_string(), "absent".to_string(), "first".to_string()];
        assert_eq!(mandatory_failures(&results, &mandatory), vec!["broken"]);
        assert!(mandatory_failures(&results, &[]).is_empty());
    }

    struct PanickingBackend;

    impl Backend for PanickingBackend {
        fn name(&self) -> &str {
            "panicky"
        }

        fn variant(&self) -> Variant {
            Variant::InProcess
        }

        fn version(&self) -> Option<String> {
            None
        }

        fn is_available(&self) -> bool {
            true
        }

        fn load<'a>(&'a self, _workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
            panic!("engine crashed while loading");
        }
    }

    #[test]
    fn test_panicking_backend_is_isolated_on_both_schedules() {
        let runner = BenchmarkRunner::new(RunConfig::new(1, 2)).unwrap();
        let workload = workload();
        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(PanickingBackend),
            Box::new(MockBackend::new(MockConfig::new("after"))),
        ];

        for schedule in [Schedule::Sequential, Schedule::Parallel] {
            let results = Session::new(&runner, &workload).run(&backends, schedule);

            let labels: Vec<&str> = results.iter().map(|r| r.status().label()).collect();
            assert_eq!(labels, vec!["failed", "completed"], "{schedule}");
            assert_eq!(
                results[0].status(),
                &RunStatus::Failed {
                    error: "benchmark thread panicked".into()
                }
            );
            assert_eq!(results[1].iteration_durations().len(), 2);
        }
    }
}
