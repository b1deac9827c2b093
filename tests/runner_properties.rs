//! Warmup/measure protocol properties, checked with the mock backend.

use std::time::Duration;

use script_bench::backend::{Backend, MockBackend, MockConfig, MockEvent};
use script_bench::core::{RunConfig, RunResult, RunStatus};
use script_bench::engine::{BenchmarkRunner, Schedule, Session};
use script_bench::workload::{ScriptSource, Workload};

fn workload() -> Workload {
    Workload::new(
        "properties",
        ScriptSource::new("entry.js", "function compileTypescript() {}"),
        "compileTypescript",
        vec![ScriptSource::new("typescript.js", "var ts = {};")],
    )
}

fn runner(warmup: u32, measured: u32) -> BenchmarkRunner {
    BenchmarkRunner::new(RunConfig::new(warmup, measured)).expect("valid config")
}

fn assert_total_is_sum(result: &RunResult) {
    let sum: Duration = result.iteration_durations().iter().sum();
    assert_eq!(result.total_duration(), sum, "backend {}", result.backend_name());
}

#[test]
fn test_unavailable_backend_makes_no_calls() {
    let backend = MockBackend::new(MockConfig::new("absent").unavailable());
    let log = backend.log();

    let result = runner(15, 10).run(&backend, &workload()).unwrap();

    assert!(!result.available());
    assert!(result.iteration_durations().is_empty());
    assert_eq!(log.load_calls(), 0);
    assert_eq!(log.invoke_calls(), 0);
    assert_total_is_sum(&result);
}

#[test]
fn test_warmup_strictly_precedes_measurement() {
    let backend = MockBackend::new(MockConfig::new("ok"));
    let log = backend.log();

    let result = runner(15, 10).run(&backend, &workload()).unwrap();

    assert_eq!(result.iteration_durations().len(), 10);
    let events = log.events();
    assert_eq!(events.len(), 1 + 25 + 1);
    assert_eq!(events[0], MockEvent::Load);
    for (i, event) in events[1..26].iter().enumerate() {
        assert_eq!(*event, MockEvent::Invoke(i + 1));
    }
    assert_eq!(events[26], MockEvent::Release);
    assert_total_is_sum(&result);
}

#[test]
fn test_failure_on_kth_measured_call_keeps_k_minus_one() {
    let warmup = 3u32;
    let measured = 6u32;
    for k in 1..=measured {
        let backend = MockBackend::new(
            MockConfig::new("flaky").fail_on_call(warmup as usize + k as usize),
        );
        let result = runner(warmup, measured).run(&backend, &workload()).unwrap();

        assert_eq!(result.iteration_durations().len(), (k - 1) as usize, "k = {k}");
        match result.status() {
            RunStatus::Partial { recorded, .. } => assert_eq!(*recorded, (k - 1) as usize),
            other => panic!("expected partial, got {other:?}"),
        }
        assert_eq!(backend.log().release_calls(), 1);
        assert_total_is_sum(&result);
    }
}

#[test]
fn test_load_failure_isolated_from_next_backend() {
    let backends: Vec<Box<dyn Backend>> = vec![
        Box::new(MockBackend::new(MockConfig::new("a").load_fails("cannot parse typescript.js"))),
        Box::new(MockBackend::new(MockConfig::new("b"))),
    ];
    let runner = runner(15, 10);
    let workload = workload();

    let results = Session::new(&runner, &workload).run(&backends, Schedule::Sequential);

    assert!(results[0].is_failed());
    assert!(results[0].iteration_durations().is_empty());
    assert_eq!(results[1].status(), &RunStatus::Completed);
    assert_eq!(results[1].iteration_durations().len(), 10);
    for result in &results {
        assert_total_is_sum(result);
    }
}

#[test]
fn test_fixed_duration_sequence_is_preserved() {
    // One warmup call consumes the first scripted value.
    let backend = MockBackend::new(MockConfig::new("stub").with_durations_ms(&[99, 5, 3, 8, 2]));

    let result = runner(1, 4).run(&backend, &workload()).unwrap();

    let ms: Vec<u128> = result.iteration_durations().iter().map(|d| d.as_millis()).collect();
    assert_eq!(ms, vec![5, 3, 8, 2]);
    assert_eq!(result.total_duration(), Duration::from_millis(18));
}

#[test]
fn test_parallel_session_runs_every_backend_once() {
    let mocks: Vec<MockBackend> = (0..4)
        .map(|i| MockBackend::new(MockConfig::new(format!("engine-{i}"))))
        .collect();
    let logs: Vec<_> = mocks.iter().map(|m| m.log()).collect();
    let backends: Vec<Box<dyn Backend>> =
        mocks.into_iter().map(|m| Box::new(m) as Box<dyn Backend>).collect();
    let runner = runner(2, 3);
    let workload = workload();

    let results = Session::new(&runner, &workload).run(&backends, Schedule::Parallel);

    let names: Vec<&str> = results.iter().map(|r| r.backend_name()).collect();
    assert_eq!(names, vec!["engine-0", "engine-1", "engine-2", "engine-3"]);
    for log in logs {
        assert_eq!(log.load_calls(), 1);
        assert_eq!(log.invoke_calls(), 5);
        assert_eq!(log.release_calls(), 1);
    }
}
