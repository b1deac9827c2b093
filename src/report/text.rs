//! Plain-text and markdown rendering of session results.

use std::fmt::Write;

use crate::core::{RunResult, RunStatus};

/// Per-backend console report.
///
/// ```text
/// === quickjs (in-process) ===
/// iteration: 812.402
/// iteration: 790.118
/// total: 1602.520 ms over 2 iterations
/// ```
pub fn render_text(results: &[RunResult]) -> String {
    let mut out = String::new();
    for result in results {
        let variant = result.backend().variant.as_deref().unwrap_or("unknown");
        let _ = writeln!(out, "=== {} ({}) ===", result.backend_name(), variant);

        match result.status() {
            RunStatus::Unavailable => {
                let _ = writeln!(out, "*** {} not found ***", result.backend_name());
            }
            RunStatus::Failed { error } => {
                let _ = writeln!(out, "*** load failed: {error} ***");
            }
            RunStatus::Completed | RunStatus::Partial { .. } => {
                for ms in result.times_ms() {
                    let _ = writeln!(out, "iteration: {ms:.3}");
                }
                if let RunStatus::Partial { recorded, error } = result.status() {
                    let _ = writeln!(out, "*** stopped after {recorded} iterations: {error} ***");
                }
                if result.warmup_failures() > 0 {
                    let _ = writeln!(
                        out,
                        "*** {} of {} warmup invocations failed ***",
                        result.warmup_failures(),
                        result.warmup_count()
                    );
                }
                let _ = writeln!(
                    out,
                    "total: {:.3} ms over {} iterations",
                    result.total_ms(),
                    result.iteration_durations().len()
                );
            }
        }
        out.push('\n');
    }
    out
}

/// Markdown comparison table, one row per backend.
pub fn render_summary(results: &[RunResult]) -> String {
    let mut out = String::new();
    out.push_str("| backend | status | iterations | total | mean | min | max | stddev |\n");
    out.push_str("|---------|--------|-----------:|------:|-----:|----:|----:|-------:|\n");
    for result in results {
        let stats = result.stats();
        let cell = |v: Option<f64>| v.map(format_ms).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            result.backend_name(),
            result.status().label(),
            result.iteration_durations().len(),
            cell(stats.as_ref().map(|s| s.total_ms)),
            cell(stats.as_ref().map(|s| s.mean_ms)),
            cell(stats.as_ref().map(|s| s.min_ms)),
            cell(stats.as_ref().map(|s| s.max_ms)),
            cell(stats.as_ref().and_then(|s| s.stddev_ms)),
        );
    }
    out
}

fn format_ms(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.2}s", value / 1000.0)
    } else {
        format!("{:.1}ms", value)
    }
}
