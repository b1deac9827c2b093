//! `script-bench` command implementations.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use crate::backend::{Backend, BackendRegistry};
use crate::core::schema::{DEFAULT_MEASURED_ITERATIONS, DEFAULT_WARMUP_ITERATIONS};
use crate::core::{BenchRecord, EnvironmentInfo, RunConfig, RunResult};
use crate::engine::{BenchmarkRunner, Schedule, Session, mandatory_failures};
use crate::report::{render_summary, render_text};
use crate::storage::{CsvExporter, JsonlWriter};
use crate::workload::{
    BundledResources, DEFAULT_ENTRY_POINT, ResourceDir, ResourceLoader, ResourceNotFoundError, ScriptSource,
    Workload, WorkloadKind,
};
use crate::{BenchError, BenchResult};

use super::config::{SessionConfig, load_session_config};

const DEFAULT_RESOURCES: &str = "resources";

/// Options of a benchmark session.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Session config file (TOML, or YAML with a .yaml/.yml extension)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding typescript.js and libPack.js [default: resources]
    #[arg(long)]
    pub resources: Option<PathBuf>,
    /// Bundled compile script to run
    #[arg(long, value_enum)]
    pub workload: Option<WorkloadKind>,
    /// Custom entry script replacing the bundled one
    #[arg(long)]
    pub entry_script: Option<PathBuf>,
    /// Function invoked once per iteration [default: compileTypescript]
    #[arg(long)]
    pub entry_point: Option<String>,
    /// Only run these backends, in this order (repeatable)
    #[arg(long = "backend", value_name = "NAME")]
    pub backends: Vec<String>,
    /// Warmup invocations per backend [default: 15]
    #[arg(long)]
    pub warmup: Option<u32>,
    /// Measured invocations per backend [default: 10]
    #[arg(long)]
    pub iterations: Option<u32>,
    /// Per-invocation timeout in seconds for shell backends
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Run backends concurrently, one thread each
    #[arg(long)]
    pub parallel: bool,
    /// Fail the session if this backend cannot load the workload (repeatable)
    #[arg(long, value_name = "NAME")]
    pub mandatory: Vec<String>,
    /// Write all records as a JSON array to this file
    #[arg(long)]
    pub json: Option<PathBuf>,
    /// Append records to this JSONL history file
    #[arg(long)]
    pub jsonl: Option<PathBuf>,
    /// Write records as CSV to this file
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Print a markdown comparison table after the report
    #[arg(long)]
    pub summary: bool,
}

/// What a session produced, before anything is printed.
#[derive(Debug)]
pub struct SessionOutcome {
    pub workload: String,
    pub workload_sha256: String,
    pub config: RunConfig,
    pub results: Vec<RunResult>,
    /// Mandatory backends whose load failed
    pub mandatory_failed: Vec<String>,
}

/// Run a session, print the report and write the requested outputs.
pub fn run(args: RunArgs) -> BenchResult<()> {
    let outcome = execute(&args)?;

    print!("{}", render_text(&outcome.results));
    if args.summary {
        println!("{}", render_summary(&outcome.results));
    }

    if args.json.is_some() || args.jsonl.is_some() || args.csv.is_some() {
        let records = to_records(&outcome);
        if let Some(path) = &args.json {
            write_json(path, &records)?;
            info!(path = %path.display(), "wrote JSON records");
        }
        if let Some(path) = &args.jsonl {
            JsonlWriter::new(path).append_all(&records)?;
            info!(path = %path.display(), "appended JSONL records");
        }
        if let Some(path) = &args.csv {
            CsvExporter::new().export(&records, path)?;
            info!(path = %path.display(), "wrote CSV");
        }
    }

    if outcome.mandatory_failed.is_empty() {
        Ok(())
    } else {
        Err(BenchError::MandatoryBackendFailed(outcome.mandatory_failed))
    }
}

/// Resolve configuration, build the workload and run every selected backend.
pub fn execute(args: &RunArgs) -> BenchResult<SessionOutcome> {
    let file_config = match &args.config {
        Some(path) => load_session_config(path)?,
        None => SessionConfig::default(),
    };

    let config = RunConfig {
        warmup_iterations: args
            .warmup
            .or(file_config.warmup)
            .unwrap_or(DEFAULT_WARMUP_ITERATIONS),
        measured_iterations: args
            .iterations
            .or(file_config.iterations)
            .unwrap_or(DEFAULT_MEASURED_ITERATIONS),
        timeout_secs: args.timeout.or(file_config.timeout_secs),
    };
    let runner = BenchmarkRunner::new(config)?;

    let mut registry = registry_for(&file_config).with_timeout(config.timeout());
    registry.require(&args.mandatory);
    let backends: Vec<Box<dyn Backend>> = if args.backends.is_empty() {
        registry.resolve_all()
    } else {
        registry.select(&args.backends)
    };
    let mandatory: Vec<String> = backends
        .iter()
        .map(|b| b.name().to_string())
        .filter(|n| registry.is_mandatory(n))
        .collect();

    let resources = args
        .resources
        .clone()
        .or_else(|| file_config.resources.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES));
    let workload = build_workload(
        &ResourceDir::new(resources),
        args.workload.or(file_config.workload).unwrap_or_default(),
        args.entry_script.as_deref(),
        args.entry_point.as_deref(),
    )?;
    let workload_sha256 = workload.fingerprint();
    info!(workload = workload.name(), sha256 = %workload_sha256, "workload loaded");

    let schedule = if args.parallel || file_config.parallel.unwrap_or(false) {
        Schedule::Parallel
    } else {
        Schedule::Sequential
    };
    let results = Session::new(&runner, &workload).run(&backends, schedule);
    let mandatory_failed = mandatory_failures(&results, &mandatory);

    Ok(SessionOutcome {
        workload: workload.name().to_string(),
        workload_sha256,
        config,
        results,
        mandatory_failed,
    })
}

/// Print configured backends with availability and version.
pub fn list(config: Option<PathBuf>) -> BenchResult<()> {
    let file_config = match config {
        Some(path) => load_session_config(&path)?,
        None => SessionConfig::default(),
    };
    let registry = registry_for(&file_config);
    for (name, available, version) in registry.availability() {
        let mandatory = if registry.is_mandatory(&name) { " (mandatory)" } else { "" };
        let state = if available { "available" } else { "unavailable" };
        println!(
            "{:<12} {:<12} {}{}",
            name,
            state,
            version.as_deref().unwrap_or("-"),
            mandatory
        );
    }
    Ok(())
}

fn registry_for(config: &SessionConfig) -> BackendRegistry {
    if config.backends.is_empty() {
        BackendRegistry::with_defaults()
    } else {
        BackendRegistry::from_specs(config.backends.clone())
    }
}

/// Assemble the workload; a missing asset aborts the whole session.
pub fn build_workload(
    assets: &dyn ResourceLoader,
    kind: WorkloadKind,
    entry_script: Option<&Path>,
    entry_point: Option<&str>,
) -> Result<Workload, ResourceNotFoundError> {
    match (entry_script, entry_point) {
        (None, None) => Workload::typescript_compile(assets, kind),
        (Some(path), entry_point) => {
            let text = std::fs::read_to_string(path).map_err(|e| ResourceNotFoundError {
                name: path.display().to_string(),
                location: "entry script".to_string(),
                detail: e.to_string(),
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "entry.js".to_string());
            let workload_name = path
                .file_stem()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| kind.workload_name().to_string());
            Workload::typescript_compile_with(
                assets,
                &workload_name,
                ScriptSource::new(name, text),
                entry_point.unwrap_or(DEFAULT_ENTRY_POINT),
            )
        }
        (None, Some(entry_point)) => {
            let text = BundledResources.load_text(kind.asset_name())?;
            Workload::typescript_compile_with(
                assets,
                kind.workload_name(),
                ScriptSource::new(kind.asset_name(), text),
                entry_point,
            )
        }
    }
}

/// Persisted form of every result of a session.
pub fn to_records(outcome: &SessionOutcome) -> Vec<BenchRecord> {
    let env = EnvironmentInfo::detect();
    let cli_args: Vec<String> = std::env::args().collect();
    outcome
        .results
        .iter()
        .map(|r| {
            BenchRecord::from_result(
                r,
                &outcome.workload,
                &outcome.workload_sha256,
                env.clone(),
                outcome.config,
            )
            .with_cli_args(cli_args.clone())
        })
        .collect()
}

fn write_json(path: &Path, records: &[BenchRecord]) -> BenchResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| BenchError::Message(e.to_string()))?;
        }
    }
    let bytes = serde_json::to_vec_pretty(records).map_err(|e| BenchError::Message(e.to_string()))?;
    std::fs::write(path, bytes).map_err(|e| BenchError::Message(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("typescript.js"), "var ts = {};").unwrap();
        std::fs::write(dir.path().join("libPack.js"), "function getLibFileContent() {}").unwrap();
        dir
    }

    #[test]
    fn test_build_workload_bundled() {
        let dir = resources();
        let workload =
            build_workload(&ResourceDir::new(dir.path()), WorkloadKind::NoTypecheck, None, None)
                .unwrap();
        assert_eq!(workload.name(), "typescript-no-typecheck");
        assert_eq!(workload.entry_point(), DEFAULT_ENTRY_POINT);
        assert_eq!(workload.auxiliary_sources().len(), 2);
    }

    #[test]
    fn test_build_workload_custom_entry() {
        let dir = resources();
        let script = dir.path().join("bench_me.js");
        std::fs::write(&script, "function go() {}").unwrap();

        let workload = build_workload(
            &ResourceDir::new(dir.path()),
            WorkloadKind::Typecheck,
            Some(&script),
            Some("go"),
        )
        .unwrap();
        assert_eq!(workload.name(), "bench_me");
        assert_eq!(workload.entry_point(), "go");
        assert_eq!(workload.source_text(), "function go() {}");
    }

    /// Counts every asset read.
    struct CountingLoader {
        inner: ResourceDir,
        reads: std::cell::RefCell<Vec<String>>,
    }

    impl ResourceLoader for CountingLoader {
        fn load_text(&self, name: &str) -> Result<String, ResourceNotFoundError> {
            self.reads.borrow_mut().push(name.to_string());
            self.inner.load_text(name)
        }
    }

    #[test]
    fn test_build_workload_bundled_with_entry_point_reads_assets_once() {
        let dir = resources();
        let loader = CountingLoader {
            inner: ResourceDir::new(dir.path()),
            reads: Default::default(),
        };

        let workload =
            build_workload(&loader, WorkloadKind::Typecheck, None, Some("compileOnce")).unwrap();

        assert_eq!(workload.name(), "typescript-typecheck");
        assert_eq!(workload.entry_point(), "compileOnce");
        assert_eq!(workload.source().name, WorkloadKind::Typecheck.asset_name());
        assert_eq!(*loader.reads.borrow(), vec!["typescript.js", "libPack.js"]);
    }

    #[test]
    fn test_missing_resource_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            resources: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = execute(&args).unwrap_err();
        assert!(matches!(err, BenchError::Resource(_)));
        assert!(err.to_string().contains("typescript.js"));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let dir = resources();
        let args = RunArgs {
            resources: Some(dir.path().to_path_buf()),
            iterations: Some(0),
            ..Default::default()
        };
        assert!(execute(&args).is_err());
    }

    #[test]
    fn test_unknown_backend_reported_unavailable() {
        let dir = resources();
        let args = RunArgs {
            resources: Some(dir.path().to_path_buf()),
            backends: vec!["spidermonkey".into()],
            mandatory: vec!["spidermonkey".into()],
            warmup: Some(1),
            iterations: Some(1),
            ..Default::default()
        };
        let outcome = execute(&args).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.results[0].available());
        assert!(outcome.mandatory_failed.is_empty());
    }
}
