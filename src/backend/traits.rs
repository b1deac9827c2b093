//! Backend trait, loaded program handle and their error types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workload::Workload;

/// How a backend hosts its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Engine embedded in this process
    InProcess,
    /// External scripting shell driven over a pipe
    Shell,
    /// External shell of a deprecated engine
    LegacyShell,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::InProcess => "in-process",
            Variant::Shell => "shell",
            Variant::LegacyShell => "legacy-shell",
        })
    }
}

/// The workload could not be loaded into a backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}{message}", source_prefix(.source_name))]
pub struct LoadError {
    /// Name of the source being evaluated when loading failed, if any
    pub source_name: Option<String>,
    pub message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        LoadError {
            source_name: None,
            message: message.into(),
        }
    }

    pub fn in_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError {
            source_name: Some(source_name.into()),
            message: message.into(),
        }
    }
}

fn source_prefix(source_name: &Option<String>) -> String {
    source_name
        .as_deref()
        .map(|name| format!("{name}: "))
        .unwrap_or_default()
}

/// A single invocation of the entry point failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The entry point threw
    #[error("script error: {0}")]
    Script(String),
    /// No reply within the configured timeout; the engine was shut down
    #[error("invocation timed out after {0:?}")]
    TimedOut(Duration),
    /// The engine is no longer running
    #[error("engine is gone: {0}")]
    EngineGone(String),
    /// The engine replied with something unexpected
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A workload loaded into a backend's engine.
///
/// The handle borrows the backend that produced it and owns the engine
/// instance; dropping it tears the engine down.
pub trait LoadedProgram {
    /// Call the workload's entry point once and return its wall-clock latency.
    fn invoke(&mut self) -> Result<Duration, InvocationError>;
}

/// An execution capability that can load a workload and invoke its entry point.
///
/// Implementations hold configuration only; every `load` creates a fresh
/// engine, so a backend can be shared across threads while each loaded
/// program stays on the thread that created it.
pub trait Backend: Send + Sync {
    /// Returns the backend name (e.g., "quickjs", "node").
    fn name(&self) -> &str;

    /// How the engine is hosted.
    fn variant(&self) -> Variant;

    /// Returns the engine version, if detectable.
    fn version(&self) -> Option<String>;

    /// Whether the engine exists in the current runtime. Never fails.
    fn is_available(&self) -> bool;

    /// Load the workload into a fresh engine instance.
    fn load<'a>(&'a self, workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError>;
}
