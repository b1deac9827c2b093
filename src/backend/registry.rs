//! Backend registry: configured backends, resolved by name.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::workload::Workload;

use super::legacy::NashornBackend;
use super::quickjs::{QuickJsBackend, QuickJsConfig};
use super::shell::{NodeBackend, ShellConfig};
use super::traits::{Backend, LoadError, LoadedProgram, Variant};

/// Which engine adapter a configured backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Quickjs,
    Node,
    Nashorn,
}

impl BackendKind {
    fn default_program(self) -> Option<&'static str> {
        match self {
            BackendKind::Quickjs => None,
            BackendKind::Node => Some("node"),
            BackendKind::Nashorn => Some("jjs"),
        }
    }
}

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub name: String,
    pub kind: BackendKind,
    /// Shell binary; defaults per kind
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    /// A load failure of a mandatory backend fails the session
    pub mandatory: bool,
    /// Heap limit for in-process engines
    pub memory_limit: Option<usize>,
    /// Stack limit for in-process engines
    pub max_stack_size: Option<usize>,
}

impl BackendSpec {
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        BackendSpec {
            name: name.into(),
            kind,
            program: None,
            args: Vec::new(),
            mandatory: false,
            memory_limit: None,
            max_stack_size: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// Placeholder for a name that is not configured. Always unavailable.
pub struct UnavailableBackend {
    name: String,
}

impl UnavailableBackend {
    pub fn new(name: impl Into<String>) -> Self {
        UnavailableBackend { name: name.into() }
    }
}

impl Backend for UnavailableBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> Variant {
        Variant::InProcess
    }

    fn version(&self) -> Option<String> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load<'a>(&'a self, _workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        Err(LoadError::new(format!("backend `{}` is not configured", self.name)))
    }
}

/// Configured backends in session order.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    specs: Vec<BackendSpec>,
    timeout: Option<Duration>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// QuickJS in-process, then Node.js, then Nashorn.
    pub fn with_defaults() -> Self {
        Self::from_specs(vec![
            BackendSpec::new("quickjs", BackendKind::Quickjs),
            BackendSpec::new("node", BackendKind::Node),
            BackendSpec::new("nashorn", BackendKind::Nashorn),
        ])
    }

    pub fn from_specs(specs: Vec<BackendSpec>) -> Self {
        BackendRegistry {
            specs,
            timeout: None,
        }
    }

    /// Per-invocation timeout handed to subprocess backends.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep only the named backends, in the order given. Unknown names are
    /// kept as unavailable placeholders so they still show up in reports.
    pub fn select(&self, names: &[String]) -> Vec<Box<dyn Backend>> {
        names.iter().map(|n| self.resolve(n)).collect()
    }

    /// Mark the named backends mandatory. Returns the names that match no
    /// configured backend.
    pub fn require(&mut self, names: &[String]) -> Vec<String> {
        let mut unknown = Vec::new();
        for name in names {
            match self.specs.iter_mut().find(|s| &s.name == name) {
                Some(spec) => spec.mandatory = true,
                None => {
                    warn!(backend = %name, "mandatory backend is not configured");
                    unknown.push(name.clone());
                }
            }
        }
        unknown
    }

    pub fn specs(&self) -> &[BackendSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_mandatory(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name && s.mandatory)
    }

    /// Always returns a backend; names that are not configured resolve to an
    /// [`UnavailableBackend`].
    pub fn resolve(&self, name: &str) -> Box<dyn Backend> {
        match self.specs.iter().find(|s| s.name == name) {
            Some(spec) => self.build(spec),
            None => Box::new(UnavailableBackend::new(name)),
        }
    }

    /// Every configured backend, in order.
    pub fn resolve_all(&self) -> Vec<Box<dyn Backend>> {
        self.specs.iter().map(|s| self.build(s)).collect()
    }

    /// `(name, available, version)` for every configured backend.
    pub fn availability(&self) -> Vec<(String, bool, Option<String>)> {
        self.resolve_all()
            .iter()
            .map(|b| {
                let available = b.is_available();
                let version = if available { b.version() } else { None };
                (b.name().to_string(), available, version)
            })
            .collect()
    }

    fn build(&self, spec: &BackendSpec) -> Box<dyn Backend> {
        let shell_config = || {
            let program = spec
                .program
                .clone()
                .or_else(|| spec.kind.default_program().map(PathBuf::from))
                .unwrap_or_default();
            ShellConfig::new(program)
                .with_args(spec.args.clone())
                .with_timeout(self.timeout)
        };
        match spec.kind {
            BackendKind::Quickjs => Box::new(QuickJsBackend::new(&spec.name, quickjs_config(spec))),
            BackendKind::Node => Box::new(NodeBackend::new(&spec.name, shell_config())),
            BackendKind::Nashorn => Box::new(NashornBackend::new(&spec.name, shell_config())),
        }
    }
}

fn quickjs_config(spec: &BackendSpec) -> QuickJsConfig {
    let mut config = QuickJsConfig::default();
    if let Some(limit) = spec.memory_limit {
        config = config.with_memory_limit(limit);
    }
    if let Some(size) = spec.max_stack_size {
        config = config.with_max_stack_size(size);
    }
    config
}
