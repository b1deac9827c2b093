//! Session configuration files (TOML or YAML, picked by extension).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shlex::Shlex;

use crate::backend::{BackendKind, BackendSpec};
use crate::workload::WorkloadKind;
use crate::{BenchError, BenchResult};

/// Settings read from a config file. Every field is optional; command-line
/// flags take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub warmup: Option<u32>,
    pub iterations: Option<u32>,
    pub resources: Option<PathBuf>,
    pub workload: Option<WorkloadKind>,
    pub timeout_secs: Option<u64>,
    pub parallel: Option<bool>,
    /// Empty means the built-in defaults
    pub backends: Vec<BackendSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    warmup: Option<u32>,
    iterations: Option<u32>,
    resources: Option<PathBuf>,
    workload: Option<WorkloadKind>,
    timeout_secs: Option<u64>,
    parallel: Option<bool>,
    #[serde(default, rename = "backend")]
    backends: Vec<RawBackend>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBackend {
    name: String,
    kind: BackendKind,
    program: Option<PathBuf>,
    /// Extra shell arguments as one shell-quoted string
    args: Option<String>,
    #[serde(default)]
    mandatory: bool,
    memory_limit: Option<usize>,
    max_stack_size: Option<usize>,
}

impl RawBackend {
    fn into_spec(self) -> BenchResult<BackendSpec> {
        let args = match self.args {
            Some(s) => {
                let mut lexer = Shlex::new(&s);
                let parsed: Vec<String> = lexer.by_ref().collect();
                if lexer.had_error {
                    return Err(BenchError::Message(format!(
                        "backend `{}`: unbalanced quotes in args: {s}",
                        self.name
                    )));
                }
                parsed
            }
            None => Vec::new(),
        };
        Ok(BackendSpec {
            name: self.name,
            kind: self.kind,
            program: self.program,
            args,
            mandatory: self.mandatory,
            memory_limit: self.memory_limit,
            max_stack_size: self.max_stack_size,
        })
    }
}

/// Load a session config; `.yaml`/`.yml` files are YAML, anything else TOML.
pub fn load_session_config(path: &Path) -> BenchResult<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", path.display())))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let raw: RawConfig = if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| BenchError::Message(e.to_string()))?
    } else {
        toml::from_str(&text).map_err(|e| BenchError::Message(e.to_string()))?
    };
    raw.into_config()
}

impl RawConfig {
    fn into_config(self) -> BenchResult<SessionConfig> {
        let mut backends: Vec<BackendSpec> = Vec::with_capacity(self.backends.len());
        for raw in self.backends {
            if backends.iter().any(|b| b.name == raw.name) {
                return Err(BenchError::Message(format!(
                    "backend `{}` is configured twice",
                    raw.name
                )));
            }
            backends.push(raw.into_spec()?);
        }
        Ok(SessionConfig {
            warmup: self.warmup,
            iterations: self.iterations,
            resources: self.resources,
            workload: self.workload,
            timeout_secs: self.timeout_secs,
            parallel: self.parallel,
            backends,
        })
    }
}
