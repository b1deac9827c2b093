//! Scripting shell backend: a Node.js-compatible shell driven over a pipe.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::workload::Workload;

use super::process::{Scratch, ScriptProcess, probe_version};
use super::traits::{Backend, InvocationError, LoadError, LoadedProgram, Variant};

const NODE_DRIVER: &str = include_str!("../../assets/drivers/node_driver.js");

/// Configuration for a shell backend.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Path to the shell binary
    pub program: PathBuf,
    /// Extra arguments placed before the driver script
    pub extra_args: Vec<String>,
    /// Per-invocation timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl ShellConfig {
    /// Create a new config with the given shell path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ShellConfig {
            program: program.into(),
            extra_args: Vec::new(),
            timeout: None,
        }
    }

    /// Add extra arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Node.js (or any shell accepting `<script> <args...>` with `vm`/`readline`).
pub struct NodeBackend {
    name: String,
    config: ShellConfig,
}

impl NodeBackend {
    pub fn new(name: impl Into<String>, config: ShellConfig) -> Self {
        NodeBackend {
            name: name.into(),
            config,
        }
    }

    /// Create a backend with just the shell path.
    pub fn from_path(program: impl Into<PathBuf>) -> Self {
        Self::new("node", ShellConfig::new(program))
    }
}

impl Backend for NodeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> Variant {
        Variant::Shell
    }

    fn version(&self) -> Option<String> {
        probe_version(&self.config.program, &["--version"])
    }

    fn is_available(&self) -> bool {
        self.version().is_some()
    }

    fn load<'a>(&'a self, workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        let scratch = Scratch::prepare(NODE_DRIVER, workload)?;
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.extra_args)
            .arg(&scratch.driver)
            .arg(workload.entry_point())
            .args(&scratch.sources);
        let process = ScriptProcess::start(cmd, scratch, self.config.timeout)?;
        Ok(Box::new(ShellProgram { process }))
    }
}

/// A workload loaded into a running shell process.
pub(crate) struct ShellProgram {
    pub(crate) process: ScriptProcess,
}

impl LoadedProgram for ShellProgram {
    fn invoke(&mut self) -> Result<Duration, InvocationError> {
        self.process.round_trip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ShellConfig::new("/usr/local/bin/node")
            .with_args(vec!["--stack-size=4000".into()])
            .with_timeout(Some(Duration::from_secs(60)));

        assert_eq!(config.program, PathBuf::from("/usr/local/bin/node"));
        assert_eq!(config.extra_args, vec!["--stack-size=4000"]);
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_missing_shell_is_unavailable() {
        let backend = NodeBackend::from_path("/nonexistent/bin/node");
        assert_eq!(backend.name(), "node");
        assert_eq!(backend.variant(), Variant::Shell);
        assert!(!backend.is_available());
    }
}
