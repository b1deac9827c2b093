//! Legacy engine backend: the Nashorn `jjs` shell.
//!
//! Nashorn was removed from the JDK in version 15, so on most machines this
//! backend is simply reported unavailable.

use std::path::PathBuf;
use std::process::Command;

use crate::workload::Workload;

use super::process::{Scratch, ScriptProcess, probe_version};
use super::shell::{ShellConfig, ShellProgram};
use super::traits::{Backend, LoadError, LoadedProgram, Variant};

const NASHORN_DRIVER: &str = include_str!("../../assets/drivers/nashorn_driver.js");

pub struct NashornBackend {
    name: String,
    config: ShellConfig,
}

impl NashornBackend {
    pub fn new(name: impl Into<String>, config: ShellConfig) -> Self {
        NashornBackend {
            name: name.into(),
            config,
        }
    }

    pub fn from_path(program: impl Into<PathBuf>) -> Self {
        Self::new("nashorn", ShellConfig::new(program))
    }
}

impl Backend for NashornBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> Variant {
        Variant::LegacyShell
    }

    fn version(&self) -> Option<String> {
        // `jjs -version` prints to stderr, then reads stdin until EOF.
        probe_version(&self.config.program, &["-version"])
    }

    fn is_available(&self) -> bool {
        self.version().is_some()
    }

    fn load<'a>(&'a self, workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        let scratch = Scratch::prepare(NASHORN_DRIVER, workload)?;
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-scripting")
            .args(&self.config.extra_args)
            .arg(&scratch.driver)
            .arg("--")
            .arg(workload.entry_point())
            .args(&scratch.sources);
        let process = ScriptProcess::start(cmd, scratch, self.config.timeout)?;
        Ok(Box::new(ShellProgram { process }))
    }
}
