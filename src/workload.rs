//! Workloads and the resources they are built from.
//!
//! A [`Workload`] is the code under test: an ordered list of auxiliary
//! sources (the TypeScript compiler library and its lib pack), the source
//! text defining the entry point, and the entry point's name. It is built
//! once per session from named text assets and shared by every backend.

use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the TypeScript compiler library asset.
pub const TYPESCRIPT_ASSET: &str = "typescript.js";
/// Name of the lib pack asset (defines `getLibFileContent`).
pub const LIB_PACK_ASSET: &str = "libPack.js";
/// Function invoked once per iteration.
pub const DEFAULT_ENTRY_POINT: &str = "compileTypescript";

const COMPILE_TS: &str = include_str!("../assets/compile_ts.js");
const COMPILE_TS_NO_TYPE_CHECK: &str = include_str!("../assets/compile_ts_no_type_check.js");

/// A required text asset could not be loaded.
#[derive(Debug, Error)]
#[error("resource `{name}` not found in {location}: {detail}")]
pub struct ResourceNotFoundError {
    pub name: String,
    pub location: String,
    pub detail: String,
}

/// Source of named text assets.
pub trait ResourceLoader {
    fn load_text(&self, name: &str) -> Result<String, ResourceNotFoundError>;
}

/// Loads assets from files under a directory.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    root: PathBuf,
}

impl ResourceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResourceDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceLoader for ResourceDir {
    fn load_text(&self, name: &str) -> Result<String, ResourceNotFoundError> {
        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|e| ResourceNotFoundError {
            name: name.to_string(),
            location: self.root.display().to_string(),
            detail: match e.kind() {
                io::ErrorKind::NotFound => format!("{} does not exist", path.display()),
                _ => e.to_string(),
            },
        })
    }
}

/// Assets compiled into the binary: the two compile entry scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledResources;

impl ResourceLoader for BundledResources {
    fn load_text(&self, name: &str) -> Result<String, ResourceNotFoundError> {
        WorkloadKind::value_variants()
            .iter()
            .find(|k| k.asset_name() == name)
            .map(|k| k.bundled_source().to_string())
            .ok_or_else(|| ResourceNotFoundError {
                name: name.to_string(),
                location: "bundled assets".to_string(),
                detail: "no such bundled asset".to_string(),
            })
    }
}

/// Which bundled compile script drives the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadKind {
    /// Compile with type checking against lib.es2020.d.ts
    #[default]
    Typecheck,
    /// Compile without loading lib declarations
    NoTypecheck,
}

impl WorkloadKind {
    pub fn asset_name(self) -> &'static str {
        match self {
            WorkloadKind::Typecheck => "compile_ts.js",
            WorkloadKind::NoTypecheck => "compile_ts_no_type_check.js",
        }
    }

    pub fn workload_name(self) -> &'static str {
        match self {
            WorkloadKind::Typecheck => "typescript-typecheck",
            WorkloadKind::NoTypecheck => "typescript-no-typecheck",
        }
    }

    fn bundled_source(self) -> &'static str {
        match self {
            WorkloadKind::Typecheck => COMPILE_TS,
            WorkloadKind::NoTypecheck => COMPILE_TS_NO_TYPE_CHECK,
        }
    }
}

/// A named piece of script text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub name: String,
    pub text: String,
}

impl ScriptSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        ScriptSource {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// The code under test. Immutable once built.
#[derive(Debug, Clone)]
pub struct Workload {
    name: String,
    source: ScriptSource,
    entry_point: String,
    auxiliary_sources: Vec<ScriptSource>,
}

impl Workload {
    pub fn new(
        name: impl Into<String>,
        source: ScriptSource,
        entry_point: impl Into<String>,
        auxiliary_sources: Vec<ScriptSource>,
    ) -> Self {
        Workload {
            name: name.into(),
            source,
            entry_point: entry_point.into(),
            auxiliary_sources,
        }
    }

    /// Build the TypeScript compile workload: `typescript.js` and
    /// `libPack.js` from `assets`, the entry script from the bundled set.
    pub fn typescript_compile(
        assets: &dyn ResourceLoader,
        kind: WorkloadKind,
    ) -> Result<Self, ResourceNotFoundError> {
        let entry_script = BundledResources.load_text(kind.asset_name())?;
        Self::typescript_compile_with(
            assets,
            kind.workload_name(),
            ScriptSource::new(kind.asset_name(), entry_script),
            DEFAULT_ENTRY_POINT,
        )
    }

    /// Same as [`Workload::typescript_compile`] with a caller-supplied entry script.
    pub fn typescript_compile_with(
        assets: &dyn ResourceLoader,
        name: &str,
        entry_script: ScriptSource,
        entry_point: &str,
    ) -> Result<Self, ResourceNotFoundError> {
        let auxiliary_sources = [TYPESCRIPT_ASSET, LIB_PACK_ASSET]
            .into_iter()
            .map(|asset| assets.load_text(asset).map(|text| ScriptSource::new(asset, text)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Workload::new(name, entry_script, entry_point, auxiliary_sources))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_text(&self) -> &str {
        &self.source.text
    }

    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn auxiliary_sources(&self) -> &[ScriptSource] {
        &self.auxiliary_sources
    }

    /// All sources in load order: auxiliaries first, then the entry source.
    pub fn sources(&self) -> impl Iterator<Item = &ScriptSource> {
        self.auxiliary_sources.iter().chain(std::iter::once(&self.source))
    }

    /// SHA-256 over every source in load order plus the entry point name.
    pub fn fingerprint(&self) -> String {
        let mut bytes = Vec::new();
        for source in self.sources() {
            bytes.extend_from_slice(source.name.as_bytes());
            bytes.push(0);
            bytes.extend_from_slice(source.text.as_bytes());
            bytes.push(0);
        }
        bytes.extend_from_slice(self.entry_point.as_bytes());
        crate::sha256_hex(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_assets(dir: &Path) {
        std::fs::write(dir.join(TYPESCRIPT_ASSET), "var ts = {};").unwrap();
        std::fs::write(dir.join(LIB_PACK_ASSET), "function getLibFileContent(n) { return ''; }")
            .unwrap();
    }

    #[test]
    fn test_resource_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ResourceDir::new(dir.path());
        let err = loader.load_text("typescript.js").unwrap_err();
        assert_eq!(err.name, "typescript.js");
        assert!(err.detail.contains("does not exist"));
    }

    #[test]
    fn test_bundled_resources_serve_entry_scripts() {
        let typecheck = BundledResources.load_text("compile_ts.js").unwrap();
        assert!(typecheck.contains("function compileTypescript()"));
        assert!(typecheck.contains("lib.es2020.d.ts"));

        let plain = BundledResources.load_text("compile_ts_no_type_check.js").unwrap();
        assert!(plain.contains("getDefaultLibFileName: () => ''"));

        assert!(BundledResources.load_text("typescript.js").is_err());
    }

    #[test]
    fn test_typescript_compile_orders_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path());

        let workload =
            Workload::typescript_compile(&ResourceDir::new(dir.path()), WorkloadKind::Typecheck)
                .unwrap();

        let names: Vec<&str> = workload.sources().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["typescript.js", "libPack.js", "compile_ts.js"]);
        assert_eq!(workload.entry_point(), "compileTypescript");
        assert_eq!(workload.name(), "typescript-typecheck");
    }

    #[test]
    fn test_typescript_compile_missing_lib_pack() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TYPESCRIPT_ASSET), "var ts = {};").unwrap();

        let err =
            Workload::typescript_compile(&ResourceDir::new(dir.path()), WorkloadKind::NoTypecheck)
                .unwrap_err();
        assert_eq!(err.name, LIB_PACK_ASSET);
    }

    #[test]
    fn test_fingerprint_depends_on_sources() {
        let a = Workload::new("w", ScriptSource::new("main.js", "function f() {}"), "f", vec![]);
        let b = Workload::new("w", ScriptSource::new("main.js", "function f() { }"), "f", vec![]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
