//! Backend abstraction over script engines.
//!
//! A `Backend` loads a workload into a fresh engine instance and hands back
//! a `LoadedProgram` whose `invoke` calls the entry point once and reports
//! its latency. Three engine adapters are provided (embedded QuickJS, a
//! Node.js shell, the legacy Nashorn shell) plus a mock for tests.

pub mod legacy;
pub mod mock;
pub(crate) mod process;
pub mod quickjs;
pub mod registry;
pub mod shell;
pub mod traits;

// Re-export key types
pub use legacy::NashornBackend;
pub use mock::{MockBackend, MockConfig, MockEvent, MockLog};
pub use quickjs::{QuickJsBackend, QuickJsConfig};
pub use registry::{BackendKind, BackendRegistry, BackendSpec, UnavailableBackend};
pub use shell::{NodeBackend, ShellConfig};
pub use traits::{Backend, InvocationError, LoadError, LoadedProgram, Variant};
