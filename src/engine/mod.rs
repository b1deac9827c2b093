//! Engine module: runs the benchmark protocol against backends.
//!
//! - `runner` drives one backend through load, warmup, measurement and
//!   teardown, producing a `RunResult`.
//! - `session` applies one runner and one workload to several backends,
//!   sequentially or on scoped threads.

pub mod runner;
pub mod session;

pub use runner::{BenchmarkLoadError, BenchmarkRunner, RunPhase};
pub use session::{Schedule, Session, mandatory_failures};
