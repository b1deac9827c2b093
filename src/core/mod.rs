//! Core types: per-backend results and the persisted `BenchRecord` schema (v1).

pub mod env;
pub mod result;
pub mod schema;

pub use env::EnvironmentInfo;
pub use result::{RunResult, RunStatus};
pub use schema::{BackendInfo, BenchRecord, RunConfig, SCHEMA_VERSION, TimingStat};
