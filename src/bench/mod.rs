//! CLI command glue: session config files and the `run`/`list` commands.

pub mod bench_cmd;
pub mod config;

pub use bench_cmd::{RunArgs, SessionOutcome, execute, list, run};
pub use config::{SessionConfig, load_session_config};
