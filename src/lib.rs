pub mod backend;
pub mod bench;
pub mod core;
pub mod engine;
pub mod report;
pub mod storage;
pub mod workload;

use thiserror::Error;

pub use engine::runner::BenchmarkLoadError;
pub use workload::ResourceNotFoundError;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Resource(#[from] ResourceNotFoundError),
    #[error(transparent)]
    Load(#[from] BenchmarkLoadError),
    #[error("mandatory backend(s) failed to load: {}", .0.join(", "))]
    MandatoryBackendFailed(Vec<String>),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;

// Shared helpers
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha256::digest;
    digest(bytes)
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
