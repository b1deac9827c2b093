//! Persistence of `BenchRecord`s: JSONL history and CSV export.

pub mod csv;
pub mod jsonl;

pub use csv::{CSV_HEADERS, CsvExporter};
pub use jsonl::JsonlWriter;
