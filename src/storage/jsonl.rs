//! JSON Lines history of benchmark records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::BenchError;
use crate::core::schema::{BenchRecord, SCHEMA_VERSION};

/// Appends records to, and reads them back from, a `.jsonl` file. One record
/// per line, so a history file grows by one line per backend per session.
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonlWriter {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one record. Rejects records of another schema version.
    pub fn append(&self, record: &BenchRecord) -> Result<(), BenchError> {
        self.append_all(std::slice::from_ref(record))
    }

    /// Append every record of a session in one open/flush.
    pub fn append_all(&self, records: &[BenchRecord]) -> Result<(), BenchError> {
        if let Some(bad) = records.iter().find(|r| r.schema_version != SCHEMA_VERSION) {
            return Err(BenchError::Message(format!(
                "schema version mismatch: record has v{}, expected v{}",
                bad.schema_version, SCHEMA_VERSION
            )));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| io_error("failed to create directory", e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error("failed to open file", e))?;
        let mut out = BufWriter::new(file);
        for record in records {
            let json = serde_json::to_string(record)
                .map_err(|e| BenchError::Message(format!("failed to serialize record: {e}")))?;
            writeln!(out, "{json}").map_err(|e| io_error("failed to write record", e))?;
        }
        out.flush().map_err(|e| io_error("failed to write record", e))?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<BenchRecord>, BenchError> {
        self.read_filtered(None)
    }

    /// Read records, keeping only those for `backend` when given.
    pub fn read_filtered(&self, backend: Option<&str>) -> Result<Vec<BenchRecord>, BenchError> {
        if !self.path.exists() {
            return Err(BenchError::Message(format!(
                "file not found: {}",
                self.path.display()
            )));
        }

        let file = File::open(&self.path).map_err(|e| io_error("failed to open file", e))?;
        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                BenchError::Message(format!("failed to read line {}: {e}", index + 1))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: BenchRecord = serde_json::from_str(&line).map_err(|e| {
                BenchError::Message(format!("failed to parse line {}: {e}", index + 1))
            })?;
            if backend.is_some_and(|name| record.backend.name != name) {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Number of non-empty lines; 0 when the file does not exist.
    pub fn count(&self) -> Result<usize, BenchError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let file = File::open(&self.path).map_err(|e| io_error("failed to open file", e))?;
        Ok(BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count())
    }
}

fn io_error(context: &str, e: std::io::Error) -> BenchError {
    BenchError::Message(format!("{context}: {e}"))
}
