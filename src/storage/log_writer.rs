use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{LogKind, Reading, StorageError};

/// Format one on-disk record, without the trailing newline.
pub fn format_record(timestamp: &str, value: f32) -> String {
    format!("{timestamp} | {value:.2}")
}

/// Append a single `"<timestamp> | <value>"` line to `path`.
///
/// The file is created if missing and closed again before returning, so no
/// handle outlives the call.
pub fn append_record(path: &Path, timestamp: &str, value: f32) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;

    let mut line = format_record(timestamp, value);
    line.push('\n');
    file.write_all(line.as_bytes())
        .map_err(|e| StorageError::io(path, e))?;

    Ok(())
}

/// The directory holding the three logs.
#[derive(Debug, Clone)]
pub struct LogStorage {
    dir: PathBuf,
}

impl LogStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a log inside the storage directory
    pub fn path(&self, kind: LogKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Appends a reading to the given log
    pub fn append_reading(&self, kind: LogKind, reading: &Reading) -> Result<(), StorageError> {
        append_record(&self.path(kind), &reading.timestamp_string(), reading.value)
    }
}
