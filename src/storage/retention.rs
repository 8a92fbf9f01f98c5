use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::{LogKind, StorageError};
use crate::clock::parse_leading_timestamp;

/// Maximum record age for one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub kind: LogKind,
    pub max_age_secs: u64,
}

impl RetentionPolicy {
    pub const fn new(kind: LogKind, max_age_secs: u64) -> Self {
        Self { kind, max_age_secs }
    }

    /// Whether a record stamped `recorded` is still within the threshold at `now`.
    ///
    /// Records from the future are always kept.
    pub fn retains(&self, recorded: &NaiveDateTime, now: &NaiveDateTime) -> bool {
        let elapsed = (*now - *recorded).num_seconds();
        elapsed <= i64::try_from(self.max_age_secs).unwrap_or(i64::MAX)
    }
}

/// Line counts from one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: usize,
    pub expired: usize,
    /// Lines without a leading timestamp. These are dropped, not kept.
    pub malformed: usize,
}

impl PruneReport {
    pub const fn dropped(&self) -> usize {
        self.expired + self.malformed
    }
}

/// `<file>.tmp` next to `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rewrite the log at `path`, keeping only records younger than the policy.
///
/// Retained lines are copied byte-for-byte in file order. Lines that
/// do not start with a `YYYY-MM-DD HH:MM:SS` timestamp are dropped whatever
/// their content. The new contents are written to `<file>.tmp` which is then
/// renamed over the live log, so readers see either the old or the new file.
///
/// A missing log is not an error: there is nothing to prune.
pub fn prune_log(
    path: &Path,
    policy: &RetentionPolicy,
    now: &NaiveDateTime,
) -> Result<PruneReport, StorageError> {
    let source = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PruneReport::default()),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let tmp = temp_path(path);
    let result = rewrite(BufReader::new(source), &tmp, policy, now)
        .and_then(|report| {
            fs::rename(&tmp, path)
                .map_err(|e| StorageError::io(path, e))
                .map(|()| report)
        });

    if result.is_err() {
        // Leave the live log alone and don't litter the log directory.
        let _ = fs::remove_file(&tmp);
    }

    result
}

fn rewrite(
    mut source: impl BufRead,
    tmp: &Path,
    policy: &RetentionPolicy,
    now: &NaiveDateTime,
) -> Result<PruneReport, StorageError> {
    let file = File::create(tmp).map_err(|e| StorageError::io(tmp, e))?;
    let mut dest = BufWriter::new(file);
    let mut report = PruneReport::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = source
            .read_until(b'\n', &mut line)
            .map_err(|e| StorageError::io(tmp, e))?;
        if read == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        match parse_leading_timestamp(&text) {
            Some(recorded) if policy.retains(&recorded, now) => {
                dest.write_all(&line).map_err(|e| StorageError::io(tmp, e))?;
                report.kept += 1;
            }
            Some(_) => report.expired += 1,
            None => report.malformed += 1,
        }
    }

    dest.flush().map_err(|e| StorageError::io(tmp, e))?;
    dest.get_ref()
        .sync_all()
        .map_err(|e| StorageError::io(tmp, e))?;

    Ok(report)
}
