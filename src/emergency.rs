//! Emergency Fallback Writer
//!
//! Last-resort persistence used when the snapshot store cannot be written. Each call
//! writes a new, timestamped JSON file; nothing is overwritten or deduplicated. The
//! files are plain JSON so any operator tool can read them back.

use crate::checkpoint::hasher::hash_payload;
use crate::context::ActiveContext;
use crate::error::StorageError;
use crate::types::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

const FILE_PREFIX: &str = "emergency-";
const FILE_EXTENSION: &str = "json";

static WRITE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Contents of one emergency file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRecord {
    pub saved_at: DateTime<Utc>,
    pub reason: String,
    pub content_hash: ContentHash,
    pub context: ActiveContext,
}

/// Writes and reads emergency context files in one directory.
#[derive(Debug, Clone)]
pub struct EmergencyWriter {
    dir: PathBuf,
}

impl EmergencyWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize `context` to a new file and return its path.
    ///
    /// Writes to a `.tmp` sibling first and renames, so readers never see a
    /// half-written file.
    pub fn emergency_save(
        &self,
        context: &ActiveContext,
        reason: &str,
    ) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create emergency directory {:?}: {}", self.dir, e),
            ))
        })?;

        let payload = context
            .to_canonical_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let record = EmergencyRecord {
            saved_at: Utc::now(),
            reason: reason.to_string(),
            content_hash: hash_payload(&payload),
            context: context.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let path = self.dir.join(file_name(record.saved_at));
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            e
        })?;

        info!(path = %path.display(), %reason, "Wrote emergency context file");
        Ok(path)
    }

    /// Emergency files, newest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, StorageError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_emergency = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(FILE_PREFIX))
                .unwrap_or(false);
            let is_json = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
            if is_emergency && is_json {
                files.push(path);
            }
        }
        // File names embed a sortable UTC timestamp and a sequence number.
        files.sort();
        files.reverse();
        Ok(files)
    }

    pub fn read(&self, path: &Path) -> Result<EmergencyRecord, StorageError> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {:?}: {}", path, e))
        })
    }

    /// Newest readable emergency file, skipping unreadable ones.
    pub fn latest(&self) -> Result<Option<(PathBuf, EmergencyRecord)>, StorageError> {
        for path in self.list()? {
            match self.read(&path) {
                Ok(record) => return Ok(Some((path, record))),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable emergency file"),
            }
        }
        Ok(None)
    }
}

fn file_name(saved_at: DateTime<Utc>) -> String {
    format_file_name(saved_at, WRITE_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// The sequence is padded to the full width of a `u64` so names sort in write order.
fn format_file_name(saved_at: DateTime<Utc>, seq: u64) -> String {
    format!(
        "{}{}-{:020}.{}",
        FILE_PREFIX,
        saved_at.format("%Y%m%dT%H%M%S%.6fZ"),
        seq,
        FILE_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_sort_past_a_million_writes() {
        let saved_at = Utc::now();
        let before = format_file_name(saved_at, 999_999);
        let after = format_file_name(saved_at, 1_000_000);
        let last = format_file_name(saved_at, u64::MAX);
        assert!(before < after);
        assert!(after < last);
        assert_eq!(before.len(), last.len());
    }
    use crate::context::TaskUpdate;
    use tempfile::TempDir;

    #[test]
    fn each_save_creates_a_new_file() {
        let dir = TempDir::new().unwrap();
        let writer = EmergencyWriter::new(dir.path().join("emergency"));
        let ctx = ActiveContext::new();

        let first = writer.emergency_save(&ctx, "store down").unwrap();
        let second = writer.emergency_save(&ctx, "store down").unwrap();
        assert_ne!(first, second);
        assert_eq!(writer.list().unwrap(), vec![second, first]);
    }

    #[test]
    fn latest_round_trips_context() {
        let dir = TempDir::new().unwrap();
        let writer = EmergencyWriter::new(dir.path());
        let mut ctx = ActiveContext::new();
        ctx.update_task_progress("t1", TaskUpdate::new().percentage(60), Utc::now());
        writer.emergency_save(&ctx, "store down").unwrap();

        let (_, record) = writer.latest().unwrap().unwrap();
        assert_eq!(record.context, ctx);
        assert_eq!(record.reason, "store down");
        assert_eq!(
            record.content_hash,
            hash_payload(&ctx.to_canonical_json().unwrap())
        );
    }

    #[test]
    fn latest_skips_garbage_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        let writer = EmergencyWriter::new(dir.path().join("missing"));
        assert!(writer.latest().unwrap().is_none());

        let writer = EmergencyWriter::new(dir.path());
        writer.emergency_save(&ActiveContext::new(), "first").unwrap();
        fs::write(dir.path().join("emergency-99999999T000000.000000Z-000000.json"), "{").unwrap();
        let (_, record) = writer.latest().unwrap().unwrap();
        assert_eq!(record.reason, "first");
    }
}
