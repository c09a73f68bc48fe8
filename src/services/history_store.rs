// History Storage Service
// Append-only analysis history (JSON lines on disk, or in memory)

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::AnalysisRecord;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for completed analyses.
pub trait AnalysisRepository: Send + Sync {
    fn save(&self, record: &AnalysisRecord) -> Result<(), StoreError>;

    /// Most recent records first, at most `limit`.
    fn history(&self, limit: usize) -> Result<Vec<AnalysisRecord>, StoreError>;
}

fn newest_first(mut records: Vec<AnalysisRecord>, limit: usize) -> Vec<AnalysisRecord> {
    // Stable sort keeps insertion order for identical timestamps; reverse it so
    // the later write still wins.
    records.reverse();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(limit);
    records
}

pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalysisRepository for JsonlHistoryStore {
    fn save(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("history lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        info!(
            id = %record.id,
            filename = %record.filename,
            "[HISTORY] analysis saved to {}",
            self.path.display()
        );
        Ok(())
    }

    fn history(&self, limit: usize) -> Result<Vec<AnalysisRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AnalysisRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("[HISTORY] skipping corrupt line {}: {}", line_no + 1, e),
            }
        }

        let records = newest_first(records, limit);
        info!("[HISTORY] loaded {} records", records.len());
        Ok(records)
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisRepository for MemoryHistoryStore {
    fn save(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("history lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn history(&self, limit: usize) -> Result<Vec<AnalysisRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("history lock poisoned".to_string()))?
            .clone();
        Ok(newest_first(records, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentText, DocumentType};
    use chrono::{Duration, Utc};

    fn record(name: &str, minutes_ago: i64) -> AnalysisRecord {
        let text = DocumentText::new("Договор поставки").unwrap();
        let mut r = AnalysisRecord::new(name, DocumentType::Contract, "report", &text);
        r.created_at = Utc::now() - Duration::minutes(minutes_ago);
        r
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("legally-history-{}", uuid::Uuid::new_v4()))
            .join("history.jsonl")
    }

    #[test]
    fn test_jsonl_store_newest_first_with_limit() {
        let path = temp_path();
        let store = JsonlHistoryStore::new(&path);
        assert!(store.history(10).unwrap().is_empty());

        store.save(&record("old.pdf", 30)).unwrap();
        store.save(&record("new.pdf", 1)).unwrap();
        store.save(&record("mid.pdf", 10)).unwrap();

        let names: Vec<String> = store
            .history(10)
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, vec!["new.pdf", "mid.pdf", "old.pdf"]);

        let limited = store.history(2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].filename, "new.pdf");

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_jsonl_store_skips_corrupt_lines() {
        let path = temp_path();
        let store = JsonlHistoryStore::new(&path);
        store.save(&record("a.pdf", 5)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not json}\n\n").unwrap();
        store.save(&record("b.pdf", 1)).unwrap();

        let records = store.history(DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "b.pdf");
        assert_eq!(records[0].document_type, DocumentType::Contract);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryHistoryStore::new();
        assert!(store.is_empty());
        store.save(&record("first.pdf", 2)).unwrap();
        store.save(&record("second.pdf", 1)).unwrap();

        let records = store.history(1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "second.pdf");
        assert_eq!(store.len(), 2);
    }
}
