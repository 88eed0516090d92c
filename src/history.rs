//! Run history kept next to the baseline.

use crate::fs::FileSystem;
use crate::paths;
use crate::plan::FileMove;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

/// Records kept per root; older ones are discarded.
pub const MAX_RECORDS: usize = 20;

/// What one organize run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub folders_created: usize,
    pub files_moved: usize,
    pub errors: usize,
    pub success: bool,
    pub baseline_saved: bool,
    pub moves: Vec<FileMove>,
}

pub struct HistoryLog<'a> {
    fs: &'a dyn FileSystem,
    root: PathBuf,
}

impl<'a> HistoryLog<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        paths::history_path(&self.root)
    }

    /// All records, oldest first. A missing file is an empty history.
    pub fn load(&self) -> io::Result<Vec<RunRecord>> {
        let path = self.path();
        if !self.fs.exists(&path) {
            return Ok(Vec::new());
        }
        let contents = self.fs.read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn last(&self) -> io::Result<Option<RunRecord>> {
        Ok(self.load()?.pop())
    }

    /// Appends a record, keeping at most [`MAX_RECORDS`].
    ///
    /// An unreadable history file is replaced rather than blocking the append.
    pub fn append(&self, record: RunRecord) -> io::Result<()> {
        let mut records = self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "history unreadable, starting a new one");
            Vec::new()
        });
        records.push(record);
        if records.len() > MAX_RECORDS {
            records.drain(..records.len() - MAX_RECORDS);
        }

        self.fs.create_dir_all(&paths::metadata_dir(&self.root))?;
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.fs.write(&self.path(), &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFileSystem;

    fn record(files_moved: usize) -> RunRecord {
        RunRecord {
            timestamp: Utc::now(),
            root: PathBuf::from("/d"),
            folders_created: 1,
            files_moved,
            errors: 0,
            success: true,
            baseline_saved: true,
            moves: vec![FileMove::new("/d/a.txt", "/d/x/a.txt")],
        }
    }

    #[test]
    fn test_missing_history_is_empty() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/d");
        let log = HistoryLog::new(&fs, "/d");
        assert!(log.load().unwrap().is_empty());
        assert!(log.last().unwrap().is_none());
    }

    #[test]
    fn test_append_and_last() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/d");
        let log = HistoryLog::new(&fs, "/d");
        log.append(record(1)).unwrap();
        log.append(record(2)).unwrap();

        assert_eq!(log.load().unwrap().len(), 2);
        assert_eq!(log.last().unwrap().unwrap().files_moved, 2);
    }

    #[test]
    fn test_history_is_capped() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/d");
        let log = HistoryLog::new(&fs, "/d");
        for n in 0..MAX_RECORDS + 5 {
            log.append(record(n)).unwrap();
        }
        let records = log.load().unwrap();
        assert_eq!(records.len(), MAX_RECORDS);
        assert_eq!(records[0].files_moved, 5);
    }

    #[test]
    fn test_corrupt_history_is_replaced() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/.desktop/.desktop_organizer_history.json", "not json");
        let log = HistoryLog::new(&fs, "/d");
        assert!(log.load().is_err());
        log.append(record(3)).unwrap();
        assert_eq!(log.load().unwrap().len(), 1);
    }
}
