//! JSONL event reader - sequential reader for indexer replay

use crate::error::EventError;
use crate::event::EventRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sequential event reader for replay
pub struct JsonlEventReader {
    files: Vec<std::path::PathBuf>,
}

impl JsonlEventReader {
    /// Create a new reader from a store directory
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map_or(false, |ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    /// Read all records from all files in order
    pub fn read_all(&self) -> Result<Vec<EventRecord>, EventError> {
        let mut records = Vec::new();

        for file_path in &self.files {
            let file = File::open(file_path)?;
            let reader = BufReader::new(file);

            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: EventRecord = serde_json::from_str(&line)?;
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Count total records across all files
    pub fn count(&self) -> Result<usize, EventError> {
        let mut count = 0;

        for file_path in &self.files {
            let file = File::open(file_path)?;
            let reader = BufReader::new(file);

            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventRecord};
    use crate::store::JsonlEventStore;
    use defibank_core::AccountId;

    #[test]
    fn test_write_then_replay() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlEventStore::new(dir.path()).unwrap();

        for i in 0..5u64 {
            store
                .append(&EventRecord::new(
                    EventKind::Mint,
                    "ETH/USDT",
                    AccountId::new("alice"),
                    vec![i as u128],
                    1_700_000_000 + i,
                ))
                .unwrap();
        }
        store.close().unwrap();

        let reader = JsonlEventReader::from_directory(dir.path()).unwrap();
        assert_eq!(reader.count().unwrap(), 5);

        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].amounts, vec![4]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let reader = JsonlEventReader::from_directory("/nonexistent/events").unwrap();
        assert_eq!(reader.count().unwrap(), 0);
    }
}
