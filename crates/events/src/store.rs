//! JSONL event store - append-only writer
//!
//! One file per UTC day, rotated on the record's own timestamp so replay
//! order matches emission order regardless of wall-clock skew.

use crate::error::EventError;
use crate::event::EventRecord;
use crate::sink::EventSink;
use chrono::DateTime;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Default)]
struct StoreState {
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
}

/// Append-only JSONL event store
#[derive(Debug)]
pub struct JsonlEventStore {
    base_path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonlEventStore {
    /// Create a new event store at the given path
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, EventError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Append a record to the store
    pub fn append(&self, record: &EventRecord) -> Result<(), EventError> {
        let date = Self::date_of(record.timestamp);
        let mut state = self.lock();

        // Rotate file if date changed
        if state.current_date.as_ref() != Some(&date) {
            self.rotate_file(&mut state, &date)?;
        }

        if let Some(ref mut writer) = state.current_file {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        Ok(())
    }

    fn rotate_file(&self, state: &mut StoreState, date: &str) -> Result<(), EventError> {
        if let Some(ref mut writer) = state.current_file {
            writer.flush()?;
        }

        let file_path = self.base_path.join(format!("{}.jsonl", date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        state.current_file = Some(BufWriter::new(file));
        state.current_date = Some(date.to_string());

        Ok(())
    }

    /// List all JSONL files in the store
    pub fn list_files(&self) -> Result<Vec<PathBuf>, EventError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "jsonl") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Flush and close the current file
    pub fn close(&self) -> Result<(), EventError> {
        let mut state = self.lock();
        if let Some(ref mut writer) = state.current_file {
            writer.flush()?;
        }
        state.current_file = None;
        state.current_date = None;
        Ok(())
    }

    fn date_of(timestamp: u64) -> String {
        DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "out-of-range".to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for JsonlEventStore {
    fn emit(&self, record: EventRecord) {
        if let Err(err) = self.append(&record) {
            warn!(error = %err, kind = %record.kind, "failed to persist event record");
        }
    }
}

impl Drop for JsonlEventStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
