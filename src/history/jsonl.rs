// src/history/jsonl.rs — Append-only JSON-lines history file
//
// One `IterationRecord` per line. Records already on disk are loaded when the
// file is opened so `list_*` reflects prior runs. Unparseable lines are
// skipped with a warning rather than failing the whole log.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::HistoryLog;
use crate::core::types::IterationRecord;
use crate::infra::errors::LoopError;

pub struct JsonlHistory {
    path: PathBuf,
    records: Mutex<Vec<IterationRecord>>,
}

impl JsonlHistory {
    /// Open (or lazily create) the log at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LoopError> {
        let path = path.into();
        let records = if path.exists() {
            load_records(&path)?
        } else {
            Vec::new()
        };
        tracing::debug!(path = %path.display(), records = records.len(), "history opened");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<IterationRecord>>, LoopError> {
        self.records
            .lock()
            .map_err(|_| LoopError::Other(anyhow::anyhow!("history lock poisoned")))
    }
}

fn load_records(path: &Path) -> Result<Vec<IterationRecord>, LoopError> {
    let content = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IterationRecord>(line) {
            Ok(r) => records.push(r),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = lineno + 1,
                "skipping unreadable history line: {}",
                e
            ),
        }
    }
    Ok(records)
}

impl HistoryLog for JsonlHistory {
    fn append(&self, record: IterationRecord) -> Result<(), LoopError> {
        let mut records = self.lock()?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let line = serde_json::to_string(&record)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", line)?;
        records.push(record);
        Ok(())
    }

    fn list_all(&self) -> Vec<IterationRecord> {
        self.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn clear(&self) -> Result<(), LoopError> {
        let mut records = self.lock()?;
        if self.path.exists() {
            std::fs::File::create(&self.path)?;
        }
        records.clear();
        Ok(())
    }
}
