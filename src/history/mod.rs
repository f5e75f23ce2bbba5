// src/history/mod.rs — Append-only iteration history
//
// Every completed controller step lands here exactly once. Nothing mutates or
// removes a record except `clear`, which only a session reset calls.

mod evidence;
mod jsonl;

pub use evidence::EvidenceDir;
pub use jsonl::JsonlHistory;

use std::sync::Mutex;

use crate::core::types::IterationRecord;
use crate::infra::errors::LoopError;

/// History sink consumed by UIs.
pub trait HistoryLog: Send + Sync {
    fn append(&self, record: IterationRecord) -> Result<(), LoopError>;

    /// Index 0 plus every manual and final-auto record. Intermediate retries
    /// are suppressed.
    fn list_significant(&self) -> Vec<IterationRecord> {
        self.list_all()
            .into_iter()
            .filter(|r| r.kind.is_significant())
            .collect()
    }

    fn list_all(&self) -> Vec<IterationRecord>;

    fn len(&self) -> usize {
        self.list_all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. Session reset only.
    fn clear(&self) -> Result<(), LoopError>;
}

/// In-process history, lost on exit.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<IterationRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryLog for MemoryHistory {
    fn append(&self, record: IterationRecord) -> Result<(), LoopError> {
        self.records
            .lock()
            .map_err(|_| LoopError::Other(anyhow::anyhow!("history lock poisoned")))?
            .push(record);
        Ok(())
    }

    fn list_all(&self) -> Vec<IterationRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn clear(&self) -> Result<(), LoopError> {
        self.records
            .lock()
            .map_err(|_| LoopError::Other(anyhow::anyhow!("history lock poisoned")))?
            .clear();
        Ok(())
    }
}
