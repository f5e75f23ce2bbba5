// src/history/evidence.rs — Screenshot persistence
//
// Writes `iter-{index:04}-{n}.png` atomically (temp file + rename) and hands
// back the path as the evidence item's stable storage reference.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::types::Evidence;
use crate::infra::errors::LoopError;

#[derive(Debug, Clone)]
pub struct EvidenceDir {
    root: PathBuf,
}

impl EvidenceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist every item and set its `storage_ref`. Items already carrying a
    /// reference are left alone.
    pub fn persist(&self, index: u32, items: &mut [Evidence]) -> Result<usize, LoopError> {
        std::fs::create_dir_all(&self.root)?;
        let mut written = 0;
        for (n, item) in items.iter_mut().enumerate() {
            if item.storage_ref.is_some() || item.png.is_empty() {
                continue;
            }
            let name = format!("iter-{index:04}-{n}.png");
            let dst = self.root.join(&name);
            let tmp = self.root.join(format!(".{name}.tmp"));

            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(&item.png)?;
            f.flush()?;
            f.sync_all()?;
            std::fs::rename(&tmp, &dst)?;

            item.storage_ref = Some(dst.display().to_string());
            written += 1;
        }
        if written > 0 {
            tracing::debug!(index, written, root = %self.root.display(), "evidence persisted");
        }
        Ok(written)
    }
}
