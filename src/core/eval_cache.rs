// src/core/eval_cache.rs — Verdict caching keyed by artifact digest
//
// An artifact the model repeats verbatim gets the verdict it got last time
// instead of a second trip through the render backend.

use std::collections::HashMap;

use super::types::{Artifact, EvaluationVerdict};

#[derive(Debug, Default)]
pub struct EvalCache {
    cache: HashMap<String, EvaluationVerdict>,
    hits: u32,
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached verdict for an identical artifact, if any.
    pub fn get(&mut self, artifact: &Artifact) -> Option<EvaluationVerdict> {
        let hit = self.cache.get(&artifact.digest()).cloned();
        if hit.is_some() {
            self.hits += 1;
        }
        hit
    }

    pub fn insert(&mut self, artifact: &Artifact, verdict: &EvaluationVerdict) {
        self.cache.insert(artifact.digest(), verdict.clone());
    }

    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.cache.contains_key(&artifact.digest())
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
    }
}
