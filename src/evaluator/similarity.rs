// src/evaluator/similarity.rs — Pluggable similarity against reference scenes

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::render::Framebuffer;

/// Score used whenever no comparison can be made.
pub const FALLBACK_SIMILARITY: f32 = 0.0;

/// Compares a rendered frame against a reference frame.
pub trait SimilarityMetric: Send {
    fn name(&self) -> &str;

    /// Score in `0.0..=1.0`, or `None` when the frames are not comparable.
    fn score(&self, rendered: &Framebuffer, reference: &Framebuffer) -> Option<f32>;
}

/// 1 − mean absolute per-channel difference, normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelSimilarity;

impl SimilarityMetric for PixelSimilarity {
    fn name(&self) -> &str {
        "pixel"
    }

    fn score(&self, rendered: &Framebuffer, reference: &Framebuffer) -> Option<f32> {
        if rendered.width != reference.width
            || rendered.height != reference.height
            || !rendered.is_well_formed()
            || !reference.is_well_formed()
            || rendered.rgba.is_empty()
        {
            return None;
        }
        let total: u64 = rendered
            .rgba
            .iter()
            .zip(&reference.rgba)
            .map(|(a, b)| a.abs_diff(*b) as u64)
            .sum();
        let mean = total as f64 / (rendered.rgba.len() as f64 * 255.0);
        Some((1.0 - mean).clamp(0.0, 1.0) as f32)
    }
}

/// Named reference frames, loaded lazily from `<dir>/<scene>.png`.
#[derive(Debug, Default)]
pub struct ReferenceScenes {
    dir: Option<PathBuf>,
    cache: HashMap<String, Framebuffer>,
}

impl ReferenceScenes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            cache: HashMap::new(),
        }
    }

    /// Register an in-memory reference (tests, embedders).
    pub fn insert(&mut self, scene: impl Into<String>, frame: Framebuffer) {
        self.cache.insert(scene.into(), frame);
    }

    pub fn get(&mut self, scene: &str) -> Option<&Framebuffer> {
        if !self.cache.contains_key(scene) {
            let dir = self.dir.as_ref()?;
            let frame = load_png(&dir.join(format!("{scene}.png")))?;
            self.cache.insert(scene.to_string(), frame);
        }
        self.cache.get(scene)
    }
}

fn load_png(path: &Path) -> Option<Framebuffer> {
    match image::open(path) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Some(Framebuffer::new(w, h, rgba.into_raw()))
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), "reference scene unavailable: {}", e);
            None
        }
    }
}
