// src/evaluator/mod.rs — Artifact evaluator
//
// Compiles an artifact inside the fixed harness, runs it, and reports a
// structured verdict. Never fails for bad input: compile errors, link errors
// and blank renders all come back as data the controller acts on.

pub mod capture;
pub mod harness;
pub mod similarity;

use std::time::Instant;

use crate::core::types::{Artifact, EvaluationVerdict, Metrics};
use crate::infra::config::Config;
use crate::render::{
    BufferHandle, Framebuffer, ProgramHandle, RenderBackend, ShaderHandle, StageKind, Uniforms,
    NO_ERROR,
};
use capture::{capture_screenshots, JitterSampler};
use harness::{FRAME_STEP, IDLE_MOUSE, QUAD_VERTICES, VERTEX_SOURCE};
use similarity::{PixelSimilarity, ReferenceScenes, SimilarityMetric, FALLBACK_SIMILARITY};

/// Knobs for one evaluator instance.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub baseline_time: f32,
    pub throughput_frames: u32,
    pub max_screenshots: u32,
    pub screenshot_jitter: f32,
    pub per_image_byte_cap: u64,
    pub scene: Option<String>,
    pub seed: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EvaluatorConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            baseline_time: cfg.evaluation.baseline_time,
            throughput_frames: cfg.evaluation.throughput_frames,
            max_screenshots: cfg.evaluation.max_screenshots,
            screenshot_jitter: cfg.evaluation.screenshot_jitter,
            per_image_byte_cap: cfg.evidence.per_image_byte_cap,
            scene: cfg.evaluation.scene.clone(),
            seed: cfg.evaluation.seed,
        }
    }
}

/// Every handle created during one evaluation, released together.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    shaders: Vec<ShaderHandle>,
    programs: Vec<ProgramHandle>,
    buffers: Vec<BufferHandle>,
}

impl ResourceLedger {
    pub fn track_shader(&mut self, h: ShaderHandle) -> ShaderHandle {
        self.shaders.push(h);
        h
    }

    pub fn track_program(&mut self, h: ProgramHandle) -> ProgramHandle {
        self.programs.push(h);
        h
    }

    pub fn track_buffer(&mut self, h: BufferHandle) -> BufferHandle {
        self.buffers.push(h);
        h
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty() && self.programs.is_empty() && self.buffers.is_empty()
    }

    /// Delete everything, programs before the shaders attached to them.
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        for b in self.buffers.drain(..) {
            backend.delete_buffer(b);
        }
        for p in self.programs.drain(..) {
            backend.delete_program(p);
        }
        for s in self.shaders.drain(..) {
            backend.delete_shader(s);
        }
    }
}

pub struct ArtifactEvaluator {
    backend: Box<dyn RenderBackend>,
    config: EvaluatorConfig,
    metric: Box<dyn SimilarityMetric>,
    scenes: ReferenceScenes,
    sampler: JitterSampler,
}

impl ArtifactEvaluator {
    pub fn new(backend: Box<dyn RenderBackend>, config: EvaluatorConfig) -> Self {
        let sampler = JitterSampler::new(
            config.baseline_time,
            config.screenshot_jitter,
            config.seed,
        );
        Self {
            backend,
            config,
            metric: Box::new(PixelSimilarity),
            scenes: ReferenceScenes::new(),
            sampler,
        }
    }

    pub fn with_metric(mut self, metric: Box<dyn SimilarityMetric>) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_scenes(mut self, scenes: ReferenceScenes) -> Self {
        self.scenes = scenes;
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Compile, link, run and sample `artifact`. All backend resources are
    /// released before this returns.
    pub fn evaluate(&mut self, artifact: &Artifact) -> EvaluationVerdict {
        if artifact.is_blank() {
            tracing::debug!("blank artifact, skipping backend");
            return EvaluationVerdict::compile_failure(format!(
                "{}: empty source",
                StageKind::Fragment.tag()
            ));
        }

        let mut ledger = ResourceLedger::default();
        let verdict = self.run(artifact, &mut ledger);
        ledger.release(&mut *self.backend);

        tracing::debug!(
            digest = %artifact.digest(),
            compiled = verdict.compiled,
            linked = verdict.linked,
            anomaly = verdict.has_anomaly,
            similarity = verdict.metrics.similarity,
            fps = verdict.metrics.frames_per_second,
            evidence = verdict.evidence.len(),
            "artifact evaluated"
        );
        verdict
    }

    fn run(&mut self, artifact: &Artifact, ledger: &mut ResourceLedger) -> EvaluationVerdict {
        let backend = &mut *self.backend;

        // Both stages compile even if the first fails, so the log is complete.
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut stages = Vec::with_capacity(2);
        for (source, kind) in [
            (VERTEX_SOURCE, StageKind::Vertex),
            (artifact.source(), StageKind::Fragment),
        ] {
            let compiled = backend.compile(source, kind);
            stages.push(ledger.track_shader(compiled.handle));
            let log = compiled.log.trim();
            if !compiled.ok {
                let log = if log.is_empty() { "compile failed" } else { log };
                failures.push(format!("{}: {}", kind.tag(), log));
            } else if !log.is_empty() {
                warnings.push(format!("{}: {}", kind.tag(), log));
            }
        }
        if !failures.is_empty() {
            return EvaluationVerdict::compile_failure(failures.join("\n"));
        }

        let linked = backend.link(&stages);
        let program = ledger.track_program(linked.handle);
        if !linked.ok {
            let log = linked.log.trim();
            let log = if log.is_empty() { "link failed" } else { log };
            return EvaluationVerdict::link_failure(format!("LINK: {log}"));
        }

        let buffer = ledger.track_buffer(backend.create_buffer(&QUAD_VERTICES));
        let resolution = backend.resolution();

        // Settled frame: similarity + anomaly.
        backend.render(
            program,
            buffer,
            &Uniforms::frame(self.config.baseline_time, resolution, IDLE_MOUSE),
        );
        let settled = backend.read_pixels();
        let settled_error = backend.get_error();

        let frames_per_second = measure_throughput(
            backend,
            program,
            buffer,
            self.config.baseline_time,
            self.config.throughput_frames,
        );
        let sampling_error = backend.get_error();

        let has_anomaly =
            !settled.any_alpha() || settled_error != NO_ERROR || sampling_error != NO_ERROR;

        let times = self.sampler.sample(self.config.max_screenshots as usize);
        let evidence = capture_screenshots(
            backend,
            program,
            buffer,
            &times,
            self.config.per_image_byte_cap,
        );

        let similarity = if settled_error != NO_ERROR {
            tracing::debug!(code = settled_error, "backend error on settled frame");
            FALLBACK_SIMILARITY
        } else {
            self.similarity(&settled)
        };

        EvaluationVerdict {
            compiled: true,
            linked: true,
            diagnostic_log: warnings.join("\n"),
            metrics: Metrics {
                similarity,
                frames_per_second,
            },
            has_anomaly,
            evidence,
        }
    }

    fn similarity(&mut self, settled: &Framebuffer) -> f32 {
        let Some(scene) = self.config.scene.as_deref() else {
            return FALLBACK_SIMILARITY;
        };
        let Some(reference) = self.scenes.get(scene) else {
            tracing::debug!(scene, "no reference for scene");
            return FALLBACK_SIMILARITY;
        };
        match self.metric.score(settled, reference) {
            Some(s) => s,
            None => {
                tracing::debug!(scene, metric = self.metric.name(), "frames not comparable");
                FALLBACK_SIMILARITY
            }
        }
    }
}

/// Render `frames` consecutive frames and return frames per wall-clock second.
fn measure_throughput(
    backend: &mut dyn RenderBackend,
    program: ProgramHandle,
    buffer: BufferHandle,
    start_time: f32,
    frames: u32,
) -> f32 {
    if frames == 0 {
        return 0.0;
    }
    let resolution = backend.resolution();
    let started = Instant::now();
    for i in 0..frames {
        let t = start_time + i as f32 * FRAME_STEP;
        backend.render(program, buffer, &Uniforms::frame(t, resolution, IDLE_MOUSE));
    }
    // Read-back forces the backend to finish the queued frames.
    let _ = backend.read_pixels();
    let elapsed = started.elapsed().as_secs_f32().max(1e-6);
    frames as f32 / elapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ProgramLink, StageCompile};
    use std::sync::{Arc, Mutex};

    /// Scripted backend: fails compile on `#error`, link on `#nolink`,
    /// renders transparent on `discard`, flags a GL error on `#glerror`.
    #[derive(Default)]
    struct FakeBackend {
        next: u32,
        fragment: String,
        live: Arc<Mutex<Vec<u32>>>,
        color: [u8; 4],
        pending_error: u32,
        renders: u32,
    }

    impl FakeBackend {
        fn alloc(&mut self) -> u32 {
            self.next += 1;
            self.live.lock().unwrap().push(self.next);
            self.next
        }
        fn free(&mut self, id: u32) {
            self.live.lock().unwrap().retain(|h| *h != id);
        }
    }

    impl RenderBackend for FakeBackend {
        fn compile(&mut self, source: &str, stage: StageKind) -> StageCompile {
            if stage == StageKind::Fragment {
                self.fragment = source.to_string();
            }
            let ok = !source.contains("#error");
            StageCompile {
                handle: ShaderHandle(self.alloc()),
                ok,
                log: if ok { String::new() } else { "0:1: syntax error".into() },
            }
        }
        fn link(&mut self, _stages: &[ShaderHandle]) -> ProgramLink {
            let ok = !self.fragment.contains("#nolink");
            ProgramLink {
                handle: ProgramHandle(self.alloc()),
                ok,
                log: if ok { String::new() } else { "varying mismatch".into() },
            }
        }
        fn create_buffer(&mut self, _vertices: &[f32]) -> BufferHandle {
            BufferHandle(self.alloc())
        }
        fn render(&mut self, _p: ProgramHandle, _b: BufferHandle, _u: &Uniforms) {
            self.renders += 1;
            self.color = if self.fragment.contains("discard") {
                [0, 0, 0, 0]
            } else {
                [0, 0, 255, 255]
            };
            if self.fragment.contains("#glerror") {
                self.pending_error = 0x0502;
            }
        }
        fn read_pixels(&mut self) -> Framebuffer {
            Framebuffer::solid(4, 4, self.color)
        }
        fn get_error(&mut self) -> u32 {
            std::mem::replace(&mut self.pending_error, NO_ERROR)
        }
        fn delete_shader(&mut self, s: ShaderHandle) {
            self.free(s.0);
        }
        fn delete_program(&mut self, p: ProgramHandle) {
            self.free(p.0);
        }
        fn delete_buffer(&mut self, b: BufferHandle) {
            self.free(b.0);
        }
        fn resolution(&self) -> (u32, u32) {
            (4, 4)
        }
    }

    fn evaluator() -> (ArtifactEvaluator, Arc<Mutex<Vec<u32>>>) {
        let backend = FakeBackend::default();
        let live = backend.live.clone();
        let config = EvaluatorConfig {
            throughput_frames: 10,
            max_screenshots: 2,
            seed: Some(1),
            ..EvaluatorConfig::default()
        };
        (ArtifactEvaluator::new(Box::new(backend), config), live)
    }

    const GOOD: &str = "precision mediump float;\nvoid main() { gl_FragColor = vec4(0.0, 0.0, 1.0, 1.0); }";

    // ─── compile / link ─────────────────────────────────────────

    #[test]
    fn test_blank_artifact_is_compile_failure() {
        let (mut ev, live) = evaluator();
        let v = ev.evaluate(&Artifact::new("   "));
        assert!(!v.compiled);
        assert_eq!(v.diagnostic_log, "FRAGMENT: empty source");
        assert!(live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_compile_failure_zeroes_metrics_and_releases() {
        let (mut ev, live) = evaluator();
        let v = ev.evaluate(&Artifact::new("#error\nvoid main() {}"));
        assert!(!v.compiled);
        assert!(v.diagnostic_log.starts_with("FRAGMENT: "));
        assert!(v.diagnostic_log.contains("syntax error"));
        assert_eq!(v.metrics, Metrics::zeroed());
        assert!(v.evidence.is_empty());
        assert!(live.lock().unwrap().is_empty(), "handles leaked");
    }

    #[test]
    fn test_link_failure() {
        let (mut ev, live) = evaluator();
        let v = ev.evaluate(&Artifact::new("#nolink\nvoid main() {}"));
        assert!(v.compiled);
        assert!(!v.linked);
        assert_eq!(v.diagnostic_log, "LINK: varying mismatch");
        assert_eq!(v.metrics, Metrics::zeroed());
        assert!(live.lock().unwrap().is_empty());
    }

    // ─── running artifacts ──────────────────────────────────────

    #[test]
    fn test_good_artifact_runs_and_captures() {
        let (mut ev, live) = evaluator();
        let v = ev.evaluate(&Artifact::new(GOOD));
        assert!(v.passes(true));
        assert!(!v.has_anomaly);
        assert!(v.metrics.frames_per_second > 0.0);
        assert_eq!(v.metrics.similarity, FALLBACK_SIMILARITY);
        assert_eq!(v.evidence.len(), 2);
        assert!(v.evidence.iter().all(|e| e.byte_len > 0));
        assert!(live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transparent_render_is_anomaly() {
        let (mut ev, _) = evaluator();
        let v = ev.evaluate(&Artifact::new("void main() { discard; }"));
        assert!(v.ran());
        assert!(v.has_anomaly);
        assert!(!v.passes(true));
        assert!(v.passes(false));
    }

    #[test]
    fn test_backend_error_is_anomaly_and_falls_back() {
        let (ev, _) = evaluator();
        let mut scenes = ReferenceScenes::new();
        scenes.insert("blue", Framebuffer::solid(4, 4, [0, 0, 255, 255]));
        let mut ev = ev.with_scenes(scenes);
        ev.config.scene = Some("blue".into());

        let v = ev.evaluate(&Artifact::new("#glerror\nvoid main() {}"));
        assert!(v.has_anomaly);
        assert_eq!(v.metrics.similarity, FALLBACK_SIMILARITY);
    }

    #[test]
    fn test_similarity_against_scene() {
        let (ev, _) = evaluator();
        let mut scenes = ReferenceScenes::new();
        scenes.insert("blue", Framebuffer::solid(4, 4, [0, 0, 255, 255]));
        let mut ev = ev.with_scenes(scenes);
        ev.config.scene = Some("blue".into());

        let v = ev.evaluate(&Artifact::new(GOOD));
        assert!((v.metrics.similarity - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_oversized_screenshots_dropped() {
        let (mut ev, _) = evaluator();
        ev.config.per_image_byte_cap = 8;
        let v = ev.evaluate(&Artifact::new(GOOD));
        assert!(v.ran());
        assert!(v.evidence.is_empty());
    }

    #[test]
    fn test_zero_throughput_frames() {
        let (mut ev, _) = evaluator();
        ev.config.throughput_frames = 0;
        let v = ev.evaluate(&Artifact::new(GOOD));
        assert_eq!(v.metrics.frames_per_second, 0.0);
    }

    // ─── ResourceLedger ─────────────────────────────────────────

    #[test]
    fn test_ledger_release_empties() {
        let mut backend = FakeBackend::default();
        let live = backend.live.clone();
        let mut ledger = ResourceLedger::default();
        let s = ShaderHandle(backend.alloc());
        ledger.track_shader(s);
        let b = backend.create_buffer(&QUAD_VERTICES);
        ledger.track_buffer(b);
        assert!(!ledger.is_empty());

        ledger.release(&mut backend);
        assert!(ledger.is_empty());
        assert!(live.lock().unwrap().is_empty());
    }
}
