// src/evaluator/capture.rs — Jittered screenshot capture
//
// Screenshots are sampled around the settled baseline time so the model sees
// the artifact in motion, not just one frame. Each sample is PNG-encoded and
// dropped if it exceeds the per-item byte cap.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::harness::IDLE_MOUSE;
use crate::core::types::Evidence;
use crate::infra::errors::LoopError;
use crate::render::{BufferHandle, Framebuffer, ProgramHandle, RenderBackend, Uniforms};

/// Picks capture times in `baseline ± jitter`.
pub struct JitterSampler {
    rng: StdRng,
    baseline: f32,
    jitter: f32,
}

impl JitterSampler {
    /// A negative jitter is treated as its magnitude; NaN as zero.
    pub fn new(baseline: f32, jitter: f32, seed: Option<u64>) -> Self {
        let jitter = if jitter.is_finite() { jitter.abs() } else { 0.0 };
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            baseline,
            jitter,
        }
    }

    pub fn next_time(&mut self) -> f32 {
        if self.jitter == 0.0 {
            return self.baseline;
        }
        self.baseline + self.rng.random_range(-self.jitter..=self.jitter)
    }

    pub fn sample(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.next_time()).collect()
    }
}

/// Encode an RGBA8 framebuffer as PNG.
pub fn encode_png(frame: &Framebuffer) -> Result<Vec<u8>, LoopError> {
    if !frame.is_well_formed() {
        return Err(LoopError::Encoding(format!(
            "framebuffer is {} bytes, expected {}x{}x4",
            frame.rgba.len(),
            frame.width,
            frame.height
        )));
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &frame.rgba,
            frame.width,
            frame.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| LoopError::Encoding(e.to_string()))?;
    Ok(out)
}

/// Render and encode one frame per time. Frames that fail to encode or
/// exceed `per_item_cap` are skipped.
pub fn capture_screenshots(
    backend: &mut dyn RenderBackend,
    program: ProgramHandle,
    buffer: BufferHandle,
    times: &[f32],
    per_item_cap: u64,
) -> Vec<Evidence> {
    let resolution = backend.resolution();
    let mut captured = Vec::with_capacity(times.len());

    for &time in times {
        backend.render(
            program,
            buffer,
            &Uniforms::frame(time, resolution, IDLE_MOUSE),
        );
        let frame = backend.read_pixels();
        let png = match encode_png(&frame) {
            Ok(png) => png,
            Err(e) => {
                tracing::debug!(time, "screenshot skipped: {}", e);
                continue;
            }
        };
        if png.len() as u64 > per_item_cap {
            tracing::debug!(
                time,
                bytes = png.len(),
                cap = per_item_cap,
                "screenshot over per-item cap, dropped"
            );
            continue;
        }
        captured.push(Evidence::new(time, frame.width, frame.height, png));
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── JitterSampler ──────────────────────────────────────────

    #[test]
    fn test_samples_stay_within_jitter() {
        let mut s = JitterSampler::new(1.0, 2.0, Some(7));
        for t in s.sample(100) {
            assert!((-1.0..=3.0).contains(&t), "{t} outside baseline ± jitter");
        }
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let a = JitterSampler::new(1.0, 2.0, Some(42)).sample(5);
        let b = JitterSampler::new(1.0, 2.0, Some(42)).sample(5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_jitter_returns_baseline() {
        let mut s = JitterSampler::new(1.5, 0.0, None);
        assert_eq!(s.sample(3), vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn test_negative_jitter_uses_magnitude() {
        let mut s = JitterSampler::new(0.0, -0.5, Some(1));
        for t in s.sample(50) {
            assert!((-0.5..=0.5).contains(&t));
        }
    }

    // ─── encode_png ─────────────────────────────────────────────

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&Framebuffer::solid(4, 4, [0, 0, 255, 255])).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 4));
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let bad = Framebuffer::new(4, 4, vec![0; 10]);
        assert!(matches!(encode_png(&bad), Err(LoopError::Encoding(_))));
    }
}
