// src/render/mod.rs — Render-backend capability consumed by the evaluator
//
// The evaluator never talks to a graphics API directly. Anything that can
// compile two stages, link them, draw a quad, and hand back pixels satisfies
// `RenderBackend` and can be swapped in (GL context, headless software
// rasterizer, test double).

use serde::{Deserialize, Serialize};

/// GL-style "no error" code returned by `get_error`.
pub const NO_ERROR: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    /// Tag used in diagnostic logs.
    pub fn tag(&self) -> &'static str {
        match self {
            StageKind::Vertex => "VERTEX",
            StageKind::Fragment => "FRAGMENT",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Result of compiling one stage. The handle exists even when `ok` is false
/// and must still be deleted.
#[derive(Debug, Clone)]
pub struct StageCompile {
    pub handle: ShaderHandle,
    pub ok: bool,
    pub log: String,
}

/// Result of linking stages into a program. Same ownership rule as
/// `StageCompile`.
#[derive(Debug, Clone)]
pub struct ProgramLink {
    pub handle: ProgramHandle,
    pub ok: bool,
    pub log: String,
}

/// Uniform values, dispatched by tag instead of by runtime shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// Number of float components, e.g. for `glUniform{N}f` dispatch.
    pub fn components(&self) -> usize {
        match self {
            UniformValue::Float(_) => 1,
            UniformValue::Vec2(_) => 2,
            UniformValue::Vec3(_) => 3,
            UniformValue::Vec4(_) => 4,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v,
            UniformValue::Vec4(v) => v,
        }
    }
}

/// Ordered uniform set for a single draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    values: Vec<(String, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard per-frame set every generated shader may rely on:
    /// `iTime`, `iResolution` and `iMouse`.
    pub fn frame(time: f32, resolution: (u32, u32), mouse: [f32; 4]) -> Self {
        Self::new()
            .with("iTime", UniformValue::Float(time))
            .with(
                "iResolution",
                UniformValue::Vec3([resolution.0 as f32, resolution.1 as f32, 1.0]),
            )
            .with("iMouse", UniformValue::Vec4(mouse))
    }

    /// Set a uniform, replacing an existing value of the same name.
    pub fn with(mut self, name: &str, value: UniformValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: UniformValue) {
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.values.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn time(&self) -> Option<f32> {
        match self.get("iTime") {
            Some(UniformValue::Float(t)) => Some(t),
            _ => None,
        }
    }
}

/// RGBA8 pixel buffer as read back from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A buffer filled with one color.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, rgba)
    }

    pub fn pixel_count(&self) -> usize {
        self.rgba.len() / 4
    }

    /// Whether the buffer length matches its declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == self.width as usize * self.height as usize * 4
    }

    /// True if any pixel has nonzero alpha.
    pub fn any_alpha(&self) -> bool {
        self.rgba.chunks_exact(4).any(|px| px[3] != 0)
    }

    /// True if any pixel has a nonzero color channel.
    pub fn any_visible_rgb(&self) -> bool {
        self.rgba
            .chunks_exact(4)
            .any(|px| px[0] != 0 || px[1] != 0 || px[2] != 0)
    }
}

/// Compile/link/draw/read-back capability.
///
/// Implementations report problems through `ok`/`log` fields and
/// `get_error`, never by panicking; the evaluator turns them into verdicts.
pub trait RenderBackend: Send {
    fn compile(&mut self, source: &str, stage: StageKind) -> StageCompile;

    fn link(&mut self, stages: &[ShaderHandle]) -> ProgramLink;

    /// Upload vertex data (interleaved 2D positions).
    fn create_buffer(&mut self, vertices: &[f32]) -> BufferHandle;

    fn render(&mut self, program: ProgramHandle, buffer: BufferHandle, uniforms: &Uniforms);

    fn read_pixels(&mut self) -> Framebuffer;

    /// Pending error code, cleared by the read. `NO_ERROR` when clean.
    fn get_error(&mut self) -> u32;

    fn delete_shader(&mut self, shader: ShaderHandle);

    fn delete_program(&mut self, program: ProgramHandle);

    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Drawing surface size in pixels.
    fn resolution(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── UniformValue ───────────────────────────────────────────

    #[test]
    fn test_uniform_components_by_tag() {
        assert_eq!(UniformValue::Float(1.0).components(), 1);
        assert_eq!(UniformValue::Vec2([0.0; 2]).components(), 2);
        assert_eq!(UniformValue::Vec3([0.0; 3]).components(), 3);
        assert_eq!(UniformValue::Vec4([0.0; 4]).components(), 4);
        assert_eq!(UniformValue::Vec3([1.0, 2.0, 3.0]).as_slice(), &[1.0, 2.0, 3.0]);
    }

    // ─── Uniforms ───────────────────────────────────────────────

    #[test]
    fn test_frame_uniforms() {
        let u = Uniforms::frame(2.5, (640, 480), [0.0; 4]);
        assert_eq!(u.time(), Some(2.5));
        assert_eq!(
            u.get("iResolution"),
            Some(UniformValue::Vec3([640.0, 480.0, 1.0]))
        );
        assert_eq!(u.iter().count(), 3);
    }

    #[test]
    fn test_set_replaces_existing() {
        let mut u = Uniforms::new().with("iTime", UniformValue::Float(1.0));
        u.set("iTime", UniformValue::Float(3.0));
        assert_eq!(u.iter().count(), 1);
        assert_eq!(u.time(), Some(3.0));
    }

    // ─── Framebuffer ────────────────────────────────────────────

    #[test]
    fn test_solid_framebuffer() {
        let fb = Framebuffer::solid(4, 2, [0, 0, 255, 255]);
        assert!(fb.is_well_formed());
        assert_eq!(fb.pixel_count(), 8);
        assert!(fb.any_alpha());
        assert!(fb.any_visible_rgb());
    }

    #[test]
    fn test_transparent_framebuffer_has_no_alpha() {
        let fb = Framebuffer::solid(3, 3, [10, 20, 30, 0]);
        assert!(!fb.any_alpha());
        // Color without alpha: the two visibility signals disagree
        assert!(fb.any_visible_rgb());
    }

    #[test]
    fn test_black_opaque_framebuffer() {
        let fb = Framebuffer::solid(2, 2, [0, 0, 0, 255]);
        assert!(fb.any_alpha());
        assert!(!fb.any_visible_rgb());
    }

    #[test]
    fn test_stage_tags() {
        assert_eq!(StageKind::Vertex.to_string(), "VERTEX");
        assert_eq!(StageKind::Fragment.tag(), "FRAGMENT");
    }
}
