// src/evaluator/harness.rs — Fixed scaffolding every artifact runs inside
//
// The vertex stage and the full-screen quad are not user-modifiable. Only the
// fragment stage comes from the model.

/// Pass-through vertex stage: one attribute, clip-space positions.
pub const VERTEX_SOURCE: &str = "attribute vec2 position;
void main() {
  gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Two triangles covering clip space, interleaved (x, y).
pub const QUAD_VERTICES: [f32; 12] = [
    -1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    -1.0, 1.0, //
    1.0, -1.0, //
    1.0, 1.0, //
];

/// Frame step used when sampling throughput.
pub const FRAME_STEP: f32 = 1.0 / 60.0;

/// Mouse state for headless evaluation: no cursor, no clicks.
pub const IDLE_MOUSE: [f32; 4] = [0.0; 4];
