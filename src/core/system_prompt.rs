// src/core/system_prompt.rs — Fixed instructions and the synthesized feedback turn

use super::types::EvaluationVerdict;
use crate::parser::ARTIFACT_MARKER;

/// Used when an iteration carries no human feedback.
pub const DEFAULT_CORRECTIVE: &str = "fix compilation errors and improve quality";

/// The system instruction sent first in every request.
///
/// Sections (in order):
///   1. Role: what the model produces
///   2. Contract: uniforms and entry point available to the fragment stage
///   3. Output format: commentary, marker, then source only
pub fn build_system_prompt() -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str("# Role\n\n");
    prompt.push_str(
        "You write GLSL ES fragment shaders. The vertex stage and the full-screen \
         quad are fixed; you only supply the fragment stage.\n\n",
    );

    prompt.push_str("# Contract\n\n");
    prompt.push_str("- `uniform float iTime;` seconds since start\n");
    prompt.push_str("- `uniform vec3 iResolution;` viewport size in pixels\n");
    prompt.push_str("- `uniform vec4 iMouse;` cursor position and click state\n");
    prompt.push_str("- Write the final color to `gl_FragColor` with a non-zero alpha.\n\n");

    prompt.push_str("# Output format\n\n");
    prompt.push_str("Start with one or two sentences about your approach. Then a line containing exactly\n\n");
    prompt.push_str(ARTIFACT_MARKER);
    prompt.push_str(
        "\n\nfollowed by the complete fragment shader source, beginning with its \
         `precision` declaration. Nothing after the source.\n",
    );

    prompt
}

/// The user turn closing an iteration request: index, instruction, compact
/// verdict, and the compiler/linker log when the program never ran.
pub fn build_iteration_turn(
    index: u32,
    feedback: Option<&str>,
    verdict: Option<&EvaluationVerdict>,
) -> String {
    let instruction = feedback
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_CORRECTIVE);

    let mut turn = String::with_capacity(512);
    turn.push_str(&format!("Iteration {index}\n\n"));
    turn.push_str(instruction);
    turn.push_str("\n\n");

    if let Some(v) = verdict {
        turn.push_str("Evaluation: ");
        turn.push_str(&v.summary_json());
        turn.push('\n');

        if !v.ran() && !v.diagnostic_log.trim().is_empty() {
            turn.push_str("\nDiagnostics:\n");
            turn.push_str(v.diagnostic_log.trim());
            turn.push('\n');
        }
    }

    turn
}
