// src/parser/mod.rs — Extract an artifact from free-form model output
//
// Strategies are tried in a fixed order and the one that fired is reported,
// so callers (and tests) can tell a clean answer from a salvaged one:
//   1. Marker: text after `#-- FRAGMENT SHADER --#`
//   2. KeywordHeuristic: text from the first `precision` line onward
//   3. PassThrough: the whole reply
// Nothing here compiles anything. Garbage in, garbage artifact out; the
// evaluator is what classifies it.

mod sanitize;

pub use sanitize::sanitize;

use serde::{Deserialize, Serialize};

use crate::core::types::Artifact;

/// Separates the model's rationale from the artifact.
pub const ARTIFACT_MARKER: &str = "#-- FRAGMENT SHADER --#";

/// First token of the fragment stage's boilerplate.
const HEURISTIC_KEYWORD: &str = "precision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStrategy {
    Marker,
    KeywordHeuristic,
    PassThrough,
}

impl std::fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseStrategy::Marker => write!(f, "marker"),
            ParseStrategy::KeywordHeuristic => write!(f, "keyword-heuristic"),
            ParseStrategy::PassThrough => write!(f, "pass-through"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub artifact: Artifact,
    /// Free text preceding the artifact. Not part of the artifact.
    pub commentary: String,
    pub strategy: ParseStrategy,
}

/// Parse a raw model reply into commentary + artifact.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let (commentary, body, strategy) = if let Some(pos) = raw.find(ARTIFACT_MARKER) {
        (
            &raw[..pos],
            &raw[pos + ARTIFACT_MARKER.len()..],
            ParseStrategy::Marker,
        )
    } else if let Some(pos) = find_heuristic_split(raw) {
        (&raw[..pos], &raw[pos..], ParseStrategy::KeywordHeuristic)
    } else {
        ("", raw, ParseStrategy::PassThrough)
    };

    ParsedResponse {
        artifact: Artifact::new(sanitize(body)),
        commentary: sanitize(commentary),
        strategy,
    }
}

/// Byte offset where the fragment source most likely begins: the first line
/// starting with `precision`, pulled back over directly preceding
/// preprocessor lines (`#version`, `#ifdef GL_ES`, ...).
fn find_heuristic_split(raw: &str) -> Option<usize> {
    let mut offset = 0usize;
    // (start offset of the line's content, is preprocessor directive)
    let mut lines: Vec<(usize, bool)> = Vec::new();

    for line in raw.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let content = line.trim();
        let start = offset + indent;
        offset += line.len();

        if starts_with_word(content, HEURISTIC_KEYWORD) {
            let mut split = start;
            for &(prev_start, is_directive) in lines.iter().rev() {
                if !is_directive {
                    break;
                }
                split = prev_start;
            }
            return Some(split);
        }
        lines.push((start, is_preprocessor_directive(content)));
    }
    None
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .map(|rest| rest.starts_with(|c: char| c.is_whitespace()))
        .unwrap_or(false)
}

/// `#version 300 es`, `#ifdef GL_ES`; not markdown headings (`# Title`).
fn is_preprocessor_directive(line: &str) -> bool {
    line.strip_prefix('#')
        .and_then(|rest| rest.chars().next())
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
}
