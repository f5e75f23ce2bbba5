// src/cli/parse.rs — Split a saved model reply into commentary and source

use std::io::Read;

use crate::parser::{parse_response, ParsedResponse};

/// Parse a reply from `file`, or stdin when no file is given.
pub fn run_parse(file: Option<&str>) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let parsed = parse_response(&raw);
    print!("{}", render_parsed(&parsed));
    Ok(())
}

/// Strategy and commentary on top, then the artifact verbatim.
pub fn render_parsed(parsed: &ParsedResponse) -> String {
    let mut out = format!("strategy: {}\n", parsed.strategy);
    if !parsed.commentary.is_empty() {
        out.push_str("commentary:\n");
        for line in parsed.commentary.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("---\n");
    out.push_str(parsed.artifact.source());
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
