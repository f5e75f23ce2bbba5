// src/parser/sanitize.rs — Strip markdown/HTML wrapping from model output

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// Remove fenced code-block delimiter lines and HTML comments, then trim.
///
/// Runs to a fixed point: stripping a comment can expose a new fence or
/// splice together a new comment, so a single pass is not idempotent.
/// Every productive pass shortens the text, which bounds the loop.
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let without_comments = strip_html_comments(text);
    strip_fence_lines(&without_comments).trim().to_string()
}

/// Drop `<!-- ... -->` spans. An unterminated comment runs to end of text.
pub(crate) fn strip_html_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(COMMENT_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + COMMENT_OPEN.len()..];
        match after_open.find(COMMENT_CLOSE) {
            Some(end) => rest = &after_open[end + COMMENT_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Drop lines that are only a code fence, with or without a language tag
/// (```` ``` ````, ```` ```glsl ````, ```` ~~~c++ ````).
pub(crate) fn strip_fence_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| !is_fence_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_fence_line(line: &str) -> bool {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"));
    let Some(rest) = rest else {
        return false;
    };
    let tag = rest.trim_start_matches(['`', '~']).trim();
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.' | '#'))
}
