// src/util.rs — Shared string helpers for logs and terminal output

/// Truncate to at most `max_len` bytes without splitting a UTF-8 character.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First non-empty line of `s`, trimmed and truncated. Used to show model
/// commentary and diagnostics on a single terminal row.
pub fn one_line(s: &str, max_len: usize) -> &str {
    let line = s.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    truncate_str(line, max_len)
}
