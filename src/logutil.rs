//! Helpers for putting user-supplied text (quest names, oracle replies) into
//! single-line log records.

use std::fmt::Write;

/// Longest preview kept in a log line, in characters.
const MAX_PREVIEW: usize = 160;

/// Escape newlines, tabs, backslashes and other control characters so a log
/// record stays on one line, and cut the text at [`MAX_PREVIEW`] characters.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count == MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:04x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
