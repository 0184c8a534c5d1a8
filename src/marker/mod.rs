//! Text-level marker placement.
//!
//! The signature anchor is a literal one-line match of
//! `func <name>(t *testing.T) {`. It is a heuristic, not a parser: signatures
//! split across lines, a different parameter name or type, or extra
//! whitespace do not match.

use regex::Regex;

use crate::config::MarkerStyle;

#[derive(Debug, Clone)]
pub struct SignatureAnchor {
    pattern: Regex,
}

impl SignatureAnchor {
    pub fn new(test_name: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"func {}\(t \*testing\.T\) \{{",
            regex::escape(test_name)
        ))?;
        Ok(Self { pattern })
    }

    /// Byte offset just past the opening brace of the first matching signature.
    pub fn insertion_offset(&self, content: &str) -> Option<usize> {
        self.pattern.find(content).map(|found| found.end())
    }
}

pub fn render_marker(style: &MarkerStyle, label: &str) -> String {
    format!(
        "{}{}(\"{}: {}\")",
        style.indent, style.call, style.prefix, label
    )
}

/// Line ending used by the anchor's line; CRLF only when that line ends in one.
fn line_break_after(content: &str, offset: usize) -> &'static str {
    let rest = &content[offset..];
    match rest.find('\n') {
        Some(end) if rest[..end].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// True when the line directly below the anchor is exactly `marker`.
pub fn marker_follows(content: &str, offset: usize, marker: &str) -> bool {
    let rest = &content[offset..];
    let Some(next_line) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        return false;
    };
    match next_line.strip_prefix(marker) {
        Some(tail) => tail.is_empty() || tail.starts_with('\n') || tail.starts_with("\r\n"),
        None => false,
    }
}

/// Places `marker` on its own line directly after `offset`. The line break
/// that already follows the anchor ends the marker line; code sharing the
/// brace's line is pushed onto a fresh line below the marker.
pub fn splice_marker(content: &str, offset: usize, marker: &str) -> String {
    let newline = line_break_after(content, offset);
    let rest = &content[offset..];
    let same_line = rest.split('\n').next().unwrap_or_default();
    let needs_break = !same_line.trim().is_empty();

    let mut out = String::with_capacity(content.len() + 2 * newline.len() + marker.len());
    out.push_str(&content[..offset]);
    out.push_str(newline);
    out.push_str(marker);
    if needs_break {
        out.push_str(newline);
    }
    out.push_str(rest);
    out
}
