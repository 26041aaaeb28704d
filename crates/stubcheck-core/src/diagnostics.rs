//! Diagnostic text helpers for compiler and generator output.

/// Marker that identifies a first-class compiler error line.
pub const ERROR_MARKER: &str = "error:";

/// Marker for compiler notes attached to an error.
pub const NOTE_MARKER: &str = "note:";

/// Reduce compiler output to its `error:`/`note:` lines.
///
/// Keeps at most `max_lines` lines and appends `... and N more errors` when
/// lines were dropped. Returns an empty string if the text contains no
/// `error:` line at all.
pub fn summarize_compiler_errors(text: &str, max_lines: usize) -> String {
    if !text.contains(ERROR_MARKER) {
        return String::new();
    }

    let lines: Vec<&str> = text
        .lines()
        .filter(|l| l.contains(ERROR_MARKER) || l.contains(NOTE_MARKER))
        .collect();

    let mut out = lines
        .iter()
        .take(max_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if lines.len() > max_lines {
        out.push_str(&format!("\n... and {} more errors", lines.len() - max_lines));
    }
    out
}

/// Keep the first `max_lines` non-empty lines of a diagnostic.
///
/// Returns the kept text and the number of lines hidden.
pub fn truncate_lines(text: &str, max_lines: usize) -> (String, usize) {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let kept = lines
        .iter()
        .take(max_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    (kept, lines.len().saturating_sub(max_lines))
}
