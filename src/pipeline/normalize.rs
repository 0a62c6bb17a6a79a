//! Deterministic clean-up of page text, native or OCR'd.
//!
//! Engines disagree on line endings, leave trailing blanks on every line and
//! sprinkle zero-width characters through the output. These rules make the
//! text comparable across engines and decide whether a page really has text.
//!
//! ## Rule order
//!
//! Invisible characters go first so a line holding only a ZWSP counts as
//! blank; line endings are unified before any per-line rule runs.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise `input`, returning `None` when nothing but whitespace remains.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens) and the
///    form feed tesseract appends after every page
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Drop leading and trailing blank lines
pub fn normalize_text(input: &str) -> Option<String> {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = trim_outer_blank_lines(&s);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{000C}',
        ],
        "",
    )
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule 5: Trim outer blank lines ───────────────────────────────────────────

fn trim_outer_blank_lines(input: &str) -> String {
    input.trim_matches('\n').to_string()
}
