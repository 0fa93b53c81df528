//! Post-processing: deterministic cleanup of page text.
//!
//! pdfium reports line breaks as `\r\n`, and Tesseract ends every page with a
//! form feed and scatters trailing spaces and blank lines through its output.
//! These rules normalise both sources so the transcript reads the same
//! regardless of where a page's text came from.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule only has to deal
//! with `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cleanup for text read from a page's embedded text layer.
///
/// Only line endings are touched; the layer's own spacing is kept.
pub fn clean_embedded_text(input: &str) -> String {
    normalise_line_endings(input)
}

/// Cleanup for text recognised by OCR.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip form feeds (Tesseract page terminators)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 1
/// 6. Trim leading/trailing blank lines
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_form_feeds(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip form feeds ────────────────────────────────────────────────

fn strip_form_feeds(input: &str) -> String {
    input.replace('\x0c', "")
}

// ── Rule 3: Strip invisible characters ───────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_crlf() {
        assert_eq!(clean_embedded_text("Suman\r\nAcme Corp\r\n"), "Suman\nAcme Corp\n");
    }

    #[test]
    fn test_form_feed_stripped() {
        assert_eq!(clean_ocr_text("Hello World\n\x0c"), "Hello World");
    }

    #[test]
    fn test_blank_lines_collapsed() {
        let out = clean_ocr_text("a   \n\n\n\n\nb  ");
        assert_eq!(out, "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(clean_ocr_text("hel\u{200B}lo\u{FEFF}"), "hello");
    }

    #[test]
    fn test_empty_ocr_output() {
        assert_eq!(clean_ocr_text("\x0c"), "");
        assert_eq!(clean_ocr_text("  \n \n"), "");
    }
}
