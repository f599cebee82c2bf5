//! Post-processing: deterministic cleanup of LLM responses.
//!
//! Models wrap code in prose ("Here is your HTML: ..."), in fences with a
//! language tag, or in HTML-escaped brackets. The rules below turn a raw
//! response into the code it contains without touching the code itself.
//!
//! ## Rule Order
//!
//! Line endings are normalised and invisible characters removed before the
//! fence search, so a CRLF after the language tag still counts as the tag's
//! line break. Bracket unescaping runs last, on the extracted code only.

use once_cell::sync::Lazy;
use regex::Regex;

const FENCE: &str = "```";

/// Apply all post-processing rules to a raw LLM response.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Extract the fenced code block, dropping surrounding prose
/// 4. Unescape `&lt;` / `&gt;`
/// 5. Trim trailing whitespace per line
/// 6. Collapse 3+ consecutive blank lines down to 2
pub fn clean_response(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    let s = extract_code_block(&s);
    let s = unescape_angle_brackets(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s).trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Extract the fenced code block ───────────────────────────────────
//
// The block spans from the first fence to the last one, so nested fences
// inside the code survive. A bare word directly after the opening fence and
// followed by a line break is a language tag and is dropped. Without any
// fence the whole response is returned, trimmed.

static RE_LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+#.-]+\n").unwrap());

/// Return the code inside the response's fenced block.
pub fn extract_code_block(response: &str) -> String {
    let Some(start) = response.find(FENCE) else {
        return response.trim().to_string();
    };
    let after_open = start + FENCE.len();
    let body = match response.rfind(FENCE) {
        Some(end) if end >= after_open => &response[after_open..end],
        // A single, unterminated fence: everything after it.
        _ => &response[after_open..],
    };

    let body = match RE_LANGUAGE_TAG.find(body) {
        Some(tag) => &body[tag.end()..],
        None => body,
    };
    body.trim().to_string()
}

// ── Rule 4: Unescape angle brackets ──────────────────────────────────────────

/// Undo `&lt;` / `&gt;` escaping some models apply to markup.
pub fn unescape_angle_brackets(input: &str) -> String {
    input.replace("&lt;", "<").replace("&gt;", ">")
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}
