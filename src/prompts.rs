//! Prompts for per-region code synthesis.
//!
//! The base instruction is configurable (see
//! [`crate::config::ConversionConfig::base_prompt`]); everything else in the
//! prompt is derived from the region: the requested output format, a compact
//! layout summary built from OCR character boxes, and the raw OCR text.
//! The assembled prompt never exceeds the configured character budget.

use crate::config::OutputFormat;
use crate::pipeline::ocr::OcrOutput;
use std::fmt::Write as _;

/// Default base instruction, used when no override is configured.
pub const DEFAULT_BASE_PROMPT: &str = r#"You are an expert front-end developer. You receive the OCR text of one region of a user-interface screenshot, together with the positions of its characters inside the region.

Reconstruct that region as code:
- Reproduce every piece of visible text exactly once, in reading order
- Use semantic elements (headings, buttons, inputs, lists, links) where the text suggests them
- Keep styling in a single <style> block; do not use external resources
- Size the markup to fill its container; it is placed absolutely by the caller

Output ONLY the code inside one fenced code block. No commentary."#;

/// Per-format hint appended after the base instruction.
pub fn format_instruction(format: &OutputFormat) -> String {
    match format {
        OutputFormat::Html => {
            "Target format: html. Return a complete HTML document with <head>, <style> and <body>.".to_string()
        }
        OutputFormat::Tsx => "Target format: tsx. Return JSX markup suitable for a React TypeScript component body.".to_string(),
        OutputFormat::Jsx => "Target format: jsx. Return JSX markup suitable for a React component body.".to_string(),
        OutputFormat::Dart => "Target format: dart. Return a Flutter widget tree.".to_string(),
        OutputFormat::Other(name) => format!("Target format: {name}."),
    }
}

/// Summarise character boxes as normalized positions within the region.
///
/// Lists at most `max_chars` characters. Returns `None` when there are no
/// boxes (text-only OCR).
pub fn layout_summary(ocr: &OcrOutput, region_width: u32, region_height: u32, max_chars: usize) -> Option<String> {
    let boxes: Vec<_> = ocr
        .char_boxes
        .iter()
        .filter(|b| !b.ch.is_whitespace())
        .collect();
    let (first, last) = (boxes.first()?, boxes.last()?);

    let w = region_width.max(1) as f64;
    let h = region_height.max(1) as f64;
    let pos = |x: u32, y: u32| (x as f64 / w, y as f64 / h);

    let (fx, fy) = pos(first.x1, first.y1);
    let (lx, ly) = pos(last.x2, last.y2);
    let mut out = format!(
        "Layout: {} characters. First '{}' at ({:.2}, {:.2}), last '{}' ends at ({:.2}, {:.2}).",
        boxes.len(),
        first.ch,
        fx,
        fy,
        last.ch,
        lx,
        ly
    );

    if max_chars > 0 {
        out.push_str("\nPositions:");
        for b in boxes.iter().take(max_chars) {
            let (x, y) = pos(b.x1, b.y1);
            let _ = write!(out, " {}({:.2},{:.2})", b.ch, x, y);
        }
        if boxes.len() > max_chars {
            let _ = write!(out, " … (+{} more)", boxes.len() - max_chars);
        }
    }
    Some(out)
}

/// Assemble the prompt for one region, bounded to `max_chars` characters.
///
/// OCR text is truncated first; the layout summary is dropped if even that
/// is not enough.
pub fn build_region_prompt(
    base: &str,
    format: &OutputFormat,
    layout: Option<&str>,
    ocr_text: &str,
    max_chars: usize,
) -> String {
    let header = format!("{base}\n\n{}\n", format_instruction(format));
    let mut layout_block = layout.map(|l| format!("\n{l}\n")).unwrap_or_default();

    let framing = "\nOCR text:\n\"\"\"\n\n\"\"\"";
    let fixed = |layout_block: &str| {
        header.chars().count() + layout_block.chars().count() + framing.chars().count()
    };
    if fixed(&layout_block) > max_chars {
        layout_block.clear();
    }

    let budget = max_chars.saturating_sub(fixed(&layout_block));
    let text = truncate_chars(ocr_text.trim(), budget);

    let prompt = format!("{header}{layout_block}\nOCR text:\n\"\"\"\n{text}\n\"\"\"");
    truncate_chars(&prompt, max_chars).to_string()
}

/// Longest prefix of `s` with at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::CharBox;

    fn sample_ocr() -> OcrOutput {
        OcrOutput {
            text: "Hi you".into(),
            char_boxes: vec![
                CharBox { ch: 'H', x1: 10, y1: 5, x2: 20, y2: 25 },
                CharBox { ch: 'i', x1: 22, y1: 5, x2: 26, y2: 25 },
                CharBox { ch: 'y', x1: 40, y1: 5, x2: 50, y2: 30 },
                CharBox { ch: 'o', x1: 52, y1: 10, x2: 62, y2: 25 },
                CharBox { ch: 'u', x1: 64, y1: 10, x2: 100, y2: 50 },
            ],
        }
    }

    #[test]
    fn default_prompt_asks_for_fenced_code() {
        assert!(DEFAULT_BASE_PROMPT.contains("fenced code block"));
    }

    #[test]
    fn layout_summary_normalizes_first_and_last() {
        let summary = layout_summary(&sample_ocr(), 100, 50, 64).unwrap();
        assert!(summary.contains("5 characters"));
        assert!(summary.contains("First 'H' at (0.10, 0.10)"));
        assert!(summary.contains("last 'u' ends at (1.00, 1.00)"));
    }

    #[test]
    fn layout_summary_caps_listed_chars() {
        let summary = layout_summary(&sample_ocr(), 100, 50, 2).unwrap();
        assert!(summary.contains("H(0.10,0.10) i(0.22,0.10)"));
        assert!(summary.contains("+3 more"));
        assert!(!summary.contains("y(0.40"));
    }

    #[test]
    fn layout_summary_none_without_boxes() {
        let ocr = OcrOutput { text: "plain".into(), char_boxes: vec![] };
        assert!(layout_summary(&ocr, 10, 10, 10).is_none());
    }

    #[test]
    fn prompt_embeds_all_parts() {
        let p = build_region_prompt("BASE", &OutputFormat::Jsx, Some("Layout: x"), "Sign in", 2000);
        assert!(p.starts_with("BASE"));
        assert!(p.contains("Target format: jsx"));
        assert!(p.contains("Layout: x"));
        assert!(p.contains("\"\"\"\nSign in\n\"\"\""));
    }

    #[test]
    fn prompt_is_bounded() {
        let long_text = "word ".repeat(5000);
        let p = build_region_prompt(DEFAULT_BASE_PROMPT, &OutputFormat::Html, Some("Layout"), &long_text, 1500);
        assert!(p.chars().count() <= 1500);
        assert!(p.contains("OCR text:"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
