//! Fragment composition: absolutely positioned blocks in one document.
//!
//! Each fragment becomes one `element-section` block whose `left`, `top`,
//! `width` and `height` are percentages of the canvas taken from its
//! normalized region, so the page scales with the viewport. Blocks are
//! emitted in fragment order (paint order) and never look at each other.
//!
//! Code fragments that are whole HTML documents are split: their `<style>`
//! blocks join the shared stylesheet and only the body's children are
//! placed. Body-less fragments carrying `<style>` give up their styles the
//! same way. Anything else is placed as-is.

use crate::error::CompositionError;
use crate::output::{Fragment, FragmentKind, NormalizedRect};
use crate::pipeline::postprocess::unescape_angle_brackets;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

static STYLE: Lazy<Selector> = Lazy::new(|| Selector::parse("style").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

const BLOCK_CLASS: &str = "element-section";

const BASE_STYLE: &str = "html, body { margin: 0; padding: 0; }
.element-canvas { position: relative; width: 100%; min-height: 100vh; }
.element-section { position: absolute; box-sizing: border-box; overflow: hidden; }
.element-section > img { width: 100%; height: 100%; object-fit: contain; display: block; }
";

/// One placed fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedBlock {
    /// Index of the source fragment.
    pub index: usize,
    pub kind: FragmentKind,
    /// Inline CSS: position box plus any background declaration.
    pub style: String,
    /// Inner markup of the block.
    pub content: String,
}

impl PositionedBlock {
    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"{BLOCK_CLASS}\" data-kind=\"{}\" style=\"{}\">{}</div>",
            self.kind.as_str(),
            self.style,
            self.content
        )
    }
}

/// The assembled page before format emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedDocument {
    pub title: String,
    /// Source image size, used for the canvas aspect ratio.
    pub canvas: Option<(u32, u32)>,
    /// Styles collected from fragments, in fragment order.
    pub stylesheet: String,
    pub blocks: Vec<PositionedBlock>,
    /// Fragments whose markup had to be kept as literal text.
    pub issues: Vec<CompositionError>,
}

impl ComposedDocument {
    /// Serialise as a standalone HTML document.
    pub fn to_html(&self) -> String {
        let canvas_style = match self.canvas {
            Some((w, h)) if w > 0 && h > 0 => format!(" style=\"aspect-ratio: {w} / {h};\""),
            _ => String::new(),
        };
        let mut out = String::with_capacity(self.stylesheet.len() + self.blocks.len() * 256 + 512);
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        out.push_str(&format!("<title>{}</title>\n", self.title));
        out.push_str("<style>\n");
        out.push_str(BASE_STYLE);
        if !self.stylesheet.trim().is_empty() {
            out.push_str(self.stylesheet.trim());
            out.push('\n');
        }
        out.push_str("</style>\n</head>\n<body>\n");
        out.push_str(&format!("<div class=\"element-canvas\"{canvas_style}>\n"));
        for block in &self.blocks {
            out.push_str(&block.to_html());
            out.push('\n');
        }
        out.push_str("</div>\n</body>\n</html>\n");
        out
    }
}

/// Compose fragments into one document; output blocks match input order.
pub fn compose(fragments: &[Fragment]) -> ComposedDocument {
    let mut stylesheet = String::new();
    let mut issues = Vec::new();
    let mut blocks = Vec::with_capacity(fragments.len());

    for (index, fragment) in fragments.iter().enumerate() {
        let mut style = position_style(&fragment.region.normalized());
        if let Some(ref bg) = fragment.background {
            style.push(' ');
            style.push_str(&bg.to_css());
        }

        let content = match fragment.kind {
            FragmentKind::Code => {
                let markup = fragment.body_markup.as_deref().unwrap_or_default();
                code_content(index, markup, &mut stylesheet, &mut issues)
            }
            FragmentKind::Logo => fragment
                .asset_path
                .as_deref()
                .map(|src| format!("<img src=\"{}\" alt=\"logo\">", attr_escape(src)))
                .unwrap_or_default(),
            FragmentKind::Background => fragment
                .asset_path
                .as_deref()
                .map(|src| format!("<img src=\"{}\" alt=\"\">", attr_escape(src)))
                .unwrap_or_default(),
        };

        if let Some(ref rules) = fragment.style_rules {
            append_css(&mut stylesheet, rules);
        }

        blocks.push(PositionedBlock {
            index,
            kind: fragment.kind,
            style,
            content: unescape_angle_brackets(&content),
        });
    }

    debug!(
        "Composed {} blocks, {} bytes of collected CSS, {} issues",
        blocks.len(),
        stylesheet.len(),
        issues.len()
    );

    ComposedDocument {
        title: "imagecoderx".to_string(),
        canvas: fragments
            .first()
            .map(|f| (f.region.image_width, f.region.image_height)),
        stylesheet: unescape_angle_brackets(&stylesheet),
        blocks,
        issues,
    }
}

/// `left:X%; top:Y%; width:W%; height:H%;`
pub fn position_style(rect: &NormalizedRect) -> String {
    format!(
        "left:{}; top:{}; width:{}; height:{};",
        percent(rect.x),
        percent(rect.y),
        percent(rect.width),
        percent(rect.height)
    )
}

/// A fraction as a percentage with at most four decimals (`0.5` → `50%`).
pub fn percent(fraction: f64) -> String {
    let value = (fraction * 1_000_000.0).round() / 10_000.0;
    // Avoid "-0%" for tiny negative rounding noise.
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value}%")
}

fn code_content(index: usize, markup: &str, stylesheet: &mut String, issues: &mut Vec<CompositionError>) -> String {
    let lower = markup.to_ascii_lowercase();
    if lower.contains("<body") {
        return match split_document(markup) {
            Some((content, styles)) => {
                hoist(stylesheet, styles);
                content
            }
            None => {
                warn!("Fragment {}: document markup yielded no body content", index);
                issues.push(CompositionError::Unparsable {
                    index,
                    detail: "body tag present but no content recovered".to_string(),
                });
                markup.to_string()
            }
        };
    }
    if lower.contains("<style") {
        let (content, styles) = split_fragment(markup);
        hoist(stylesheet, styles);
        return content;
    }
    markup.to_string()
}

/// Body children (without `<style>`) and every style block of a document.
///
/// `None` when neither content nor styles could be recovered.
fn split_document(markup: &str) -> Option<(String, Vec<String>)> {
    let doc = Html::parse_document(markup);
    let styles = collect_styles(&doc);
    let body = doc.select(&BODY).next()?;
    let content = children_without_style(body);
    if content.is_empty() && styles.is_empty() {
        return None;
    }
    Some((content, styles))
}

/// Same split for body-less markup such as `<style>..</style><button>`.
fn split_fragment(markup: &str) -> (String, Vec<String>) {
    let frag = Html::parse_fragment(markup);
    let styles = collect_styles(&frag);
    (children_without_style(frag.root_element()), styles)
}

fn collect_styles(html: &Html) -> Vec<String> {
    html.select(&STYLE)
        .map(|s| s.text().collect::<String>())
        .filter(|css| !css.trim().is_empty())
        .collect()
}

fn children_without_style(parent: ElementRef<'_>) -> String {
    let mut content = String::new();
    for child in parent.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if el.value().name() == "style" {
                continue;
            }
            content.push_str(&el.html());
        } else if let Some(text) = child.value().as_text() {
            content.push_str(text);
        }
    }
    content.trim().to_string()
}

fn hoist(stylesheet: &mut String, styles: Vec<String>) {
    for css in styles {
        append_css(stylesheet, &css);
    }
}

fn append_css(sheet: &mut String, css: &str) {
    let css = css.trim();
    if css.is_empty() {
        return;
    }
    sheet.push_str(css);
    sheet.push('\n');
}

fn attr_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionError;
    use crate::output::{Region, RegionResult};
    use crate::pipeline::color::{BackgroundStyle, Color};

    fn half(left: bool) -> Region {
        Region::clamped(if left { 0 } else { 100 }, 0, 100, 100, 200, 100)
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(percent(0.5), "50%");
        assert_eq!(percent(0.0), "0%");
        assert_eq!(percent(1.0), "100%");
        assert_eq!(percent(1.0 / 3.0), "33.3333%");
        assert_eq!(percent(0.123456789), "12.3457%");
    }

    #[test]
    fn n_fragments_give_n_blocks_in_order() {
        let fragments: Vec<Fragment> = (0..5u32)
            .map(|i| Fragment::code(Region::clamped(i * 10, 0, 10, 10, 50, 10), format!("<p>{i}</p>")))
            .collect();
        let doc = compose(&fragments);
        assert_eq!(doc.blocks.len(), 5);
        for (i, block) in doc.blocks.iter().enumerate() {
            assert_eq!(block.index, i);
            assert_eq!(block.content, format!("<p>{i}</p>"));
            assert!(block.style.starts_with(&format!("left:{}%;", i * 20)));
        }
        assert!(doc.issues.is_empty());
    }

    #[test]
    fn document_fragment_is_split() {
        let markup = "<html><head><style>.btn { color: red; }</style></head>\
                      <body><style>p { margin: 0; }</style><button class=\"btn\">Go</button></body></html>";
        let doc = compose(&[Fragment::code(half(true), markup)]);
        assert_eq!(doc.blocks[0].content, "<button class=\"btn\">Go</button>");
        assert!(doc.stylesheet.contains(".btn { color: red; }"));
        assert!(doc.stylesheet.contains("p { margin: 0; }"));
    }

    #[test]
    fn bodyless_fragment_styles_are_hoisted() {
        let markup = "<style>.btn{color:red}</style><button class=\"btn\">Go</button>";
        let doc = compose(&[Fragment::code(half(true), markup)]);
        assert_eq!(doc.blocks[0].content, "<button class=\"btn\">Go</button>");
        assert_eq!(doc.stylesheet, ".btn{color:red}\n");
        assert!(doc.issues.is_empty());
    }

    #[test]
    fn failed_region_placeholder_stays_inert() {
        let result = RegionResult::failed(
            0,
            half(true),
            RegionError::LlmFailed {
                region: 0,
                retries: 2,
                detail: "HTTP 500: <script>alert(1)</script>".into(),
            },
        );
        let doc = compose(&[result.fragment]);
        let content = &doc.blocks[0].content;
        assert!(content.starts_with("<div class=\"region-error\""), "{content}");
        assert!(!content.contains("<script>"), "{content}");
        assert!(content.contains("&#60;script&#62;"), "{content}");
        assert!(!doc.to_html().contains("<script>"));
    }

    #[test]
    fn plain_markup_is_literal() {
        let doc = compose(&[Fragment::code(half(true), "<span>hi</span>")]);
        assert_eq!(doc.blocks[0].content, "<span>hi</span>");
        assert_eq!(doc.blocks[0].style, "left:0%; top:0%; width:50%; height:100%;");
    }

    #[test]
    fn empty_document_is_recorded_and_kept_literal() {
        let doc = compose(&[Fragment::code(half(true), "<body></body>")]);
        assert_eq!(doc.blocks[0].content, "<body></body>");
        assert_eq!(
            doc.issues,
            vec![CompositionError::Unparsable {
                index: 0,
                detail: "body tag present but no content recovered".into()
            }]
        );
    }

    #[test]
    fn logo_and_background_blocks() {
        let logo = Fragment::logo(half(false), "assets/region-001.png");
        let bg = Fragment::background(
            half(true),
            Some(BackgroundStyle::Solid {
                color: Color::new(0, 0, 255),
            }),
        );
        let doc = compose(&[bg, logo]);

        assert_eq!(doc.blocks[0].content, "");
        assert!(doc.blocks[0].style.ends_with("background-color: #0000ff;"));
        assert_eq!(doc.blocks[1].content, "<img src=\"assets/region-001.png\" alt=\"logo\">");
        assert!(doc.blocks[1].style.starts_with("left:50%;"));
    }

    #[test]
    fn escaped_brackets_are_restored() {
        let doc = compose(&[Fragment::code(half(true), "&lt;b&gt;bold&lt;/b&gt;")]);
        assert_eq!(doc.blocks[0].content, "<b>bold</b>");
    }

    #[test]
    fn to_html_contains_blocks_and_styles() {
        let mut f = Fragment::code(half(true), "<p>x</p>");
        f.style_rules = Some("p { color: #333; }".into());
        let html = compose(&[f]).to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("aspect-ratio: 200 / 100;"));
        assert!(html.contains("p { color: #333; }"));
        assert!(html.contains("class=\"element-section\""));
        assert!(html.contains("<p>x</p>"));
    }
}
