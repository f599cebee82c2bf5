//! Output and data-model types shared by the pipeline stages.
//!
//! Everything here is owned by one conversion request: regions come out of
//! the segmenter, fragments out of the synthesizer, and the whole lot lands
//! in a [`ConversionOutput`] the caller can inspect or serialise to JSON.

use crate::error::{ImageCoderError, RegionError};
use crate::pipeline::color::BackgroundStyle;
use crate::pipeline::compose::ComposedDocument;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Regions ──────────────────────────────────────────────────────────────

/// A rectangle of the source image, in absolute pixels.
///
/// The image dimensions travel with the rectangle so the normalized form can
/// always be derived. Constructors clamp to the image, which keeps
/// `x + width <= image_width` and `y + height <= image_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

/// A rectangle expressed as fractions of the image dimensions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// Build a region, clamping it to the image bounds.
    pub fn clamped(x: u32, y: u32, width: u32, height: u32, image_width: u32, image_height: u32) -> Self {
        let x = x.min(image_width);
        let y = y.min(image_height);
        Self {
            x,
            y,
            width: width.min(image_width - x),
            height: height.min(image_height - y),
            image_width,
            image_height,
        }
    }

    /// The whole image as a single region.
    pub fn full(image_width: u32, image_height: u32) -> Self {
        Self::clamped(0, 0, image_width, image_height, image_width, image_height)
    }

    /// Rebuild the absolute rectangle from a normalized one.
    ///
    /// Edges are rounded independently so adjacent regions keep sharing an
    /// edge after the round trip.
    pub fn from_normalized(rect: NormalizedRect, image_width: u32, image_height: u32) -> Self {
        let to_px = |v: f64, dim: u32| (v.clamp(0.0, 1.0) * dim as f64).round() as u32;
        let x0 = to_px(rect.x, image_width);
        let y0 = to_px(rect.y, image_height);
        let x1 = to_px(rect.x + rect.width, image_width).max(x0);
        let y1 = to_px(rect.y + rect.height, image_height).max(y0);
        Self::clamped(x0, y0, x1 - x0, y1 - y0, image_width, image_height)
    }

    pub fn normalized(&self) -> NormalizedRect {
        let w = self.image_width.max(1) as f64;
        let h = self.image_height.max(1) as f64;
        NormalizedRect {
            x: self.x as f64 / w,
            y: self.y as f64 / h,
            width: self.width as f64 / w,
            height: self.height as f64 / h,
        }
    }

    /// Grow the region by `margin` pixels on every side, clamped to the image.
    pub fn padded(&self, margin: u32) -> Self {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = (self.x + self.width).saturating_add(margin).min(self.image_width);
        let y1 = (self.y + self.height).saturating_add(margin).min(self.image_height);
        Self::clamped(x0, y0, x1 - x0, y1 - y0, self.image_width, self.image_height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ── Fragments ────────────────────────────────────────────────────────────

/// The role a region plays in the reconstructed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Text or widgets; synthesized by the LLM.
    #[default]
    Code,
    /// A graphic kept as an image asset.
    Logo,
    /// A flat or gradient area with no content of its own.
    Background,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Code => "code",
            FragmentKind::Logo => "logo",
            FragmentKind::Background => "background",
        }
    }
}

/// Synthesis result for one region.
///
/// `body_markup` is meaningful for [`FragmentKind::Code`], `asset_path` for
/// logos and image-backed backgrounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub region: Region,
    pub kind: FragmentKind,
    pub body_markup: Option<String>,
    pub style_rules: Option<String>,
    pub asset_path: Option<String>,
    pub background: Option<BackgroundStyle>,
}

impl Fragment {
    pub fn code(region: Region, markup: impl Into<String>) -> Self {
        Self {
            region,
            kind: FragmentKind::Code,
            body_markup: Some(markup.into()),
            style_rules: None,
            asset_path: None,
            background: None,
        }
    }

    pub fn logo(region: Region, asset_path: impl Into<String>) -> Self {
        Self {
            region,
            kind: FragmentKind::Logo,
            body_markup: None,
            style_rules: None,
            asset_path: Some(asset_path.into()),
            background: None,
        }
    }

    pub fn background(region: Region, style: Option<BackgroundStyle>) -> Self {
        Self {
            region,
            kind: FragmentKind::Background,
            body_markup: None,
            style_rules: None,
            asset_path: None,
            background: style,
        }
    }

    /// A visible-but-harmless stand-in for a region that failed.
    ///
    /// Angle brackets become numeric references so that composition, which
    /// decodes `&lt;`/`&gt;` in fragment bodies, never revives them.
    pub fn placeholder(region: Region, error: &RegionError) -> Self {
        let message = error
            .to_string()
            .replace('&', "&amp;")
            .replace('<', "&#60;")
            .replace('>', "&#62;");
        Self::code(
            region,
            format!("<div class=\"region-error\" title=\"synthesis failed\">{message}</div>"),
        )
    }
}

/// The outcome of synthesizing one region.
///
/// `fragment` is always usable: on failure it is a placeholder and `error`
/// says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionResult {
    /// Position of the region in segmentation order (0-indexed).
    pub index: usize,
    pub fragment: Fragment,
    pub error: Option<RegionError>,
    /// Characters of OCR text seen for this region.
    pub ocr_text_len: usize,
    pub duration_ms: u64,
}

impl RegionResult {
    pub fn ok(index: usize, fragment: Fragment) -> Self {
        Self {
            index,
            fragment,
            error: None,
            ocr_text_len: 0,
            duration_ms: 0,
        }
    }

    pub fn failed(index: usize, region: Region, error: RegionError) -> Self {
        Self {
            index,
            fragment: Fragment::placeholder(region, &error),
            error: Some(error),
            ocr_text_len: 0,
            duration_ms: 0,
        }
    }

    /// True when the fragment is a placeholder rather than real content.
    pub fn is_failed(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_recovered())
    }
}

// ── Conversion output ───────────────────────────────────────────────────

/// Aggregate numbers for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub image_width: u32,
    pub image_height: u32,
    /// Regions produced by segmentation (before the full-image fallback).
    pub detected_regions: usize,
    pub synthesized_regions: usize,
    pub failed_regions: usize,
    pub segment_duration_ms: u64,
    pub synthesis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The emitted artifact in the requested format.
    pub code: String,
    /// The composed document; `None` in single-shot mode.
    pub document: Option<ComposedDocument>,
    /// Per-region results in region order.
    pub regions: Vec<RegionResult>,
    pub stats: ConversionStats,
    /// Side-channel directory holding extracted region assets, if any.
    pub asset_dir: Option<PathBuf>,
}

impl ConversionOutput {
    /// Treat any placeholder region as an error.
    pub fn into_result(self) -> Result<Self, ImageCoderError> {
        let failed = self.regions.iter().filter(|r| r.is_failed()).count();
        if failed == 0 {
            Ok(self)
        } else {
            let total = self.regions.len();
            Err(ImageCoderError::PartialFailure {
                success: total - failed,
                failed,
                total,
            })
        }
    }
}
