//! Background classification: solid color or two-stop gradient.
//!
//! Four bands next to the edges are sampled (left and right quarters of the
//! central rows, top and bottom quarters of the central columns). When the
//! left/right or top/bottom means differ by more than [`GRADIENT_THRESHOLD`]
//! (summed over channels), the background is a gradient along the axis with
//! the larger difference. Otherwise it is solid, and its color comes from a
//! single-cluster quantization that ignores outlier pixels such as text.
//!
//! Classification is advisory: an unreadable image yields white rather than
//! an error.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Summed absolute channel difference above which a gradient is reported.
pub const GRADIENT_THRESHOLD: u32 = 30;

const CLUSTER_ITERATIONS: usize = 10;
const CLUSTER_EPSILON: f64 = 1.0;
/// Pixels further than this (Euclidean, 0–255 per channel) from the current
/// centre do not pull it.
const CLUSTER_RADIUS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn distance(&self, other: &Color) -> u32 {
        self.r.abs_diff(other.r) as u32 + self.g.abs_diff(other.g) as u32 + self.b.abs_diff(other.b) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    Horizontal,
    Vertical,
}

/// Declarative background descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackgroundStyle {
    Solid { color: Color },
    Gradient { direction: GradientDirection, colors: [Color; 2] },
}

impl BackgroundStyle {
    /// A single CSS declaration, terminated with `;`.
    pub fn to_css(&self) -> String {
        match self {
            BackgroundStyle::Solid { color } => format!("background-color: {};", color.to_hex()),
            BackgroundStyle::Gradient { direction, colors } => {
                let dir = match direction {
                    GradientDirection::Horizontal => "to right",
                    GradientDirection::Vertical => "to bottom",
                };
                format!(
                    "background: linear-gradient({dir}, {}, {});",
                    colors[0].to_hex(),
                    colors[1].to_hex()
                )
            }
        }
    }
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        BackgroundStyle::Solid { color: Color::WHITE }
    }
}

/// Classify an image's background. Deterministic for identical pixels.
pub fn classify(img: &RgbImage) -> BackgroundStyle {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return BackgroundStyle::default();
    }

    if w >= 4 && h >= 4 {
        let left = mean_color(img, 0, h / 4, w / 4, 3 * h / 4);
        let right = mean_color(img, 3 * w / 4, h / 4, w, 3 * h / 4);
        let top = mean_color(img, w / 4, 0, 3 * w / 4, h / 4);
        let bottom = mean_color(img, w / 4, 3 * h / 4, 3 * w / 4, h);

        let horizontal = left.distance(&right);
        let vertical = top.distance(&bottom);

        if horizontal.max(vertical) > GRADIENT_THRESHOLD {
            return if horizontal > vertical {
                BackgroundStyle::Gradient {
                    direction: GradientDirection::Horizontal,
                    colors: [left, right],
                }
            } else {
                BackgroundStyle::Gradient {
                    direction: GradientDirection::Vertical,
                    colors: [top, bottom],
                }
            };
        }
    }

    BackgroundStyle::Solid {
        color: dominant_color(img),
    }
}

/// Classify the image file at `path`; unreadable files fall back to white.
pub fn classify_path(path: &Path) -> BackgroundStyle {
    match image::open(path) {
        Ok(img) => classify(&img.to_rgb8()),
        Err(e) => {
            warn!("Background classification skipped for {}: {}", path.display(), e);
            BackgroundStyle::default()
        }
    }
}

/// Mean color of the half-open rectangle `[x0, x1) × [y0, y1)`.
fn mean_color(img: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Color {
    let mut sum = [0u64; 3];
    let mut n = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = img.get_pixel(x, y);
            for c in 0..3 {
                sum[c] += p[c] as u64;
            }
            n += 1;
        }
    }
    if n == 0 {
        return Color::WHITE;
    }
    let avg = |s: u64| ((s as f64 / n as f64).round()).clamp(0.0, 255.0) as u8;
    Color::new(avg(sum[0]), avg(sum[1]), avg(sum[2]))
}

/// k = 1 clustering over all pixels.
///
/// Seeded at the global mean; each iteration moves the centre to the mean of
/// the pixels within [`CLUSTER_RADIUS`] of it, until it moves less than
/// [`CLUSTER_EPSILON`] or the iteration budget is spent.
pub fn dominant_color(img: &RgbImage) -> Color {
    let pixels: Vec<[f64; 3]> = img
        .pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();
    if pixels.is_empty() {
        return Color::WHITE;
    }

    let mut centre = mean_of(pixels.iter());
    for _ in 0..CLUSTER_ITERATIONS {
        let members: Vec<&[f64; 3]> = pixels
            .iter()
            .filter(|p| euclidean(p, &centre) <= CLUSTER_RADIUS)
            .collect();
        if members.is_empty() {
            break;
        }
        let next = mean_of(members.into_iter());
        let shift = euclidean(&next, &centre);
        centre = next;
        if shift < CLUSTER_EPSILON {
            break;
        }
    }

    let q = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Color::new(q(centre[0]), q(centre[1]), q(centre[2]))
}

fn mean_of<'a>(pixels: impl Iterator<Item = &'a [f64; 3]>) -> [f64; 3] {
    let mut sum = [0.0; 3];
    let mut n = 0usize;
    for p in pixels {
        for c in 0..3 {
            sum[c] += p[c];
        }
        n += 1;
    }
    let n = n.max(1) as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}
