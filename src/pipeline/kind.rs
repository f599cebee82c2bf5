//! Region kind classification: code, logo or background.
//!
//! Object-mode regions are routed by what they contain. The default
//! [`DensityClassifier`] looks at the OCR text first and the pixels second:
//! readable text means code, a near-flat crop means background, and anything
//! else (a graphic with no text) is kept as a logo image.

use crate::output::{FragmentKind, Region};
use image::RgbImage;

pub trait RegionClassifier: Send + Sync {
    fn classify(&self, region: &Region, crop: &RgbImage, ocr_text: &str) -> FragmentKind;
}

#[derive(Debug, Clone, Copy)]
pub struct DensityClassifier {
    /// Alphanumeric characters needed to call a region code.
    pub min_text_chars: usize,
    /// Largest per-channel standard deviation still considered flat.
    pub flat_stddev: f64,
}

impl Default for DensityClassifier {
    fn default() -> Self {
        Self {
            min_text_chars: 3,
            flat_stddev: 12.0,
        }
    }
}

impl RegionClassifier for DensityClassifier {
    fn classify(&self, _region: &Region, crop: &RgbImage, ocr_text: &str) -> FragmentKind {
        let text_chars = ocr_text.chars().filter(|c| c.is_alphanumeric()).count();
        if text_chars >= self.min_text_chars {
            return FragmentKind::Code;
        }
        if max_channel_stddev(crop) < self.flat_stddev {
            FragmentKind::Background
        } else {
            FragmentKind::Logo
        }
    }
}

fn max_channel_stddev(img: &RgbImage) -> f64 {
    let n = (img.width() as u64 * img.height() as u64) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mut sum = [0.0f64; 3];
    let mut sq = [0.0f64; 3];
    for p in img.pixels() {
        for c in 0..3 {
            let v = p[c] as f64;
            sum[c] += v;
            sq[c] += v * v;
        }
    }
    (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            (sq[c] / n - mean * mean).max(0.0).sqrt()
        })
        .fold(0.0, f64::max)
}
