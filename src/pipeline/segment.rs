//! Region segmentation: split a screenshot into candidate rectangles.
//!
//! The image is reduced to luminance and binarised with a local-mean
//! threshold, so a gradient or vignette does not swallow the foreground the
//! way a single global cut would. The binary mask is then dilated with a
//! square structuring element whose size sets the granularity:
//!
//! | Mode | Element | Effect |
//! |------|---------|--------|
//! | [`SegmentationMode::Text`] | 5×5 | glyphs merge into words and lines, lines stay apart |
//! | [`SegmentationMode::Object`] | 50×50 | whole widgets merge into coarse blocks |
//!
//! Each top-level outer contour of the dilated mask becomes one region, in
//! contour discovery order. That order is the paint order used by the
//! compositor, so no sort is applied afterwards.

use crate::error::ImageCoderError;
use crate::output::Region;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::filter::box_filter;
use imageproc::morphology::dilate;
use std::path::Path;
use tracing::debug;

/// Radius of the local-mean window used for thresholding.
const THRESHOLD_RADIUS: u32 = 5;
/// A pixel counts as foreground when it is at least this much darker than
/// its local mean.
const THRESHOLD_OFFSET: i32 = 2;

const TEXT_KERNEL: u32 = 5;
const OBJECT_KERNEL: u32 = 50;

/// Granularity of the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SegmentationMode {
    /// Text lines; boxes that do not look like text are discarded.
    Text,
    /// Coarse UI blocks; boxes are padded.
    Object,
}

/// Tunables for one segmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    pub mode: SegmentationMode,
    /// Side of the square structuring element.
    pub kernel_size: u32,
    /// Margin added to every box in object mode.
    pub padding: u32,
}

impl SegmentOptions {
    pub fn text() -> Self {
        Self {
            mode: SegmentationMode::Text,
            kernel_size: TEXT_KERNEL,
            padding: 0,
        }
    }

    pub fn object(padding: u32) -> Self {
        Self {
            mode: SegmentationMode::Object,
            kernel_size: OBJECT_KERNEL,
            padding,
        }
    }
}

/// Segment an already-decoded image.
pub fn segment(image: &DynamicImage, options: &SegmentOptions) -> Vec<Region> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mask = adaptive_threshold_inv(&gray, THRESHOLD_RADIUS, THRESHOLD_OFFSET);
    let radius = (options.kernel_size / 2).clamp(1, u8::MAX as u32) as u8;
    let dilated = dilate(&mask, Norm::LInf, radius);

    let boxes = external_bounding_boxes(&dilated);
    debug!(
        "Segmentation ({:?}): {} external contours on {}x{}",
        options.mode,
        boxes.len(),
        width,
        height
    );

    let regions: Vec<Region> = boxes
        .into_iter()
        .filter_map(|r| match options.mode {
            SegmentationMode::Text => is_text_like(&r).then_some(r),
            SegmentationMode::Object => Some(r.padded(options.padding)),
        })
        .filter(|r| !r.is_empty())
        .collect();

    debug!("Kept {} regions", regions.len());
    regions
}

/// Decode the image at `path` and segment it.
///
/// An unreadable image fails the whole call; no partial region list is ever
/// returned.
pub fn segment_path(path: &Path, options: &SegmentOptions) -> Result<Vec<Region>, ImageCoderError> {
    let image = crate::pipeline::input::load_image_blocking(path)?;
    Ok(segment(&image, options))
}

/// Inverted local-mean threshold: dark-on-light ink becomes 255.
///
/// A pixel is foreground when `pixel + offset <= mean` of its
/// `(2r+1)×(2r+1)` neighbourhood, so flat areas of any brightness are
/// background.
fn adaptive_threshold_inv(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let mean = box_filter(gray, radius, radius);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in gray.enumerate_pixels() {
        let local = mean.get_pixel(x, y)[0] as i32;
        let v = if px[0] as i32 + offset <= local { 255 } else { 0 };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

/// Bounding boxes of the top-level outer contours of a binary mask.
fn external_bounding_boxes(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let xs = c.points.iter().map(|p| p.x);
            let ys = c.points.iter().map(|p| p.y);
            let (min_x, max_x) = (xs.clone().min()?, xs.max()?);
            let (min_y, max_y) = (ys.clone().min()?, ys.max()?);
            Some(Region::clamped(
                min_x,
                min_y,
                max_x - min_x + 1,
                max_y - min_y + 1,
                width,
                height,
            ))
        })
        .collect()
}

/// Text lines are wider than tall but not absurdly so, and not tiny specks.
fn is_text_like(r: &Region) -> bool {
    if r.width <= 20 || r.height <= 10 {
        return false;
    }
    let aspect = r.width as f64 / r.height as f64;
    aspect > 1.0 && aspect < 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn fill(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }

    fn assert_in_bounds(regions: &[Region], w: u32, h: u32) {
        for r in regions {
            assert!(r.x + r.width <= w, "{r:?} exceeds width {w}");
            assert!(r.y + r.height <= h, "{r:?} exceeds height {h}");
            assert_eq!((r.image_width, r.image_height), (w, h));
        }
    }

    #[test]
    fn uniform_image_has_no_regions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([40, 90, 200])));
        assert!(segment(&img, &SegmentOptions::text()).is_empty());
        assert!(segment(&img, &SegmentOptions::object(50)).is_empty());
    }

    #[test]
    fn text_mode_finds_a_line() {
        let mut img = canvas(200, 100);
        fill(&mut img, 40, 40, 140, 60, [0, 0, 0]);
        let regions = segment(&DynamicImage::ImageRgb8(img), &SegmentOptions::text());

        assert_in_bounds(&regions, 200, 100);
        assert!(
            regions.iter().any(|r| r.x <= 40 && r.x + r.width >= 140 && r.y <= 40 && r.y + r.height >= 60),
            "no region covers the line: {regions:?}"
        );
    }

    #[test]
    fn text_mode_drops_specks_and_tall_boxes() {
        let mut img = canvas(200, 200);
        // A speck and a tall column: neither looks like a text line.
        fill(&mut img, 20, 20, 25, 25, [0, 0, 0]);
        fill(&mut img, 120, 20, 140, 180, [0, 0, 0]);
        let regions = segment(&DynamicImage::ImageRgb8(img), &SegmentOptions::text());
        assert!(regions.is_empty(), "unexpected regions: {regions:?}");
    }

    #[test]
    fn object_mode_pads_and_keeps_discovery_order() {
        let mut img = canvas(400, 200);
        fill(&mut img, 30, 50, 110, 150, [20, 20, 20]);
        fill(&mut img, 290, 50, 370, 150, [20, 20, 20]);
        let regions = segment(&DynamicImage::ImageRgb8(img), &SegmentOptions::object(50));

        assert_in_bounds(&regions, 400, 200);
        assert_eq!(regions.len(), 2, "{regions:?}");
        assert!(regions[0].x < regions[1].x);
        // Padding reaches the image edges on the outer sides.
        assert_eq!(regions[0].x, 0);
        assert_eq!(regions[1].x + regions[1].width, 400);
    }

    #[test]
    fn normalized_regions_round_trip() {
        let mut img = canvas(321, 157);
        fill(&mut img, 17, 23, 211, 61, [10, 10, 10]);
        fill(&mut img, 60, 90, 300, 120, [10, 10, 10]);
        for options in [SegmentOptions::text(), SegmentOptions::object(10)] {
            for r in segment(&DynamicImage::ImageRgb8(img.clone()), &options) {
                let back = Region::from_normalized(r.normalized(), 321, 157);
                assert!(back.x.abs_diff(r.x) <= 1 && back.y.abs_diff(r.y) <= 1);
                assert!(back.width.abs_diff(r.width) <= 1 && back.height.abs_diff(r.height) <= 1);
            }
        }
    }

    #[test]
    fn unreadable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let result = segment_path(&path, &SegmentOptions::text());
        assert!(matches!(result, Err(ImageCoderError::ImageLoad { .. })));
    }
}
