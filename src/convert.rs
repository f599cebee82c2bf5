//! Conversion entry points.
//!
//! [`convert`] is the primary API: resolve the input, segment the screenshot
//! according to the configured [`LayoutStrategy`], synthesize every region
//! concurrently, compose the fragments and emit the requested format.
//! [`convert_with_assets`] does the same but keeps logo crops as files in a
//! caller-chosen directory. [`convert_regions`] runs only synthesis and
//! composition, for callers with their own segmentation.

use crate::config::{ConversionConfig, LayoutStrategy, OutputFormat};
use crate::error::ImageCoderError;
use crate::output::{ConversionOutput, ConversionStats, Fragment, FragmentKind, Region, RegionResult};
use crate::pipeline::segment::{self, SegmentOptions};
use crate::pipeline::synthesize::{synthesize_region, Collaborators, SynthesisContext};
use crate::pipeline::{compose, emit, input};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a screenshot file or URL to code.
///
/// # Returns
/// `Ok(ConversionOutput)` even when some regions failed; failed regions show
/// a placeholder and are listed with their error in `output.regions`. Use
/// [`ConversionOutput::into_result`] to treat any failure as an error.
///
/// # Errors
/// Only fatal problems: missing or undecodable image, failed download,
/// internal task failure.
pub async fn convert(input_str: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput, ImageCoderError> {
    let collaborators = Collaborators::from_config(config);
    convert_with_collaborators(input_str, config, &collaborators, None).await
}

/// Like [`convert`], but logo crops are written into `asset_dir` (created if
/// needed) and referenced by path instead of being inlined.
pub async fn convert_with_assets(
    input_str: impl AsRef<str>,
    asset_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ImageCoderError> {
    let asset_dir = asset_dir.as_ref();
    tokio::fs::create_dir_all(asset_dir)
        .await
        .map_err(|e| ImageCoderError::AssetDirFailed {
            path: asset_dir.to_path_buf(),
            source: e,
        })?;
    let collaborators = Collaborators::from_config(config);
    convert_with_collaborators(input_str, config, &collaborators, Some(asset_dir)).await
}

/// Convert with explicitly supplied collaborators.
pub async fn convert_with_collaborators(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    collaborators: &Collaborators,
    asset_dir: Option<&Path>,
) -> Result<ConversionOutput, ImageCoderError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let image = input::load_image(resolved.path()).await?;
    convert_image(image, config, collaborators, asset_dir).await
}

/// Convert an already-decoded screenshot.
pub async fn convert_image(
    image: DynamicImage,
    config: &ConversionConfig,
    collaborators: &Collaborators,
    asset_dir: Option<&Path>,
) -> Result<ConversionOutput, ImageCoderError> {
    let total_start = Instant::now();
    let (width, height) = (image.width(), image.height());
    let ctx = SynthesisContext {
        config,
        collaborators,
        asset_dir,
    };

    // ── Step 1: Segment ──────────────────────────────────────────────────
    let segment_start = Instant::now();
    let (regions, detected) = match config.strategy {
        LayoutStrategy::SingleShot => (vec![Region::full(width, height)], 1),
        LayoutStrategy::TextRegions | LayoutStrategy::ObjectRegions => {
            let options = match config.strategy {
                LayoutStrategy::TextRegions => SegmentOptions::text(),
                _ => SegmentOptions::object(config.padding.pixels()),
            };
            let regions = segment_blocking(image.clone(), options).await?;
            let detected = regions.len();
            if regions.is_empty() {
                warn!("No regions detected; using the whole image as one region");
                (vec![Region::full(width, height)], 0)
            } else {
                (regions, detected)
            }
        }
    };
    let segment_duration_ms = segment_start.elapsed().as_millis() as u64;
    info!(
        "{}x{} image → {} regions in {}ms",
        width,
        height,
        regions.len(),
        segment_duration_ms
    );

    // ── Step 2: Synthesize, compose, emit ────────────────────────────────
    let mut output = if config.strategy == LayoutStrategy::SingleShot {
        convert_single(&image, regions[0], &ctx).await
    } else {
        convert_regions(&image, &regions, &ctx).await
    };

    output.stats.image_width = width;
    output.stats.image_height = height;
    output.stats.detected_regions = detected;
    output.stats.segment_duration_ms = segment_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    output.asset_dir = asset_dir.map(Path::to_path_buf);

    info!(
        "Conversion complete: {}/{} regions, {}ms total",
        output.stats.synthesized_regions,
        output.regions.len(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Synthesize `regions` of `image` concurrently, then compose and emit.
///
/// Regions are processed with `config.concurrency` in flight; results come
/// back in region order regardless of completion order.
pub async fn convert_regions(image: &DynamicImage, regions: &[Region], ctx: &SynthesisContext<'_>) -> ConversionOutput {
    let synth_start = Instant::now();
    let results = synthesize_all(image, regions, ctx).await;
    let synthesis_duration_ms = synth_start.elapsed().as_millis() as u64;

    let fragments: Vec<Fragment> = results.iter().map(|r| r.fragment.clone()).collect();
    let document = compose::compose(&fragments);
    for issue in &document.issues {
        warn!("{}", issue);
    }
    let code = emit::emit(&document.to_html(), &ctx.config.output_format);

    ConversionOutput {
        code,
        document: Some(document),
        stats: stats_for(&results, synthesis_duration_ms),
        regions: results,
        asset_dir: ctx.asset_dir.map(Path::to_path_buf),
    }
}

/// One region, no composition: the fragment's own markup is emitted.
async fn convert_single(image: &DynamicImage, region: Region, ctx: &SynthesisContext<'_>) -> ConversionOutput {
    let synth_start = Instant::now();
    let results = synthesize_all(image, &[region], ctx).await;
    let synthesis_duration_ms = synth_start.elapsed().as_millis() as u64;

    let body = results
        .first()
        .and_then(|r| r.fragment.body_markup.clone())
        .unwrap_or_default();
    let code = emit::emit(&body, &ctx.config.output_format);

    ConversionOutput {
        code,
        document: None,
        stats: stats_for(&results, synthesis_duration_ms),
        regions: results,
        asset_dir: ctx.asset_dir.map(Path::to_path_buf),
    }
}

async fn synthesize_all(image: &DynamicImage, regions: &[Region], ctx: &SynthesisContext<'_>) -> Vec<RegionResult> {
    let total = regions.len();
    let callback = ctx.config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_conversion_start(total);
    }

    let mut results: Vec<RegionResult> = stream::iter(regions.iter().copied().enumerate().map(move |(index, region)| async move {
        if let Some(cb) = callback {
            cb.on_region_start(index, total);
        }
        let result = synthesize_region(ctx, image, index, region).await;
        if let Some(cb) = callback {
            match &result.error {
                Some(e) if result.is_failed() => cb.on_region_error(index, total, &e.to_string()),
                _ => cb.on_region_complete(index, total, result.fragment.kind, fragment_len(&result.fragment)),
            }
        }
        result
    }))
    .buffer_unordered(ctx.config.concurrency.max(1))
    .collect()
    .await;

    // Sort by region index for paint order
    results.sort_by_key(|r| r.index);

    let succeeded = results.iter().filter(|r| !r.is_failed()).count();
    debug!("Synthesized {}/{} regions", succeeded, total);
    if let Some(cb) = callback {
        cb.on_conversion_complete(total, succeeded);
    }
    results
}

fn stats_for(results: &[RegionResult], synthesis_duration_ms: u64) -> ConversionStats {
    let failed = results.iter().filter(|r| r.is_failed()).count();
    ConversionStats {
        synthesized_regions: results.len() - failed,
        failed_regions: failed,
        synthesis_duration_ms,
        ..Default::default()
    }
}

fn fragment_len(fragment: &Fragment) -> usize {
    match fragment.kind {
        FragmentKind::Code => fragment.body_markup.as_ref().map_or(0, String::len),
        FragmentKind::Logo | FragmentKind::Background => fragment.asset_path.as_ref().map_or(0, String::len),
    }
}

/// Segmentation is CPU-bound; keep it off the async workers.
async fn segment_blocking(image: DynamicImage, options: SegmentOptions) -> Result<Vec<Region>, ImageCoderError> {
    tokio::task::spawn_blocking(move || segment::segment(&image, &options))
        .await
        .map_err(|e| ImageCoderError::Internal(format!("Segmentation task panicked: {e}")))
}

/// Convert a screenshot and write the artifact directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, ImageCoderError> {
    let output = convert(input_str, config).await?;
    write_artifact(output_path.as_ref(), &output.code, &config.output_format).await?;
    Ok(output.stats)
}

/// Write `contents` to `path` atomically (temp file + rename), creating the
/// parent directory if needed.
pub async fn write_artifact(path: &Path, contents: &str, format: &OutputFormat) -> Result<(), ImageCoderError> {
    let write_err = |e| ImageCoderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(input_str: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput, ImageCoderError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ImageCoderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Convert encoded image bytes held in memory (PNG, JPEG, WebP).
///
/// # Example
/// ```rust,no_run
/// use imagecoderx::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("screenshot.png")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// println!("{}", output.code);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(bytes: &[u8], config: &ConversionConfig) -> Result<ConversionOutput, ImageCoderError> {
    let image = input::decode_bytes(bytes, "<memory>")?;
    let collaborators = Collaborators::from_config(config);
    convert_image(image, config, &collaborators, None).await
}
