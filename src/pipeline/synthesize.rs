//! Region synthesis: one region in, one [`Fragment`] out.
//!
//! For each region the crop is read by the OCR collaborator, routed by kind,
//! and then:
//!
//! * **code**: a bounded prompt (base instruction, format hint, layout
//!   summary, OCR text) goes to the LLM and the fenced block of the reply
//!   becomes the fragment body;
//! * **logo**: the crop is saved as an image asset, optionally alpha-matted
//!   by the background remover;
//! * **background**: the crop's colors are classified into a CSS background.
//!
//! Synthesis never fails as a whole. A collaborator error turns the region
//! into a placeholder fragment and is reported in
//! [`RegionResult::error`]; a background-removal failure keeps the raw crop.

use crate::config::{ConversionConfig, LayoutStrategy};
use crate::error::{CollaboratorError, RegionError};
use crate::output::{Fragment, FragmentKind, Region, RegionResult};
use crate::pipeline::background::{BackgroundRemover, KeepBackground, RembgCli};
use crate::pipeline::kind::{DensityClassifier, RegionClassifier};
use crate::pipeline::llm::{self, CodeGenerator};
use crate::pipeline::ocr::{OcrOutput, TesseractCli, TextRecognizer};
use crate::pipeline::{color, encode, postprocess};
use crate::prompts;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// The external capabilities a conversion depends on.
///
/// [`Collaborators::from_config`] builds the default command-line and LLM
/// backed set; the `with_*` methods swap one out (tests, custom engines).
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub generator: Arc<dyn CodeGenerator>,
    pub remover: Arc<dyn BackgroundRemover>,
    pub classifier: Arc<dyn RegionClassifier>,
}

impl Collaborators {
    pub fn from_config(config: &ConversionConfig) -> Self {
        let remover: Arc<dyn BackgroundRemover> = if config.remove_background {
            Arc::new(RembgCli {
                binary: config.rembg_bin.clone(),
            })
        } else {
            Arc::new(KeepBackground)
        };
        Self {
            recognizer: Arc::new(TesseractCli {
                binary: config.tesseract_bin.clone(),
                language: config.ocr_language.clone(),
                char_boxes: config.char_boxes,
            }),
            generator: llm::default_generator(config),
            remover,
            classifier: Arc::new(DensityClassifier::default()),
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RegionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Everything one region's synthesis reads. Shared by all regions of a
/// request.
pub struct SynthesisContext<'a> {
    pub config: &'a ConversionConfig,
    pub collaborators: &'a Collaborators,
    /// Where logo assets are written. `None` inlines them as `data:` URIs.
    pub asset_dir: Option<&'a Path>,
}

impl SynthesisContext<'_> {
    /// Only object segmentation routes regions by kind; text lines and the
    /// whole image are always code.
    fn classifies_kinds(&self) -> bool {
        self.config.strategy == LayoutStrategy::ObjectRegions
    }
}

/// Synthesize the fragment for `region` of `image`.
pub async fn synthesize_region(
    ctx: &SynthesisContext<'_>,
    image: &DynamicImage,
    index: usize,
    region: Region,
) -> RegionResult {
    let start = Instant::now();
    let crop = image.crop_imm(region.x, region.y, region.width, region.height);

    let ocr = match ctx.collaborators.recognizer.extract(&crop).await {
        Ok(ocr) => ocr,
        Err(e) => {
            warn!("Region {}: OCR failed — {}", index, e);
            let mut result = RegionResult::failed(index, region, ocr_error(index, e));
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }
    };

    let kind = if ctx.classifies_kinds() {
        ctx.collaborators
            .classifier
            .classify(&region, &crop.to_rgb8(), &ocr.text)
    } else {
        FragmentKind::Code
    };
    debug!("Region {}: {} ({}x{})", index, kind.as_str(), region.width, region.height);

    let mut result = match kind {
        FragmentKind::Code => code_fragment(ctx, index, region, &crop, &ocr).await,
        FragmentKind::Logo => logo_fragment(ctx, index, region, &crop).await,
        FragmentKind::Background => RegionResult::ok(
            index,
            Fragment::background(region, Some(color::classify(&crop.to_rgb8()))),
        ),
    };
    result.ocr_text_len = ocr.text.chars().count();
    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

async fn code_fragment(
    ctx: &SynthesisContext<'_>,
    index: usize,
    region: Region,
    crop: &DynamicImage,
    ocr: &OcrOutput,
) -> RegionResult {
    let config = ctx.config;
    let layout = prompts::layout_summary(ocr, region.width, region.height, config.max_layout_chars);
    let prompt = prompts::build_region_prompt(
        config.base_prompt(),
        &config.output_format,
        layout.as_deref(),
        &ocr.text,
        config.max_prompt_chars,
    );

    let image = if config.attach_region_image {
        match encode::encode_region(crop) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Region {}: crop not attached — {}", index, e);
                None
            }
        }
    } else {
        None
    };

    match ctx.collaborators.generator.complete(&prompt, image).await {
        Ok(response) => {
            let code = postprocess::clean_response(&response);
            RegionResult::ok(index, Fragment::code(region, code))
        }
        Err(e) => {
            warn!("Region {}: code synthesis failed — {}", index, e);
            let error = match e {
                CollaboratorError::Unavailable { collaborator, detail } => RegionError::CollaboratorUnavailable {
                    region: index,
                    collaborator,
                    detail,
                },
                CollaboratorError::Failed { detail, .. } => RegionError::LlmFailed {
                    region: index,
                    retries: config.max_retries.min(u8::MAX as u32) as u8,
                    detail,
                },
            };
            RegionResult::failed(index, region, error)
        }
    }
}

async fn logo_fragment(ctx: &SynthesisContext<'_>, index: usize, region: Region, crop: &DynamicImage) -> RegionResult {
    let asset_error = |detail: String| RegionError::AssetWriteFailed { region: index, detail };

    let png = match encode::png_bytes(crop) {
        Ok(png) => png,
        Err(e) => return RegionResult::failed(index, region, asset_error(e.to_string())),
    };

    // Nothing to run over a file and nowhere to keep one: inline the crop.
    if ctx.asset_dir.is_none() && !ctx.config.remove_background {
        return RegionResult::ok(index, Fragment::logo(region, encode::png_data_uri(&png)));
    }

    // The scratch dir lives until the matted bytes are read back.
    let (dir, scratch) = match ctx.asset_dir {
        Some(dir) => (dir.to_path_buf(), None),
        None => match tempfile::tempdir() {
            Ok(tmp) => (tmp.path().to_path_buf(), Some(tmp)),
            Err(e) => return RegionResult::failed(index, region, asset_error(format!("tempdir: {e}"))),
        },
    };

    let raw_path = dir.join(format!("region-{index:03}.png"));
    if let Err(e) = tokio::fs::write(&raw_path, &png).await {
        return RegionResult::failed(index, region, asset_error(format!("{}: {e}", raw_path.display())));
    }

    let (path, error) = strip_background(ctx, index, raw_path).await;

    let src = if scratch.is_some() {
        match tokio::fs::read(&path).await {
            Ok(bytes) => encode::png_data_uri(&bytes),
            Err(e) => return RegionResult::failed(index, region, asset_error(format!("{}: {e}", path.display()))),
        }
    } else {
        path.display().to_string()
    };

    let mut result = RegionResult::ok(index, Fragment::logo(region, src));
    result.error = error;
    result
}

/// Run the remover if enabled. On failure the raw crop stays in use and the
/// error is returned alongside it.
async fn strip_background(ctx: &SynthesisContext<'_>, index: usize, raw: PathBuf) -> (PathBuf, Option<RegionError>) {
    if !ctx.config.remove_background {
        return (raw, None);
    }
    match ctx.collaborators.remover.remove_background(&raw).await {
        Ok(path) => (path, None),
        Err(e) => {
            warn!("Region {}: background removal failed, keeping raw crop — {}", index, e);
            (
                raw,
                Some(RegionError::BackgroundRemovalFailed {
                    region: index,
                    detail: e.to_string(),
                }),
            )
        }
    }
}

fn ocr_error(index: usize, e: CollaboratorError) -> RegionError {
    match e {
        CollaboratorError::Unavailable { collaborator, detail } => RegionError::CollaboratorUnavailable {
            region: index,
            collaborator,
            detail,
        },
        CollaboratorError::Failed { detail, .. } => RegionError::OcrFailed { region: index, detail },
    }
}
