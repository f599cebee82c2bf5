//! Pipeline integration tests with stub collaborators.
//!
//! No external binaries or LLM endpoints are needed: OCR, code generation,
//! background removal and kind routing are all replaced through
//! `Collaborators`.

use async_trait::async_trait;
use edgequake_llm::ImageData;
use image::{DynamicImage, Rgb, RgbImage};
use imagecoderx::pipeline::background::KeepBackground;
use imagecoderx::pipeline::llm::UnavailableGenerator;
use imagecoderx::{
    compose, convert_image, convert_regions, emit, CodeGenerator, CollaboratorError, Collaborators,
    ConversionConfig, ConversionProgressCallback, Fragment, FragmentKind, LayoutStrategy, OcrOutput, OutputFormat,
    Region, RegionClassifier, RegionError, SynthesisContext, TextRecognizer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Stubs ────────────────────────────────────────────────────────────────────

struct StubOcr;

#[async_trait]
impl TextRecognizer for StubOcr {
    async fn extract(&self, _image: &DynamicImage) -> Result<OcrOutput, CollaboratorError> {
        Ok(OcrOutput {
            text: "hi".to_string(),
            char_boxes: Vec::new(),
        })
    }
}

struct StubLlm;

#[async_trait]
impl CodeGenerator for StubLlm {
    async fn complete(&self, _prompt: &str, _image: Option<ImageData>) -> Result<String, CollaboratorError> {
        Ok("```<span>hi</span>```".to_string())
    }
}

/// Left half of the screenshot is code, right half is a logo.
struct HalfClassifier;

impl RegionClassifier for HalfClassifier {
    fn classify(&self, region: &Region, _crop: &RgbImage, _text: &str) -> FragmentKind {
        if region.normalized().x < 0.5 {
            FragmentKind::Code
        } else {
            FragmentKind::Logo
        }
    }
}

/// Tags each crop with its width so the generator can tell regions apart.
struct WidthOcr;

#[async_trait]
impl TextRecognizer for WidthOcr {
    async fn extract(&self, image: &DynamicImage) -> Result<OcrOutput, CollaboratorError> {
        Ok(OcrOutput {
            text: format!("width-{}", image.width()),
            char_boxes: Vec::new(),
        })
    }
}

/// Narrower crops answer later, so early regions finish last.
#[derive(Default)]
struct SlowForNarrowLlm {
    finished: Mutex<Vec<u32>>,
}

#[async_trait]
impl CodeGenerator for SlowForNarrowLlm {
    async fn complete(&self, prompt: &str, _image: Option<ImageData>) -> Result<String, CollaboratorError> {
        let width: u32 = prompt
            .split("width-")
            .nth(1)
            .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| CollaboratorError::failed("llm", "no width tag in prompt"))?;
        tokio::time::sleep(Duration::from_millis(u64::from(50 - width) * 4)).await;
        self.finished.lock().unwrap().push(width);
        Ok(format!("<p>{width}</p>"))
    }
}

fn stub_collaborators() -> Collaborators {
    Collaborators {
        recognizer: Arc::new(StubOcr),
        generator: Arc::new(StubLlm),
        remover: Arc::new(KeepBackground),
        classifier: Arc::new(HalfClassifier),
    }
}

fn white(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
}

fn fill(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_regions_compose_into_positioned_blocks() {
    let image = DynamicImage::ImageRgb8(white(200, 100));
    let regions = [
        Region::clamped(0, 0, 100, 100, 200, 100),
        Region::clamped(100, 0, 100, 100, 200, 100),
    ];
    let collaborators = stub_collaborators();
    let config = ConversionConfig::default();
    let ctx = SynthesisContext {
        config: &config,
        collaborators: &collaborators,
        asset_dir: None,
    };

    let output = convert_regions(&image, &regions, &ctx).await;
    let doc = output.document.expect("region mode composes a document");

    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(doc.blocks[0].content, "<span>hi</span>");
    assert!(doc.blocks[0].style.starts_with("left:0%;"), "{}", doc.blocks[0].style);
    assert_eq!(doc.blocks[1].kind, FragmentKind::Logo);
    assert!(doc.blocks[1].content.starts_with("<img"), "{}", doc.blocks[1].content);
    assert!(doc.blocks[1].style.starts_with("left:50%;"), "{}", doc.blocks[1].style);

    assert_eq!(output.stats.synthesized_regions, 2);
    assert_eq!(output.stats.failed_regions, 0);
    assert!(output.code.contains("<span>hi</span>"));
}

#[tokio::test]
async fn object_segmentation_feeds_composition_in_order() {
    let mut img = white(400, 200);
    fill(&mut img, 30, 50, 110, 150);
    fill(&mut img, 290, 50, 370, 150);
    let collaborators = stub_collaborators();
    let config = ConversionConfig::builder()
        .strategy(LayoutStrategy::ObjectRegions)
        .build()
        .unwrap();

    let output = convert_image(DynamicImage::ImageRgb8(img), &config, &collaborators, None)
        .await
        .unwrap();

    assert_eq!(output.stats.detected_regions, 2);
    let doc = output.document.unwrap();
    assert_eq!(doc.blocks.len(), output.regions.len());
    for (i, (block, result)) in doc.blocks.iter().zip(&output.regions).enumerate() {
        assert_eq!(block.index, i);
        assert_eq!(result.index, i);
    }
    assert_eq!(doc.blocks[0].kind, FragmentKind::Code);
    assert_eq!(doc.blocks[1].kind, FragmentKind::Logo);
}

#[tokio::test]
async fn out_of_order_completion_keeps_region_order() {
    let llm = Arc::new(SlowForNarrowLlm::default());
    let collaborators = stub_collaborators()
        .with_recognizer(Arc::new(WidthOcr))
        .with_generator(llm.clone());
    let config = ConversionConfig::builder()
        .strategy(LayoutStrategy::TextRegions)
        .concurrency(4)
        .build()
        .unwrap();
    let ctx = SynthesisContext {
        config: &config,
        collaborators: &collaborators,
        asset_dir: None,
    };
    // Region i is 10 * (i + 1) pixels wide.
    let regions: Vec<Region> = (0..4u32)
        .map(|i| Region::clamped(i * 40, 0, 10 * (i + 1), 20, 200, 20))
        .collect();

    let output = convert_regions(&DynamicImage::ImageRgb8(white(200, 20)), &regions, &ctx).await;

    assert_eq!(*llm.finished.lock().unwrap(), vec![40, 30, 20, 10]);
    assert_eq!(output.stats.failed_regions, 0);
    let doc = output.document.unwrap();
    for (i, (block, result)) in doc.blocks.iter().zip(&output.regions).enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.fragment.region, regions[i]);
        assert_eq!(block.index, i);
        assert_eq!(block.content, format!("<p>{}</p>", 10 * (i + 1)));
    }
}

#[tokio::test]
async fn blank_screenshot_falls_back_to_one_full_region() {
    let collaborators = stub_collaborators();
    let config = ConversionConfig::builder()
        .strategy(LayoutStrategy::TextRegions)
        .build()
        .unwrap();

    let output = convert_image(DynamicImage::ImageRgb8(white(120, 80)), &config, &collaborators, None)
        .await
        .unwrap();

    assert_eq!(output.stats.detected_regions, 0);
    assert_eq!(output.regions.len(), 1);
    assert_eq!(output.regions[0].fragment.region, Region::full(120, 80));
}

#[tokio::test]
async fn single_shot_emits_fragment_directly() {
    let collaborators = stub_collaborators();
    let config = ConversionConfig::builder()
        .strategy(LayoutStrategy::SingleShot)
        .output_format(OutputFormat::Tsx)
        .build()
        .unwrap();

    let output = convert_image(DynamicImage::ImageRgb8(white(64, 64)), &config, &collaborators, None)
        .await
        .unwrap();

    assert!(output.document.is_none());
    assert!(output.code.contains("<pre><span>hi</span></pre>"));
    assert!(output.code.contains("export default GeneratedComponent;"));
}

#[tokio::test]
async fn missing_llm_degrades_to_placeholders() {
    let collaborators = stub_collaborators().with_generator(Arc::new(UnavailableGenerator {
        reason: "no provider configured".into(),
    }));
    let config = ConversionConfig::builder()
        .strategy(LayoutStrategy::SingleShot)
        .build()
        .unwrap();

    let output = convert_image(DynamicImage::ImageRgb8(white(32, 32)), &config, &collaborators, None)
        .await
        .unwrap();

    assert_eq!(output.stats.failed_regions, 1);
    match &output.regions[0].error {
        Some(RegionError::CollaboratorUnavailable { collaborator, detail, .. }) => {
            assert_eq!(collaborator, "llm");
            assert!(detail.contains("no provider"));
        }
        other => panic!("expected CollaboratorUnavailable, got {other:?}"),
    }
    assert!(output.code.contains("region-error"));
    assert!(output.into_result().is_err());
}

#[tokio::test]
async fn logo_assets_land_in_asset_dir() {
    let dir = tempfile::tempdir().unwrap();
    let image = DynamicImage::ImageRgb8(white(200, 100));
    let regions = [Region::clamped(100, 0, 100, 100, 200, 100)];
    let collaborators = stub_collaborators();
    let config = ConversionConfig::default();
    let ctx = SynthesisContext {
        config: &config,
        collaborators: &collaborators,
        asset_dir: Some(dir.path()),
    };

    let output = convert_regions(&image, &regions, &ctx).await;
    let asset = dir.path().join("region-000.png");
    assert!(asset.exists());
    assert_eq!(output.asset_dir.as_deref(), Some(dir.path()));
    assert!(output.code.contains(&asset.display().to_string()));
}

#[tokio::test]
async fn progress_events_cover_every_region() {
    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
        finished_with: AtomicUsize,
    }

    impl ConversionProgressCallback for Counter {
        fn on_region_start(&self, _index: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_region_complete(&self, _index: usize, _total: usize, _kind: FragmentKind, _len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_conversion_complete(&self, _total: usize, success_count: usize) {
            self.finished_with.store(success_count, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter::default());
    let config = ConversionConfig::builder()
        .concurrency(2)
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    let collaborators = stub_collaborators();
    let ctx = SynthesisContext {
        config: &config,
        collaborators: &collaborators,
        asset_dir: None,
    };
    let regions: Vec<Region> = (0..5).map(|i| Region::clamped(i * 20, 0, 20, 20, 100, 20)).collect();

    let output = convert_regions(&DynamicImage::ImageRgb8(white(100, 20)), &regions, &ctx).await;

    assert_eq!(output.regions.len(), 5);
    assert_eq!(counter.started.load(Ordering::SeqCst), 5);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 5);
    assert_eq!(counter.finished_with.load(Ordering::SeqCst), 5);
}

#[test]
fn compose_and_emit_html_round() {
    let fragments: Vec<Fragment> = (0..3)
        .map(|i| Fragment::code(Region::clamped(0, i * 10, 30, 10, 30, 30), format!("<p>{i}</p>")))
        .collect();
    let doc = compose(&fragments);
    assert_eq!(doc.blocks.len(), 3);

    let html = doc.to_html();
    assert_eq!(emit(&html, &OutputFormat::Html), html);
    let wrapped = emit("<p>0</p>", &OutputFormat::Html);
    assert!(wrapped.contains("<pre><p>0</p></pre>"));
}
