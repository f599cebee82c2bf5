//! # imagecoderx
//!
//! Reconstruct UI screenshots as HTML, TSX, JSX or Flutter (Dart) code.
//!
//! A screenshot is split into regions, each region is read by OCR and turned
//! into a code fragment by an LLM (or kept as an image / a background style),
//! and the fragments are laid out again as absolutely positioned blocks, so
//! the result resembles the original layout.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PNG / JPEG / WebP
//!  │
//!  ├─ 1. Input       resolve local file or download from URL, decode
//!  ├─ 2. Segment     adaptive threshold + dilation + contours (spawn_blocking)
//!  ├─ 3. Synthesize  per region, concurrently:
//!  │                   OCR (tesseract) → kind → LLM code | logo asset | background
//!  ├─ 4. Compose     percentage-positioned blocks, shared stylesheet
//!  └─ 5. Emit        html passthrough/wrap, React component, Flutter widget
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagecoderx::{convert, ConversionConfig, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected (Ollama, OPENAI_API_KEY, ANTHROPIC_API_KEY, …)
//!     let config = ConversionConfig::builder()
//!         .output_format(OutputFormat::Html)
//!         .build()?;
//!     let output = convert("screenshot.png", &config).await?;
//!     println!("{}", output.code);
//!     eprintln!("{}/{} regions synthesized",
//!         output.stats.synthesized_regions,
//!         output.regions.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Layout Strategies
//!
//! | Strategy | Segmentation | Regions become |
//! |----------|--------------|----------------|
//! | `SingleShot` | none | one code fragment, emitted directly |
//! | `TextRegions` | 5×5 dilation, text-shaped boxes | code |
//! | `ObjectRegions` (default) | 50×50 dilation, padded | code, logo or background |
//!
//! ## External tools
//!
//! OCR uses the `tesseract` binary, optional background removal the `rembg`
//! binary. Both sit behind traits ([`TextRecognizer`], [`BackgroundRemover`])
//! and can be replaced through [`Collaborators`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imagecoderx` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, FileConfig, LayoutStrategy, OutputFormat, RegionPadding};
pub use convert::{
    convert, convert_from_bytes, convert_image, convert_regions, convert_sync, convert_to_file,
    convert_with_assets, convert_with_collaborators, write_artifact,
};
pub use error::{CollaboratorError, CompositionError, ImageCoderError, RegionError};
pub use output::{ConversionOutput, ConversionStats, Fragment, FragmentKind, NormalizedRect, Region, RegionResult};
pub use pipeline::background::BackgroundRemover;
pub use pipeline::color::{BackgroundStyle, Color, GradientDirection};
pub use pipeline::compose::{compose, ComposedDocument, PositionedBlock};
pub use pipeline::emit::emit;
pub use pipeline::kind::RegionClassifier;
pub use pipeline::llm::CodeGenerator;
pub use pipeline::ocr::{CharBox, OcrOutput, TextRecognizer};
pub use pipeline::segment::{segment, segment_path, SegmentOptions, SegmentationMode};
pub use pipeline::synthesize::{Collaborators, SynthesisContext};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
