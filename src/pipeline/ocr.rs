//! OCR collaborator: region crop → plain text and character boxes.
//!
//! [`TextRecognizer`] is the seam the synthesizer depends on; tests inject
//! stubs. [`TesseractCli`] is the default implementation and shells out to
//! the `tesseract` binary. The crop is written to a temp PNG that is removed
//! as soon as the call returns.

use crate::error::CollaboratorError;
use crate::pipeline::encode::png_bytes;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

const COLLABORATOR: &str = "tesseract";

/// One recognised character with its box, top-left origin, in crop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharBox {
    pub ch: char,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

/// What the OCR engine saw. An empty `char_boxes` is valid (text-only mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub char_boxes: Vec<CharBox>,
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn extract(&self, image: &DynamicImage) -> Result<OcrOutput, CollaboratorError>;
}

/// Runs the Tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub binary: String,
    pub language: Option<String>,
    pub char_boxes: bool,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: COLLABORATOR.to_string(),
            language: None,
            char_boxes: true,
        }
    }
}

impl TesseractCli {
    async fn run(&self, input: &std::path::Path, extra: &[&str]) -> Result<String, CollaboratorError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(input).arg("stdout");
        if let Some(ref lang) = self.language {
            cmd.args(["-l", lang]);
        }
        cmd.args(extra);

        let output = cmd
            .output()
            .await
            .map_err(|e| CollaboratorError::from_spawn(COLLABORATOR, &e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::failed(
                COLLABORATOR,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn extract(&self, image: &DynamicImage) -> Result<OcrOutput, CollaboratorError> {
        let png = png_bytes(image).map_err(|e| CollaboratorError::failed(COLLABORATOR, e.to_string()))?;
        let tmp = tempfile::Builder::new()
            .prefix("imagecoderx-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, format!("tempfile: {e}")))?;
        tokio::fs::write(tmp.path(), &png)
            .await
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, format!("tempfile write: {e}")))?;

        let text = self.run(tmp.path(), &[]).await?;
        let char_boxes = if self.char_boxes {
            let boxes = self.run(tmp.path(), &["makebox"]).await?;
            parse_makebox(&boxes, image.height())
        } else {
            Vec::new()
        };

        debug!(
            "OCR: {} chars of text, {} boxes",
            text.chars().count(),
            char_boxes.len()
        );
        Ok(OcrOutput { text, char_boxes })
    }
}

/// Parse Tesseract `makebox` output (`<char> <left> <bottom> <right> <top> <page>`,
/// bottom-left origin) into top-left-origin boxes. Malformed lines are skipped.
pub fn parse_makebox(raw: &str, image_height: u32) -> Vec<CharBox> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let mut glyph = parts.next()?.chars();
            let ch = glyph.next()?;
            if glyph.next().is_some() {
                return None;
            }
            let mut num = || parts.next()?.parse::<u32>().ok();
            let (left, bottom, right, top) = (num()?, num()?, num()?, num()?);
            Some(CharBox {
                ch,
                x1: left,
                y1: image_height.saturating_sub(top),
                x2: right,
                y2: image_height.saturating_sub(bottom),
            })
        })
        .collect()
}
