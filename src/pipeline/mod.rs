//! Pipeline stages for screenshot-to-code conversion.
//!
//! Each submodule implements one transformation step; the external
//! capabilities (OCR, LLM, background removal, kind routing) sit behind
//! traits so they can be swapped or stubbed.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ segment ──▶ synthesize ──────────────▶ compose ──▶ emit
//! (URL/path) (regions)   ├─ ocr      (tesseract)   (blocks)    (html/tsx/jsx/dart)
//!                        ├─ kind     (code/logo/background)
//!                        ├─ llm      (+ postprocess)
//!                        ├─ background (rembg)
//!                        └─ color    (solid/gradient)
//! ```
//!
//! 1. [`input`]   canonicalise the path or URL and decode the image
//! 2. [`segment`] threshold, dilate and box the foreground; CPU-bound, runs
//!    in `spawn_blocking`
//! 3. [`synthesize`] per region: OCR, kind routing, then LLM code, logo asset
//!    or background style
//! 4. [`compose`] place every fragment as an absolutely positioned block
//! 5. [`emit`]    wrap the document in the requested artifact shape

pub mod background;
pub mod color;
pub mod compose;
pub mod emit;
pub mod encode;
pub mod input;
pub mod kind;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod segment;
pub mod synthesize;
