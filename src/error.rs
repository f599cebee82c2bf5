//! Error types for the imagecoderx library.
//!
//! Failures are layered by how far they are allowed to travel:
//!
//! * [`ImageCoderError`] is **fatal**: the request cannot proceed at all
//!   (missing or undecodable image, invalid configuration, unwritable output).
//!   Returned as `Err(ImageCoderError)` from the top-level `convert*` functions.
//!
//! * [`RegionError`] is **non-fatal**: one region failed (OCR crash, LLM
//!   timeout, background removal exit code) while the rest of the screenshot
//!   is fine. Stored inside [`crate::output::RegionResult`] next to the
//!   placeholder fragment that replaced the region's markup.
//!
//! * [`CollaboratorError`] is what an external capability (OCR, LLM,
//!   background removal) reports back across its trait boundary. The
//!   synthesizer tags it with the region index and turns it into a
//!   [`RegionError`].
//!
//! * [`CompositionError`] covers fragment markup that could not be recovered. The
//!   compositor records it in [`crate::pipeline::compose::ComposedDocument`]
//!   and keeps the fragment as literal text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the imagecoderx library.
///
/// Region-level failures use [`RegionError`] and are stored in
/// [`crate::output::RegionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ImageCoderError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The image exists but could not be decoded.
    #[error("Unreadable image '{source_name}': {detail}")]
    ImageLoad { source_name: String, detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// An external capability could not be reached or configured.
    #[error("Collaborator '{collaborator}' is unavailable.\n{hint}")]
    CollaboratorUnavailable { collaborator: String, hint: String },

    /// Some regions were replaced by placeholders.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any region failure as an error.
    #[error("{failed}/{total} regions failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the side-channel asset directory.
    #[error("Failed to prepare asset directory '{path}': {source}")]
    AssetDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation or config file parsing failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single region.
///
/// The overall conversion always continues; the region's block shows a
/// placeholder instead of synthesized markup.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RegionError {
    /// Text extraction failed for the region crop.
    #[error("Region {region}: OCR failed: {detail}")]
    OcrFailed { region: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Region {region}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        region: usize,
        retries: u8,
        detail: String,
    },

    /// The background-removal tool exited unsuccessfully. The raw crop is
    /// used instead.
    #[error("Region {region}: background removal failed: {detail}")]
    BackgroundRemovalFailed { region: usize, detail: String },

    /// The region crop could not be written as an asset.
    #[error("Region {region}: could not write asset: {detail}")]
    AssetWriteFailed { region: usize, detail: String },

    /// The OCR binary, LLM endpoint or removal tool is not reachable.
    #[error("Region {region}: {collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        region: usize,
        collaborator: String,
        detail: String,
    },
}

impl RegionError {
    /// Index of the region this error belongs to.
    pub fn region(&self) -> usize {
        match self {
            RegionError::OcrFailed { region, .. }
            | RegionError::LlmFailed { region, .. }
            | RegionError::BackgroundRemovalFailed { region, .. }
            | RegionError::AssetWriteFailed { region, .. }
            | RegionError::CollaboratorUnavailable { region, .. } => *region,
        }
    }

    /// Whether the region still produced its real fragment despite the error.
    pub fn is_recovered(&self) -> bool {
        matches!(self, RegionError::BackgroundRemovalFailed { .. })
    }
}

/// Failure reported by an external capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Binary missing, endpoint unreachable, provider not configured.
    #[error("{collaborator} unavailable: {detail}")]
    Unavailable { collaborator: String, detail: String },

    /// The collaborator ran but reported a failure.
    #[error("{collaborator} failed: {detail}")]
    Failed { collaborator: String, detail: String },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: impl Into<String>, detail: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            collaborator: collaborator.into(),
            detail: detail.into(),
        }
    }

    pub fn failed(collaborator: impl Into<String>, detail: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            collaborator: collaborator.into(),
            detail: detail.into(),
        }
    }

    /// Map a spawn error: a missing executable means the collaborator is
    /// unavailable, anything else is a failure.
    pub fn from_spawn(collaborator: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::unavailable(collaborator, format!("executable not found ({err})"))
        } else {
            Self::failed(collaborator, err.to_string())
        }
    }
}

/// Fragment markup the compositor could not recover.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum CompositionError {
    #[error("Fragment {index}: unparsable markup, kept as literal text: {detail}")]
    Unparsable { index: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = ImageCoderError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn image_load_display() {
        let e = ImageCoderError::ImageLoad {
            source_name: "shot.png".into(),
            detail: "bad magic".into(),
        };
        assert!(e.to_string().contains("shot.png"));
        assert!(e.to_string().contains("bad magic"));
    }

    #[test]
    fn region_error_index_and_recovery() {
        let e = RegionError::LlmFailed {
            region: 4,
            retries: 2,
            detail: "timeout".into(),
        };
        assert_eq!(e.region(), 4);
        assert!(!e.is_recovered());
        assert!(e.to_string().contains("Region 4"));

        let bg = RegionError::BackgroundRemovalFailed {
            region: 1,
            detail: "exit status 1".into(),
        };
        assert!(bg.is_recovered());
    }

    #[test]
    fn spawn_not_found_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e = CollaboratorError::from_spawn("tesseract", &io);
        assert!(matches!(e, CollaboratorError::Unavailable { .. }));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "broken pipe");
        let e = CollaboratorError::from_spawn("tesseract", &io);
        assert!(matches!(e, CollaboratorError::Failed { .. }));
    }
}
