//! Background-removal collaborator for logo crops.
//!
//! [`RembgCli`] runs `rembg i <input> <output>` and writes the alpha-matted
//! image next to the input. A non-zero exit is a recoverable failure: the
//! synthesizer keeps the unmatted crop.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const COLLABORATOR: &str = "rembg";

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background of the image at `input`; returns the output path.
    async fn remove_background(&self, input: &Path) -> Result<PathBuf, CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct RembgCli {
    pub binary: String,
}

impl Default for RembgCli {
    fn default() -> Self {
        Self {
            binary: COLLABORATOR.to_string(),
        }
    }
}

/// `<dir>/<stem>-nobg.png` for `<dir>/<stem>.<ext>`.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "region".to_string());
    input.with_file_name(format!("{stem}-nobg.png"))
}

#[async_trait]
impl BackgroundRemover for RembgCli {
    async fn remove_background(&self, input: &Path) -> Result<PathBuf, CollaboratorError> {
        let output_path = output_path_for(input);
        let output = Command::new(&self.binary)
            .arg("i")
            .arg(input)
            .arg(&output_path)
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
        if !output_path.exists() {
            return Err(CollaboratorError::failed(
                COLLABORATOR,
                format!("no output written to {}", output_path.display()),
            ));
        }

        debug!("Background removed → {}", output_path.display());
        Ok(output_path)
    }
}

/// Used when background removal is disabled: returns the input untouched.
pub struct KeepBackground;

#[async_trait]
impl BackgroundRemover for KeepBackground {
    async fn remove_background(&self, input: &Path) -> Result<PathBuf, CollaboratorError> {
        Ok(input.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_sits_next_to_input() {
        assert_eq!(
            output_path_for(Path::new("/tmp/assets/region-003.png")),
            PathBuf::from("/tmp/assets/region-003-nobg.png")
        );
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let remover = RembgCli {
            binary: "/nonexistent/rembg-imagecoderx".into(),
        };
        let err = remover.remove_background(Path::new("/tmp/x.png")).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn keep_background_is_identity() {
        let p = Path::new("/tmp/logo.png");
        assert_eq!(KeepBackground.remove_background(p).await.unwrap(), p);
    }
}
