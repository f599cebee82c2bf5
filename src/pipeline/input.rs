//! Input resolution: turn a user-supplied path or URL into a decoded image.
//!
//! URLs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so collaborators that need a file path can use it and
//! cleanup still happens on drop. Decoding is all-or-nothing: an unreadable
//! image is [`ImageCoderError::ImageLoad`] and no region is ever produced
//! from it.

use crate::error::ImageCoderError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the image was downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ImageCoderError> {
    if input.trim().is_empty() {
        return Err(ImageCoderError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ImageCoderError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ImageCoderError::ImageNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ImageCoderError::PermissionDenied { path });
        }
        Err(_) => return Err(ImageCoderError::ImageNotFound { path }),
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ImageCoderError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ImageCoderError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ImageCoderError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ImageCoderError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ImageCoderError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let temp_dir = TempDir::new().map_err(|e| ImageCoderError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImageCoderError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ImageCoderError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.png".to_string()
}

/// Decode the image file at `path`.
///
/// Runs in `spawn_blocking`; large PNG decodes are CPU-bound.
pub async fn load_image(path: &Path) -> Result<DynamicImage, ImageCoderError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_image_blocking(&path))
        .await
        .map_err(|e| ImageCoderError::Internal(format!("Decode task panicked: {}", e)))?
}

pub fn load_image_blocking(path: &Path) -> Result<DynamicImage, ImageCoderError> {
    let bytes = std::fs::read(path).map_err(|e| ImageCoderError::ImageLoad {
        source_name: path.display().to_string(),
        detail: e.to_string(),
    })?;
    decode_bytes(&bytes, &path.display().to_string())
}

/// Decode an in-memory image, sniffing the format from its magic bytes.
pub fn decode_bytes(bytes: &[u8], source_name: &str) -> Result<DynamicImage, ImageCoderError> {
    let load_err = |detail: String| ImageCoderError::ImageLoad {
        source_name: source_name.to_string(),
        detail,
    };

    let format = image::guess_format(bytes).map_err(|e| load_err(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| load_err(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(load_err("image has zero area".to_string()));
    }
    debug!(
        "Decoded {} as {:?}: {}x{}",
        source_name,
        format,
        img.width(),
        img.height()
    );
    Ok(img)
}
