//! Configuration types for screenshot-to-code conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is loaded once (CLI flags,
//! optionally layered over [`FileConfig`]) and passed explicitly down the
//! pipeline, so tests can inject fixtures without touching global state.

use crate::error::ImageCoderError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_BASE_PROMPT;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for a screenshot-to-code conversion.
///
/// # Example
/// ```rust
/// use imagecoderx::{ConversionConfig, LayoutStrategy, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .output_format(OutputFormat::Tsx)
///     .strategy(LayoutStrategy::ObjectRegions)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Target artifact shape. Default: [`OutputFormat::Html`].
    pub output_format: OutputFormat,

    /// Whole-image or region-based reconstruction. Default: object regions.
    pub strategy: LayoutStrategy,

    /// Margin added around object regions. Default: [`RegionPadding::Coarse`].
    pub padding: RegionPadding,

    /// Base instruction sent with every region. If None, uses
    /// [`DEFAULT_BASE_PROMPT`].
    pub base_prompt: Option<String>,

    /// LLM model identifier, e.g. "llama3.2", "gpt-4.1-mini".
    pub model: Option<String>,

    /// LLM provider name (e.g. "ollama", "openai", "anthropic").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per region. Default: 2048.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Regions synthesized at the same time. Default: 4.
    pub concurrency: usize,

    /// Upper bound on the prompt length in characters. Default: 6000.
    pub max_prompt_chars: usize,

    /// How many character boxes the layout summary may list. Default: 64.
    pub max_layout_chars: usize,

    /// Tesseract executable. Default: "tesseract".
    pub tesseract_bin: String,

    /// Tesseract language code (`-l`). If None, Tesseract's default.
    pub ocr_language: Option<String>,

    /// Also request character bounding boxes from Tesseract. Default: true.
    pub char_boxes: bool,

    /// Run the background remover over logo crops. Default: false.
    pub remove_background: bool,

    /// Background-removal executable. Default: "rembg".
    pub rembg_bin: String,

    /// Attach the region crop to the LLM request (vision models). Default: false.
    pub attach_region_image: bool,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional per-region progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            strategy: LayoutStrategy::default(),
            padding: RegionPadding::default(),
            base_prompt: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            concurrency: 4,
            max_prompt_chars: 6000,
            max_layout_chars: 64,
            tesseract_bin: "tesseract".to_string(),
            ocr_language: None,
            char_boxes: true,
            remove_background: false,
            rembg_bin: "rembg".to_string(),
            attach_region_image: false,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_format", &self.output_format)
            .field("strategy", &self.strategy)
            .field("padding", &self.padding)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("char_boxes", &self.char_boxes)
            .field("remove_background", &self.remove_background)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The base instruction, falling back to the built-in default.
    pub fn base_prompt(&self) -> &str {
        self.base_prompt.as_deref().unwrap_or(DEFAULT_BASE_PROMPT)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn strategy(mut self, strategy: LayoutStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn padding(mut self, padding: RegionPadding) -> Self {
        self.config.padding = padding;
        self
    }

    pub fn base_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.base_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n;
        self
    }

    pub fn max_layout_chars(mut self, n: usize) -> Self {
        self.config.max_layout_chars = n;
        self
    }

    pub fn tesseract_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.tesseract_bin = bin.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = Some(lang.into());
        self
    }

    pub fn char_boxes(mut self, v: bool) -> Self {
        self.config.char_boxes = v;
        self
    }

    pub fn remove_background(mut self, v: bool) -> Self {
        self.config.remove_background = v;
        self
    }

    pub fn rembg_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.rembg_bin = bin.into();
        self
    }

    pub fn attach_region_image(mut self, v: bool) -> Self {
        self.config.attach_region_image = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Layer the values of an on-disk config file under the builder.
    pub fn file_config(mut self, file: &FileConfig) -> Self {
        if let Some(ref model) = file.ollama_model {
            self.config.model = Some(model.clone());
            if self.config.provider_name.is_none() {
                self.config.provider_name = Some("ollama".to_string());
            }
        }
        if let Some(ref prompt) = file.image_interpretation_prompt {
            self.config.base_prompt = Some(prompt.clone());
        }
        if let Some(ref format) = file.output_format {
            self.config.output_format = OutputFormat::from(format.as_str());
        }
        if let Some(ref bin) = file.tesseract_cmd {
            self.config.tesseract_bin = bin.clone();
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ImageCoderError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ImageCoderError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_prompt_chars < 256 {
            return Err(ImageCoderError::InvalidConfig(format!(
                "max_prompt_chars must be ≥ 256, got {}",
                c.max_prompt_chars
            )));
        }
        if c.tesseract_bin.trim().is_empty() {
            return Err(ImageCoderError::InvalidConfig(
                "tesseract_bin must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target artifact shape.
///
/// `Other` keeps the requested name and passes code through unchanged, so
/// new formats can be requested before the emitter learns about them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Tsx,
    Jsx,
    Dart,
    Other(String),
}

impl OutputFormat {
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Tsx => "tsx",
            OutputFormat::Jsx => "jsx",
            OutputFormat::Dart => "dart",
            OutputFormat::Other(name) => name,
        }
    }

    /// File extension for the emitted artifact.
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Other(name) if name.is_empty() => "txt",
            other => other.as_str(),
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => OutputFormat::Html,
            "tsx" => OutputFormat::Tsx,
            "jsx" => OutputFormat::Jsx,
            "dart" | "flutter" => OutputFormat::Dart,
            other => OutputFormat::Other(other.to_string()),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OutputFormat::from(s))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the screenshot is split before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutStrategy {
    /// One OCR + LLM pass over the whole image, no composition.
    SingleShot,
    /// Fine segmentation into text lines; every region is code.
    TextRegions,
    /// Coarse segmentation into UI blocks; each block is classified. (default)
    #[default]
    ObjectRegions,
}

/// Margin added around object-mode regions so anti-aliased edges survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionPadding {
    /// 10 px.
    Fine,
    /// 50 px. (default)
    #[default]
    Coarse,
}

impl RegionPadding {
    pub fn pixels(&self) -> u32 {
        match self {
            RegionPadding::Fine => 10,
            RegionPadding::Coarse => 50,
        }
    }
}

// ── On-disk config ───────────────────────────────────────────────────────

/// Settings persisted in `~/.imagecoderx.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_interpretation_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tesseract_cmd: Option<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            ollama_model: Some("llama3.2".to_string()),
            image_interpretation_prompt: Some(DEFAULT_BASE_PROMPT.to_string()),
            output_format: None,
            tesseract_cmd: None,
        }
    }
}

impl FileConfig {
    /// `~/.imagecoderx.json`, if a home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".imagecoderx.json"))
    }

    /// Load the config at `path`, writing the defaults there first when the
    /// file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ImageCoderError> {
        if !path.exists() {
            let config = FileConfig::default();
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| ImageCoderError::Internal(format!("config serialise: {e}")))?;
            std::fs::write(path, json).map_err(|e| {
                ImageCoderError::InvalidConfig(format!(
                    "cannot create default config at {}: {e}",
                    path.display()
                ))
            })?;
            info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ImageCoderError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: FileConfig = serde_json::from_str(&raw).map_err(|e| {
            ImageCoderError::InvalidConfig(format!("malformed {}: {e}", path.display()))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
