//! CLI binary for imagecoderx.
//!
//! A thin shim over the library crate that layers CLI flags over
//! `~/.imagecoderx.json`, maps them to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use imagecoderx::{
    convert, convert_with_assets, write_artifact, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    FileConfig, FragmentKind, LayoutStrategy, OutputFormat, ProgressCallback, RegionPadding,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per region.
/// Regions finish out of order, so start times are keyed by region index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Segmenting screenshot…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} regions  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Synthesizing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index))
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_regions: usize) {
        self.activate_bar(total_regions);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Synthesizing {total_regions} regions…"))
        ));
    }

    fn on_region_start(&self, index: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(format!("region {index}"));
    }

    fn on_region_complete(&self, index: usize, total: usize, kind: FragmentKind, markup_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Region {:>3}/{:<3}  {:<10}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            kind.as_str(),
            dim(&format!("{markup_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_region_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Region {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_regions: usize, success_count: usize) {
        let failed = total_regions.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} regions synthesized",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} regions synthesized  ({} placeholders)",
                if failed == total_regions { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_regions,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Screenshot to HTML (stdout)
  imagecoderx screenshot.png

  # React TypeScript component written to a file
  imagecoderx screenshot.png --format tsx -o Screen.tsx

  # Whole image in one LLM call
  imagecoderx --strategy single screenshot.png

  # Fine text-line regions, ten at a time
  imagecoderx --strategy text --concurrency 10 screenshot.png

  # Keep logo crops as files, with their backgrounds removed
  imagecoderx screenshot.png --assets ./assets --remove-background -o index.html

  # Use a specific model
  imagecoderx --provider openai --model gpt-4.1-mini screenshot.png

  # Full JSON result (regions, errors, stats)
  imagecoderx --json screenshot.png > result.json

CONFIG FILE:
  ~/.imagecoderx.json is created with defaults on first run:
    { "ollama_model": "llama3.2", "image_interpretation_prompt": "..." }
  Optional keys: "output_format", "tesseract_cmd". Flags override the file.

EXTERNAL TOOLS:
  tesseract   OCR (required for region text); https://github.com/tesseract-ocr
  rembg       background removal for logos (optional, --remove-background)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (ollama, openai, anthropic, gemini)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter
"#;

/// Reconstruct UI screenshots as HTML, TSX, JSX or Flutter code.
#[derive(Parser, Debug)]
#[command(
    name = "imagecoderx",
    version,
    about = "Reconstruct UI screenshots as HTML, TSX, JSX or Flutter code",
    long_about = "Split a screenshot into regions, read each one with OCR, let an LLM \
write code for it and lay the fragments out again as absolutely positioned blocks. \
Supports Ollama, OpenAI, Anthropic, Google Gemini and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path (PNG, JPEG, WebP) or HTTP/HTTPS URL.
    input: String,

    /// Write the artifact to this file instead of stdout.
    #[arg(short, long, env = "IMAGECODERX_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format: html, tsx, jsx, dart (anything else passes through).
    #[arg(short, long, env = "IMAGECODERX_FORMAT")]
    format: Option<String>,

    /// Layout strategy.
    #[arg(long, env = "IMAGECODERX_STRATEGY", value_enum, default_value = "object")]
    strategy: StrategyArg,

    /// Margin around object regions: fine (10 px) or coarse (50 px).
    #[arg(long, env = "IMAGECODERX_PADDING", value_enum, default_value = "coarse")]
    padding: PaddingArg,

    /// Keep logo crops as files in this directory.
    #[arg(long, env = "IMAGECODERX_ASSETS")]
    assets: Option<PathBuf>,

    /// LLM model ID (e.g. llama3.2, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: ollama, openai, anthropic, gemini, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Regions synthesized at the same time.
    #[arg(short, long, env = "IMAGECODERX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max LLM output tokens per region.
    #[arg(long, env = "IMAGECODERX_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "IMAGECODERX_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per region on LLM failure.
    #[arg(long, env = "IMAGECODERX_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Tesseract language code, e.g. eng, deu.
    #[arg(long, env = "IMAGECODERX_OCR_LANG")]
    ocr_lang: Option<String>,

    /// Run rembg over logo crops.
    #[arg(long, env = "IMAGECODERX_REMOVE_BACKGROUND")]
    remove_background: bool,

    /// Attach each region crop to the LLM request (vision models).
    #[arg(long, env = "IMAGECODERX_ATTACH_IMAGE")]
    attach_image: bool,

    /// Config file (default: ~/.imagecoderx.json).
    #[arg(long, env = "IMAGECODERX_CONFIG")]
    config: Option<PathBuf>,

    /// Ignore the config file entirely.
    #[arg(long)]
    no_config: bool,

    /// Exit non-zero if any region was replaced by a placeholder.
    #[arg(long, env = "IMAGECODERX_STRICT")]
    strict: bool,

    /// Output structured JSON (ConversionOutput) instead of code.
    #[arg(long, env = "IMAGECODERX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMAGECODERX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMAGECODERX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMAGECODERX_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMAGECODERX_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Single,
    Text,
    Object,
}

impl From<StrategyArg> for LayoutStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Single => LayoutStrategy::SingleShot,
            StrategyArg::Text => LayoutStrategy::TextRegions,
            StrategyArg::Object => LayoutStrategy::ObjectRegions,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaddingArg {
    Fine,
    Coarse,
}

impl From<PaddingArg> for RegionPadding {
    fn from(v: PaddingArg) -> Self {
        match v {
            PaddingArg::Fine => RegionPadding::Fine,
            PaddingArg::Coarse => RegionPadding::Coarse,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let file_config = load_file_config(&cli)?;
    let config = build_config(&cli, file_config.as_ref(), progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match cli.assets {
        Some(ref dir) => convert_with_assets(&cli.input, dir, &config).await,
        None => convert(&cli.input, &config).await,
    }
    .context("Conversion failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        output.code.clone()
    };

    if let Some(ref output_path) = cli.output {
        write_artifact(output_path, &rendered, &config.output_format)
            .await
            .context("Failed to write output")?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_summary(&cli, &output, show_progress);
    }

    if cli.strict && output.stats.failed_regions > 0 {
        anyhow::bail!(
            "{} of {} regions failed (--strict)",
            output.stats.failed_regions,
            output.regions.len()
        );
    }

    Ok(())
}

fn print_summary(cli: &Cli, output: &ConversionOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress && !cli.json {
        eprintln!(
            "Synthesized {}/{} regions ({} detected) in {}ms",
            stats.synthesized_regions,
            output.regions.len(),
            stats.detected_regions,
            stats.total_duration_ms
        );
        for region in output.regions.iter().filter(|r| r.is_failed()) {
            if let Some(ref e) = region.error {
                eprintln!("  {}", e);
            }
        }
    }
    if let Some(ref path) = cli.output {
        eprintln!(
            "{}  {}x{}  {}ms  →  {}",
            if stats.failed_regions == 0 { green("✔") } else { cyan("⚠") },
            stats.image_width,
            stats.image_height,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }
    if let Some(ref dir) = output.asset_dir {
        eprintln!("   assets in {}", dim(&dir.display().to_string()));
    }
}

/// Load the on-disk config unless disabled. A missing file is created with
/// defaults.
fn load_file_config(cli: &Cli) -> Result<Option<FileConfig>> {
    if cli.no_config {
        return Ok(None);
    }
    let Some(path) = cli.config.clone().or_else(FileConfig::default_path) else {
        return Ok(None);
    };
    let file = FileConfig::load_or_create(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok(Some(file))
}

/// Map CLI args (over the config file) to `ConversionConfig`.
fn build_config(cli: &Cli, file: Option<&FileConfig>, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder();
    if let Some(file) = file {
        builder = builder.file_config(file);
    }

    builder = builder
        .strategy(cli.strategy.into())
        .padding(cli.padding.into())
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .remove_background(cli.remove_background)
        .attach_region_image(cli.attach_image)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref format) = cli.format {
        builder = builder.output_format(OutputFormat::from(format.as_str()));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref lang) = cli.ocr_lang {
        builder = builder.ocr_language(lang.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn provider_and_model_flags_read_the_documented_env_vars() {
        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(|v| v.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("provider").as_deref(), Some("EDGEQUAKE_LLM_PROVIDER"));
        assert_eq!(env_of("model").as_deref(), Some("EDGEQUAKE_MODEL"));
        assert!(AFTER_HELP.contains("EDGEQUAKE_LLM_PROVIDER"));
    }
}
