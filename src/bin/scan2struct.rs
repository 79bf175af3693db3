//! CLI binary for scan2struct.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use scan2struct::normalize::Normalizer;
use scan2struct::pipeline::input::load_document;
use scan2struct::pipeline::recover::recover;
use scan2struct::{
    process_document, ContentExtraction, DocumentAnalysis, LlmCapability,
    NormalizeProgressCallback, PipelineConfig, ProgressCallback, Recovered, RecoveryState,
};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per strategy failure and a final summary.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Normalizing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl NormalizeProgressCallback for CliProgressCallback {
    fn on_normalize_start(&self, name: &str, kind: &str) {
        self.bar.set_message(format!("{name} ({kind})"));
    }

    fn on_strategy_failed(&self, strategy: &str, reason: &str) {
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {:<15} {}",
            red("✗"),
            strategy,
            dim(&msg)
        ));
    }

    fn on_page_produced(&self, page_num: usize, strategy: &str) {
        self.bar.set_message(format!("page {page_num} via {strategy}"));
    }

    fn on_normalize_complete(&self, page_count: usize, dropped: usize) {
        self.bar.finish_and_clear();
        if dropped == 0 {
            eprintln!("{} {} page(s)", green("✔"), bold(&page_count.to_string()));
        } else {
            eprintln!(
                "{} {} page(s)  ({} dropped by the page ceiling)",
                cyan("⚠"),
                bold(&page_count.to_string()),
                dropped
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Normalize a scan into bounded JPEG pages
  scan2struct normalize homework.pdf -o pages/

  # Report only, as JSON
  scan2struct normalize --json photo.jpg

  # Recover a record from a saved model reply
  scan2struct recover reply.txt --shape analysis

  # Pipe a reply through recovery
  pbpaste | scan2struct recover

  # Full pipeline: pages → vision → analysis
  scan2struct analyze essay.pdf --instruction "Grade this essay out of 100."

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; without it PDFs fall back to
                          text extraction
"#;

/// Normalize scanned documents for vision models and recover typed records
/// from model replies.
#[derive(Parser, Debug)]
#[command(
    name = "scan2struct",
    version,
    about = "Normalize scanned documents for vision models and recover typed records from their replies",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCAN2STRUCT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCAN2STRUCT_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "SCAN2STRUCT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a PDF or image into bounded JPEG pages.
    Normalize {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        /// Directory to write page-NNN.jpg files into.
        #[arg(short, long, env = "SCAN2STRUCT_OUTPUT_DIR")]
        output: Option<PathBuf>,

        /// Print the normalization report as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pages: PageArgs,
    },

    /// Recover a typed record from a raw model reply.
    Recover {
        /// File holding the reply; stdin when omitted or "-".
        input: Option<PathBuf>,

        /// Expected record shape.
        #[arg(long, value_enum, default_value = "analysis")]
        shape: ShapeArg,
    },

    /// Normalize, transcribe with a vision model, then analyse.
    Analyze {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        /// What to assess.
        #[arg(long, env = "SCAN2STRUCT_INSTRUCTION", default_value = "")]
        instruction: String,

        /// Read the instruction from a file instead.
        #[arg(long, conflicts_with = "instruction")]
        instruction_file: Option<PathBuf>,

        /// Write the JSON result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pages: PageArgs,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Maximum page width and height in pixels.
    #[arg(long, env = "SCAN2STRUCT_MAX_SIDE", default_value_t = 2000)]
    max_side: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "SCAN2STRUCT_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page-count ceiling.
    #[arg(long, env = "SCAN2STRUCT_MAX_PAGES", default_value_t = 20)]
    max_pages: usize,

    /// Characters per synthesised page when falling back to text extraction.
    #[arg(long, env = "SCAN2STRUCT_CHUNK_CHARS", default_value_t = 2000)]
    chunk_chars: usize,

    /// TrueType/OpenType font for synthesised pages.
    #[arg(long, env = "SCAN2STRUCT_FONT")]
    font: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SCAN2STRUCT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "SCAN2STRUCT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SCAN2STRUCT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per call on LLM failure.
    #[arg(long, env = "SCAN2STRUCT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SCAN2STRUCT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShapeArg {
    Analysis,
    Extraction,
    Object,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; INFO logs would
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress && !cli.verbose {
        Some(CliProgressCallback::new() as Arc<dyn NormalizeProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Normalize {
            ref input,
            ref output,
            json,
            ref pages,
        } => run_normalize(input, output.as_deref(), json, pages, progress, cli.quiet).await,
        Command::Recover { ref input, shape } => run_recover(input.as_deref(), shape),
        Command::Analyze {
            ref input,
            ref instruction,
            ref instruction_file,
            ref output,
            ref pages,
            ref model,
        } => {
            let instruction = match instruction_file {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read instruction from {:?}", path))?,
                None => instruction.clone(),
            };
            run_analyze(input, &instruction, output.as_deref(), pages, model, progress).await
        }
    }
}

async fn run_normalize(
    input: &str,
    output: Option<&Path>,
    json: bool,
    args: &PageArgs,
    progress: Option<ProgressCallback>,
    quiet: bool,
) -> Result<()> {
    let config = build_config(args, None, progress)?;
    let doc = load_document(input, config.download_timeout_secs)
        .await
        .context("Failed to load input")?;
    let report = Normalizer::new(config)
        .normalize_with_report(&doc)
        .await
        .context("Normalization failed")?;

    if let Some(dir) = output {
        let paths = report
            .pages
            .write_to_dir(dir)
            .context("Failed to write pages")?;
        if !quiet {
            eprintln!(
                "{}  {} page(s) via {}  →  {}",
                green("✔"),
                paths.len(),
                report.strategy,
                bold(&dir.display().to_string())
            );
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        for failure in &report.skipped {
            eprintln!("  {} {}", cyan("↷"), dim(&failure.to_string()));
        }
        for (i, page) in report.pages.iter().enumerate() {
            println!(
                "page {:>3}  {}x{}  {:>8} bytes  {}",
                i + 1,
                page.width,
                page.height,
                page.data.len(),
                if page.is_synthesized() { "synthesized" } else { "rasterized" }
            );
        }
    }
    Ok(())
}

fn run_recover(input: Option<&Path>, shape: ShapeArg) -> Result<()> {
    let raw = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    match shape {
        ShapeArg::Analysis => print_recovered(&recover::<DocumentAnalysis>(&raw)),
        ShapeArg::Extraction => print_recovered(&recover::<ContentExtraction>(&raw)),
        ShapeArg::Object => {
            print_recovered(&recover::<serde_json::Map<String, serde_json::Value>>(&raw))
        }
    }
}

fn print_recovered<T: Serialize>(record: &Recovered<T>) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;
    match record.state() {
        RecoveryState::Parsed => eprintln!("{} parsed", green("✔")),
        RecoveryState::Repaired => eprintln!("{} parsed after repair", cyan("⚠")),
        RecoveryState::Degraded => eprintln!("{} degraded", red("✘")),
    }
    Ok(())
}

async fn run_analyze(
    input: &str,
    instruction: &str,
    output: Option<&Path>,
    args: &PageArgs,
    model: &ModelArgs,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let config = build_config(args, Some(model), progress)?;
    let capability = LlmCapability::from_config(&config).context("No LLM provider available")?;
    let doc = load_document(input, config.download_timeout_secs)
        .await
        .context("Failed to load input")?;
    let normalizer = Normalizer::new(config);

    let result = process_document(&normalizer, &capability, &doc, instruction)
        .await
        .context("Analysis failed")?;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    pages: &PageArgs,
    model: Option<&ModelArgs>,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_dimensions(pages.max_side, pages.max_side)
        .jpeg_quality(pages.quality)
        .max_pages(pages.max_pages)
        .chunk_chars(pages.chunk_chars)
        .download_timeout_secs(pages.download_timeout);

    if let Some(ref font) = pages.font {
        builder = builder.font_path(font.clone());
    }

    if let Some(m) = model {
        builder = builder
            .max_tokens(m.max_tokens)
            .temperature(m.temperature)
            .max_retries(m.max_retries)
            .api_timeout_secs(m.api_timeout);
        if let Some(ref id) = m.model {
            builder = builder.model(id.clone());
        }
        if let Some(ref name) = m.provider {
            builder = builder.provider_name(name.clone());
        }
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
