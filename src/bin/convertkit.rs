//! CLI binary for convertkit.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, reads the input file and writes the outputs next to it
//! (or into `--output-dir`).

use anyhow::{bail, Context, Result};
use clap::Parser;
use convertkit::{
    convert_to_dir, routes, targets_for, ConversionProgressCallback, ConversionRequest, ConverterConfig,
    FileKind, NotebookEngine, PageImageFormat, ProgressCallback, SavedOutput,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the routine runs; switches to a page bar when PDF pages
/// start arriving, and to a byte bar while pdfium is being downloaded.
struct CliProgressCallback {
    bar: ProgressBar,
    downloading: AtomicBool,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            downloading: AtomicBool::new(false),
        })
    }

    fn activate_download(&self) {
        let download_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(download_style);
        self.bar.set_prefix("PDF engine");
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn finish_download(&self) {
        self.bar.set_style(spinner_style());
        self.bar.set_prefix("Converting");
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, source: FileKind, target: FileKind) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("{source} → {target}"));
    }

    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        if self.bar.length() != Some(total_pages as u64) {
            self.activate_bar(total_pages);
        }
        self.bar.set_position(page_num as u64);
    }

    fn on_pdfium_download(&self, downloaded: u64, total: Option<u64>) {
        if !self.downloading.swap(true, Ordering::Relaxed) {
            self.activate_download();
        }
        if let Some(t) = total {
            if self.bar.length() != Some(t) {
                self.bar.set_length(t);
            }
            if downloaded >= t {
                self.finish_download();
                self.downloading.store(false, Ordering::Relaxed);
                return;
            }
        }
        self.bar.set_position(downloaded);
    }

    fn on_conversion_complete(&self, _file_count: usize, _output_bytes: usize) {
        self.bar.finish_and_clear();
    }

    fn on_conversion_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Image formats
  convertkit photo.png --to jpg
  convertkit scan.webp --to png -o out/

  # One image per PDF page (page_1.jpg, page_2.jpg, …)
  convertkit slides.pdf --to images --dpi 150
  convertkit slides.pdf --to images --page-format png

  # Documents to PDF
  convertkit notes.txt --to pdf
  convertkit README.md --to pdf
  convertkit analysis.ipynb --to pdf --notebook-engine latex

  # Tabular data
  convertkit sales.csv --to xlsx
  convertkit export.json --to csv
  convertkit data.txt --from csv --to json

  # Machine-readable manifest of written files
  convertkit report.docx --to pdf --json

  # Everything that is supported
  convertkit --list-routes

RUNTIME DEPENDENCIES:
  PDF routes      the pdfium shared library, downloaded on first use from
                  https://github.com/bblanchon/pdfium-binaries unless installed
  HTML, Markdown  a Chromium-based browser (chromium, google-chrome, msedge, brave)
  IPYNB           jupyter nbconvert (pip install 'nbconvert[webpdf]')
                  plus xelatex for --notebook-engine latex

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory of (or path to) libpdfium
  CONVERTKIT_PDFIUM_CACHE_DIR  Where a downloaded libpdfium is kept
  CONVERTKIT_NO_PDFIUM_DOWNLOAD  Never download libpdfium
  CHROME            Path to the browser used for HTML and Markdown
  RUST_LOG          Log filter, e.g. RUST_LOG=convertkit=debug
"#;

/// Convert files between image, document, notebook and tabular formats.
#[derive(Parser, Debug)]
#[command(
    name = "convertkit",
    version,
    about = "Convert files between image, document, notebook and tabular formats",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File to convert.
    #[arg(required_unless_present = "list_routes")]
    input: Option<PathBuf>,

    /// Target kind: jpg, png, webp, pdf, images, csv, xlsx, json.
    #[arg(short, long, env = "CONVERTKIT_TO", required_unless_present = "list_routes")]
    to: Option<FileKind>,

    /// Source kind. Default: inferred from the input's extension.
    #[arg(long, env = "CONVERTKIT_FROM")]
    from: Option<FileKind>,

    /// Directory for the outputs. Default: the input's directory.
    #[arg(short, long, env = "CONVERTKIT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Print a JSON manifest of written files instead of a summary.
    #[arg(long, env = "CONVERTKIT_JSON")]
    json: bool,

    /// List every supported conversion and exit.
    #[arg(long)]
    list_routes: bool,

    /// DPI for PDF page images (36–600).
    #[arg(long, env = "CONVERTKIT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Image format for PDF pages.
    #[arg(long, env = "CONVERTKIT_PAGE_FORMAT", value_enum, default_value = "jpg")]
    page_format: PageFormatArg,

    /// JPEG quality (1–100).
    #[arg(long, env = "CONVERTKIT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Font size in points for TXT and DOCX → PDF.
    #[arg(long, env = "CONVERTKIT_FONT_SIZE")]
    font_size: Option<f32>,

    /// Baseline-to-baseline distance in points for TXT and DOCX → PDF.
    #[arg(long, env = "CONVERTKIT_LINE_HEIGHT")]
    line_height: Option<f32>,

    /// nbconvert exporter for notebooks.
    #[arg(long, env = "CONVERTKIT_NOTEBOOK_ENGINE", value_enum, default_value = "webpdf")]
    notebook_engine: EngineArg,

    /// Chromium-based browser for HTML and Markdown.
    #[arg(long, env = "CONVERTKIT_BROWSER")]
    browser: Option<PathBuf>,

    /// `jupyter` executable for notebooks.
    #[arg(long, env = "CONVERTKIT_JUPYTER")]
    jupyter: Option<PathBuf>,

    /// Directory of (or path to) the pdfium shared library.
    #[arg(long, env = "CONVERTKIT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Never download pdfium; fail PDF routes if it is not installed.
    #[arg(long, env = "CONVERTKIT_NO_PDFIUM_DOWNLOAD")]
    no_pdfium_download: bool,

    /// Where a downloaded pdfium is cached.
    #[arg(long, env = "CONVERTKIT_PDFIUM_CACHE_DIR")]
    pdfium_cache_dir: Option<PathBuf>,

    /// Parent directory for temporary files handed to external tools.
    #[arg(long, env = "CONVERTKIT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONVERTKIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONVERTKIT_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "CONVERTKIT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageFormatArg {
    Jpg,
    Png,
}

impl From<PageFormatArg> for PageImageFormat {
    fn from(v: PageFormatArg) -> Self {
        match v {
            PageFormatArg::Jpg => PageImageFormat::Jpg,
            PageFormatArg::Png => PageImageFormat::Png,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    #[value(name = "webpdf")]
    WebPdf,
    Latex,
}

impl From<EngineArg> for NotebookEngine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::WebPdf => NotebookEngine::WebPdf,
            EngineArg::Latex => NotebookEngine::Latex,
        }
    }
}

#[derive(Serialize)]
struct RouteEntry {
    source: FileKind,
    target: FileKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would fight with the spinner; keep them
    // quiet unless asked.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_routes;
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

    // ── Route listing ────────────────────────────────────────────────────
    if cli.list_routes {
        if cli.json {
            let entries: Vec<RouteEntry> = routes().map(|(source, target)| RouteEntry { source, target }).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("Failed to serialise routes")?
            );
        } else {
            print_routes();
        }
        return Ok(());
    }

    // ── Resolve input ────────────────────────────────────────────────────
    let (Some(input), Some(target)) = (cli.input.as_deref(), cli.to) else {
        bail!("an input file and --to are required (see --help)");
    };
    let source = match cli.from.or_else(|| FileKind::from_path(input)) {
        Some(kind) => kind,
        None => bail!(
            "Cannot tell the kind of '{}' from its extension; pass --from <kind>",
            input.display()
        ),
    };
    if !convertkit::is_supported(source, target) {
        let available = targets_for(source);
        if available.is_empty() {
            bail!("{source} files cannot be converted to anything (see --list-routes)");
        }
        bail!(
            "{source} → {target} is not supported. {source} converts to: {}",
            available.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
    }

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let request = ConversionRequest::new(bytes, source, target).with_file_name(file_name);

    let output_dir = match cli.output_dir {
        Some(ref dir) => dir.clone(),
        None => default_output_dir(input),
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let saved = convert_to_dir(request, &output_dir, &config)
        .await
        .with_context(|| format!("{} → {} failed", source, target))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&saved).context("Failed to serialise manifest")?
        );
    } else if !cli.quiet {
        print_summary(&saved);
    }

    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .page_dpi(cli.dpi)
        .page_image_format(cli.page_format.into())
        .jpeg_quality(cli.jpeg_quality)
        .notebook_engine(cli.notebook_engine.into())
        .pdfium_download(!cli.no_pdfium_download);

    if let Some(pt) = cli.font_size {
        builder = builder.font_size(pt);
    }
    if let Some(pt) = cli.line_height {
        builder = builder.line_height(pt);
    }
    if let Some(ref path) = cli.browser {
        builder = builder.browser_path(path);
    }
    if let Some(ref path) = cli.jupyter {
        builder = builder.jupyter_path(path);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref dir) = cli.pdfium_cache_dir {
        builder = builder.pdfium_cache_dir(dir);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn default_output_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_routes() {
    let mut current: Option<FileKind> = None;
    for (source, target) in routes() {
        if current != Some(source) {
            if current.is_some() {
                println!();
            }
            print!("{:<10} →  {}", bold(&source.to_string()), target);
            current = Some(source);
        } else {
            print!(", {target}");
        }
    }
    println!();
}

fn print_summary(saved: &SavedOutput) {
    for file in &saved.files {
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(&file.path.display().to_string()),
            dim(&human_bytes(file.bytes))
        );
    }
    let stats = &saved.stats;
    eprintln!(
        "   {} → {}  {}  {}ms",
        cyan(&stats.source_kind.to_string()),
        cyan(&stats.target_kind.to_string()),
        dim(&format!("{} in / {} out", human_bytes(stats.input_bytes), human_bytes(stats.output_bytes))),
        stats.duration_ms
    );
    if saved.files.is_empty() {
        eprintln!("{} nothing was written", red("✘"));
    }
}

fn human_bytes(n: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
