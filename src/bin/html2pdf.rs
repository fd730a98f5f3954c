//! CLI binary for edgequake-html2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_html2pdf::config::{DEFAULT_BASE_URL, DEFAULT_INPUT_ROOT};
use edgequake_html2pdf::{
    export_tree, parse_length, probe_base_url, ExportConfig, ExportProgressCallback,
    FailurePolicy, Margins, PdfOptions, ProgressCallback, RunStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Seconds the `--check-server` probe waits for an answer.
const PROBE_TIMEOUT_SECS: u64 = 5;

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

/// Terminal progress callback: a spinner with a running file count plus one
/// log line per file. The walk is lazy, so there is no total to show a bar for.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos} PDFs  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.set_message("Launching Chrome…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut times| times.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, input_root: &Path, output_root: &Path) {
        self.bar.set_prefix("Exporting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Exporting {} → {}",
                input_root.display(),
                output_root.display()
            ))
        ));
    }

    fn on_file_start(&self, index: usize, source: &Path) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(source.display().to_string());
    }

    fn on_file_complete(&self, index: usize, source: &Path, destination: &Path, bytes: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {}  →  {}  {}  {}",
            green("✓"),
            source.display(),
            destination.display(),
            dim(&format!("{:>7} KiB", bytes / 1024)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, source: &Path, error: &str) {
        let secs = self.elapsed_secs(index);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            source.display(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_export_complete(&self, converted: usize, failed: usize) {
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} PDFs written",
                green("✔"),
                bold(&converted.to_string())
            );
        } else {
            eprintln!(
                "{} {} PDFs written  ({} failed)",
                if converted == 0 { red("✘") } else { cyan("⚠") },
                bold(&converted.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the rendered site, then export it (../out → ../out/pdf)
  (cd ../out && python3 -m http.server 8000) &
  html2pdf

  # Another tree and server
  html2pdf site/out --base-url http://localhost:9000/ -o site/print

  # Print margins and backgrounds
  html2pdf --margin-top 1cm --margin-bottom 1cm --background

  # Keep going past pages that fail to load, and report them as JSON
  html2pdf --keep-going --json > report.json

  # Inside a container
  html2pdf --no-sandbox --chrome /usr/bin/chromium

PATH MAPPING:
  <input>/index.html              →  <output>/index.pdf
  <input>/notes/a.html            →  <output>/a.pdf
  <input>/notes/sub/b.html        →  <output>/sub/b.pdf
  <input>/readme.txt              →  (skipped)

LENGTHS:
  Margins and paper sizes accept in, cm, mm or px (96 px per inch).
  A bare number is inches.

ENVIRONMENT VARIABLES:
  Every flag can also be set as HTML2PDF_<FLAG>, e.g. HTML2PDF_BASE_URL.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=edgequake_html2pdf=debug).
"#;

/// Export a tree of HTML pages to PDFs with headless Chrome.
#[derive(Parser, Debug)]
#[command(
    name = "html2pdf",
    version,
    about = "Export a tree of HTML pages to a mirrored tree of PDFs with headless Chrome",
    long_about = "Walk a rendered HTML tree, load every page from the HTTP server that serves \
it, wait for the network to go idle, and print it to PDF under a mirrored output tree. \
`notes` directories are flattened away in the output.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Root of the rendered HTML tree.
    #[arg(env = "HTML2PDF_INPUT", default_value = DEFAULT_INPUT_ROOT)]
    input: PathBuf,

    /// Root of the PDF tree. Default: <INPUT>/pdf.
    #[arg(short, long, env = "HTML2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// URL at which an HTTP server serves INPUT.
    #[arg(long, env = "HTML2PDF_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Extension of files to convert.
    #[arg(long, env = "HTML2PDF_SOURCE_EXT", default_value = "html")]
    source_ext: String,

    /// Extension given to produced files.
    #[arg(long, env = "HTML2PDF_DEST_EXT", default_value = "pdf")]
    dest_ext: String,

    /// Directory names dropped from output paths (repeatable or comma-separated).
    #[arg(long = "flatten", env = "HTML2PDF_FLATTEN", value_delimiter = ',', default_value = "notes")]
    flatten: Vec<String>,

    /// Keep every directory level in the output tree.
    #[arg(long, env = "HTML2PDF_NO_FLATTEN")]
    no_flatten: bool,

    /// Top margin (e.g. 1cm, 0.5in, 10mm).
    #[arg(long, env = "HTML2PDF_MARGIN_TOP", value_parser = length_arg)]
    margin_top: Option<f64>,

    /// Bottom margin.
    #[arg(long, env = "HTML2PDF_MARGIN_BOTTOM", value_parser = length_arg)]
    margin_bottom: Option<f64>,

    /// Left margin.
    #[arg(long, env = "HTML2PDF_MARGIN_LEFT", value_parser = length_arg)]
    margin_left: Option<f64>,

    /// Right margin.
    #[arg(long, env = "HTML2PDF_MARGIN_RIGHT", value_parser = length_arg)]
    margin_right: Option<f64>,

    /// Paper width. Default: Letter.
    #[arg(long, env = "HTML2PDF_PAPER_WIDTH", value_parser = length_arg)]
    paper_width: Option<f64>,

    /// Paper height. Default: Letter.
    #[arg(long, env = "HTML2PDF_PAPER_HEIGHT", value_parser = length_arg)]
    paper_height: Option<f64>,

    /// Rendering scale (0.1–2.0).
    #[arg(long, env = "HTML2PDF_SCALE")]
    scale: Option<f64>,

    /// Print CSS backgrounds.
    #[arg(long, env = "HTML2PDF_BACKGROUND")]
    background: bool,

    /// Landscape orientation.
    #[arg(long, env = "HTML2PDF_LANDSCAPE")]
    landscape: bool,

    /// Let @page CSS rules choose the paper size.
    #[arg(long, env = "HTML2PDF_CSS_PAGE_SIZE")]
    css_page_size: bool,

    /// Seconds to wait for each page to load and go network-idle.
    #[arg(long, env = "HTML2PDF_TIMEOUT", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Chrome/Chromium binary. Default: search the usual locations.
    #[arg(long, env = "HTML2PDF_CHROME")]
    chrome: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long, env = "HTML2PDF_HEADFUL")]
    headful: bool,

    /// Disable Chrome's sandbox (needed in many containers).
    #[arg(long, env = "HTML2PDF_NO_SANDBOX")]
    no_sandbox: bool,

    /// Record failing pages and continue instead of stopping at the first one.
    #[arg(long, env = "HTML2PDF_KEEP_GOING")]
    keep_going: bool,

    /// Check that BASE_URL answers before launching Chrome.
    #[arg(long, env = "HTML2PDF_CHECK_SERVER")]
    check_server: bool,

    /// Print a JSON run summary on stdout.
    #[arg(long, env = "HTML2PDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "HTML2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML2PDF_QUIET")]
    quiet: bool,
}

fn length_arg(s: &str) -> Result<f64, String> {
    parse_length(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner prints one line per file; INFO logs would duplicate them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Optional preflight ───────────────────────────────────────────────
    if cli.check_server {
        probe_base_url(&config.base_url, PROBE_TIMEOUT_SECS)
            .await
            .context("Server check failed")?;
    }

    // ── Run export ───────────────────────────────────────────────────────
    let stats = export_tree(&config).await.context("Export failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        print_summary(&stats);
    }

    if stats.failed > 0 {
        anyhow::bail!("{} of {} HTML files failed", stats.failed, stats.html_files);
    }
    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let pdf = PdfOptions {
        margins: Margins {
            top: cli.margin_top,
            bottom: cli.margin_bottom,
            left: cli.margin_left,
            right: cli.margin_right,
        },
        print_background: cli.background,
        landscape: cli.landscape,
        paper_width: cli.paper_width,
        paper_height: cli.paper_height,
        scale: cli.scale,
        prefer_css_page_size: cli.css_page_size,
    };

    let flatten: Vec<String> = if cli.no_flatten {
        Vec::new()
    } else {
        cli.flatten
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    let mut builder = ExportConfig::builder()
        .input_root(&cli.input)
        .base_url(&cli.base_url)
        .source_extension(&cli.source_ext)
        .dest_extension(&cli.dest_ext)
        .flatten_segments(flatten)
        .pdf(pdf)
        .navigation_timeout_secs(cli.timeout)
        .headless(!cli.headful)
        .sandbox(!cli.no_sandbox)
        .on_error(if cli.keep_going {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        });

    if let Some(ref output) = cli.output {
        builder = builder.output_root(output);
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(stats: &RunStats) {
    eprintln!(
        "{}  {}/{} HTML files  {} skipped  {}ms",
        if stats.failed == 0 { green("✔") } else { cyan("⚠") },
        stats.converted,
        stats.html_files,
        stats.skipped_files,
        stats.total_duration_ms,
    );
    for failure in &stats.failures {
        eprintln!("   {} {}: {}", red("✗"), failure.source.display(), failure.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["html2pdf"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        let defaults = ExportConfig::default();
        assert_eq!(config.input_root, defaults.input_root);
        assert_eq!(config.output_root, defaults.output_root);
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.flatten_segments, defaults.flatten_segments);
        assert_eq!(config.on_error, FailurePolicy::Abort);
    }

    #[test]
    fn flags_reach_config() {
        let cli = Cli::try_parse_from([
            "html2pdf",
            "site",
            "--margin-top",
            "2.54cm",
            "--margin-bottom",
            "0.5",
            "--no-flatten",
            "--keep-going",
            "--no-sandbox",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_root, PathBuf::from("site/pdf"));
        assert!((config.pdf.margins.top.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(config.pdf.margins.bottom, Some(0.5));
        assert!(config.flatten_segments.is_empty());
        assert_eq!(config.on_error, FailurePolicy::Continue);
        assert!(!config.sandbox);
    }

    #[test]
    fn bad_length_is_rejected() {
        assert!(Cli::try_parse_from(["html2pdf", "--margin-top", "wide"]).is_err());
    }
}
