//! # edgequake-html2pdf
//!
//! Export a tree of rendered HTML pages to a mirrored tree of PDFs by
//! printing each page in headless Chrome.
//!
//! The HTML tree is expected to be served by an HTTP server already running
//! at a known base URL (for relative links, stylesheets and scripts to
//! resolve the way they do in a normal browser). Each page is loaded, given
//! time to finish client-side rendering, and printed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ../out (HTML tree)
//!  │
//!  ├─ 1. Walk    lazy depth-first enumeration of every file
//!  ├─ 2. Map     ../out/notes/a/b.html → ../out/pdf/a/b.pdf + URL
//!  ├─ 3. Render  one Chrome tab: navigate, wait for network idle, print
//!  └─ 4. Write   create directories, temp file + rename
//! ```
//!
//! Files are converted strictly one at a time through a single tab.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_html2pdf::{export_tree, ExportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Expects `python3 -m http.server 8000` (or similar) serving ../out
//!     let config = ExportConfig::default();
//!     let stats = export_tree(&config).await?;
//!     eprintln!("{} PDFs written", stats.converted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-html2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    parse_length, ExportConfig, ExportConfigBuilder, FailurePolicy, Margins, PdfOptions,
};
pub use error::{ExportError, FileError};
pub use export::{export_file, export_tree, export_tree_sync, export_tree_with, probe_base_url};
pub use output::{ConvertedFile, FileFailure, RunStats};
pub use pipeline::mapper::PathMapper;
pub use pipeline::render::{ChromeSession, RenderSession};
pub use pipeline::walk::TreeWalker;
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};

/// URL type taken by [`RenderSession::open`].
pub use reqwest::Url;
