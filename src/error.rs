//! Error types for the edgequake-html2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`] — **Fatal**: the run cannot proceed at all (input root
//!   missing, Chrome failed to launch, invalid configuration). Returned as
//!   `Err(ExportError)` from the top-level `export_*` functions.
//!
//! * [`FileError`] — **Per file**: a single HTML file failed to navigate,
//!   print or write. Under [`crate::config::FailurePolicy::Abort`] it is
//!   wrapped in [`ExportError::File`] and stops the run; under
//!   [`crate::config::FailurePolicy::Continue`] it is recorded in
//!   [`crate::output::RunStats::failures`] and the walk moves on.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-html2pdf library.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Traversal errors ──────────────────────────────────────────────────
    /// The input root does not exist.
    #[error("Input directory not found: '{path}'\nCheck the path exists and has been rendered.")]
    RootNotFound { path: PathBuf },

    /// The input root exists but is a file, not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// A directory below the root could not be read.
    #[error("Failed to read directory '{path}': {source}")]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output root could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Browser errors ────────────────────────────────────────────────────
    /// Chrome could not be found or started.
    #[error(
        "Failed to launch headless Chrome: {0}\n\n\
Install Chrome or Chromium, or point --chrome / HTML2PDF_CHROME at the binary.\n\
Inside containers you may also need --no-sandbox.\n"
    )]
    BrowserLaunchFailed(String),

    // ── Network errors ────────────────────────────────────────────────────
    /// The base URL pages are served from is not a usable base.
    #[error("Invalid base URL '{url}': {detail}")]
    InvalidBaseUrl { url: String, detail: String },

    /// Preflight probe could not reach the server behind the base URL.
    #[error("Nothing is serving '{url}': {reason}\nStart the HTTP server for the input tree first.")]
    ServerUnreachable { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Per-file errors promoted to fatal ─────────────────────────────────
    /// A file failed and the failure policy is to abort.
    #[error(transparent)]
    File(#[from] FileError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// An error converting one HTML file.
///
/// Cloneable and serialisable so it can be stored in
/// [`crate::output::FileFailure`] and emitted in the CLI's JSON summary.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The browser could not load the page.
    #[error("Navigation to '{url}' failed: {detail}")]
    Navigation { url: String, detail: String },

    /// The page never reached network idle.
    #[error("Navigation to '{url}' did not reach network idle within {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// Printing the loaded page to PDF failed.
    #[error("Printing '{url}' to PDF failed: {detail}")]
    Capture { url: String, detail: String },

    /// The destination directory or file could not be written.
    #[error("Failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_not_found_display() {
        let e = ExportError::RootNotFound {
            path: PathBuf::from("../out"),
        };
        assert!(e.to_string().contains("../out"), "got: {e}");
    }

    #[test]
    fn file_error_is_transparent_when_fatal() {
        let inner = FileError::NavigationTimeout {
            url: "http://localhost:8000/index.html".into(),
            secs: 30,
        };
        let e: ExportError = inner.clone().into();
        assert_eq!(e.to_string(), inner.to_string());
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn write_error_display() {
        let e = FileError::Write {
            path: PathBuf::from("../out/pdf/a.pdf"),
            detail: "read-only file system".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.pdf"));
        assert!(msg.contains("read-only"));
    }

    #[test]
    fn file_error_serialises() {
        let e = FileError::Capture {
            url: "http://localhost:8000/a.html".into(),
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("Capture"));
        assert!(json.contains("boom"));
    }
}
