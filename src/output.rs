//! Result types returned by an export run.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One HTML file successfully exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// URL the browser was pointed at.
    pub url: String,
    /// Size of the written PDF.
    pub bytes: usize,
    pub duration_ms: u64,
}

/// One HTML file that failed under [`crate::config::FailurePolicy::Continue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub source: PathBuf,
    pub error: FileError,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Files carrying the source extension.
    pub html_files: usize,
    /// PDFs written.
    pub converted: usize,
    /// Files that failed (only non-zero under `FailurePolicy::Continue`).
    pub failed: usize,
    /// Files without the source extension.
    pub skipped_files: usize,
    pub total_duration_ms: u64,
    pub failures: Vec<FileFailure>,
}

impl RunStats {
    /// True when every HTML file produced a PDF.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.converted == self.html_files
    }
}
