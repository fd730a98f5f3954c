//! Progress-callback trait for per-file export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the driver works through the tree.
//!
//! The walk is lazy, so the total number of files is only known once the
//! run finishes; events therefore carry a running index rather than a total.
//!
//! # Example
//!
//! ```rust
//! use edgequake_html2pdf::{ExportConfig, ExportProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, _index: usize, source: &Path, destination: &Path, bytes: usize) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} → {} ({} bytes)", source.display(), destination.display(), bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the export driver as it processes each HTML file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Files are processed one at a time, but the trait
/// is `Send + Sync` so implementations can be shared with other tasks.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once after the browser is up, before the first file.
    fn on_export_start(&self, input_root: &Path, output_root: &Path) {
        let _ = (input_root, output_root);
    }

    /// Called before navigating to a file.
    ///
    /// # Arguments
    /// * `index`  — 1-based position among the HTML files seen so far
    /// * `source` — path of the HTML file
    fn on_file_start(&self, index: usize, source: &Path) {
        let _ = (index, source);
    }

    /// Called after a PDF has been written.
    fn on_file_complete(&self, index: usize, source: &Path, destination: &Path, bytes: usize) {
        let _ = (index, source, destination, bytes);
    }

    /// Called when a file fails to navigate, print or write.
    fn on_file_error(&self, index: usize, source: &Path, error: &str) {
        let _ = (index, source, error);
    }

    /// Called once after the walk, whether or not every file succeeded.
    ///
    /// # Arguments
    /// * `converted` — PDFs written
    /// * `failed`    — files that errored
    fn on_export_complete(&self, converted: usize, failed: usize) {
        let _ = (converted, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
