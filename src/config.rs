//! Configuration types for HTML-tree-to-PDF export.
//!
//! All run behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The roots, base URL and extensions that a one-off
//! script would hard-code live here as plain fields with the defaults the
//! site generator expects (`../out` served at `http://localhost:8000/`).

use crate::error::ExportError;
use crate::progress::ProgressCallback;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default directory the site generator renders into.
pub const DEFAULT_INPUT_ROOT: &str = "../out";

/// Name of the PDF tree created inside the input root.
pub const DEFAULT_OUTPUT_DIR: &str = "pdf";

/// Default address of the HTTP server serving the input root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Configuration for one export run.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_html2pdf::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .input_root("site/out")
///     .base_url("http://localhost:9000/")
///     .build()
///     .unwrap();
/// assert_eq!(config.output_root, std::path::PathBuf::from("site/out/pdf"));
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Root of the rendered HTML tree. Default: `../out`.
    pub input_root: PathBuf,

    /// Root of the PDF tree. Default: `<input_root>/pdf`.
    pub output_root: PathBuf,

    /// URL at which an external HTTP server serves `input_root`.
    /// Default: `http://localhost:8000/`.
    pub base_url: String,

    /// Extension (without dot) of files to convert. Default: `html`.
    pub source_extension: String,

    /// Extension (without dot) given to the produced files. Default: `pdf`.
    pub dest_extension: String,

    /// Directory names dropped from destination paths. Default: `["notes"]`.
    ///
    /// The notes site nests every page under `notes/<notebook>/`; the PDF
    /// tree is one level flatter.
    pub flatten_segments: Vec<String>,

    /// Print options passed to the browser for every page.
    pub pdf: PdfOptions,

    /// Upper bound on navigation plus network-idle wait, in seconds. Default: 30.
    pub navigation_timeout_secs: u64,

    /// Run Chrome without a window. Default: true.
    pub headless: bool,

    /// Keep Chrome's sandbox enabled. Default: true.
    pub sandbox: bool,

    /// Explicit Chrome/Chromium binary. If None, the usual install locations are searched.
    pub chrome_path: Option<PathBuf>,

    /// What to do when a single file fails. Default: [`FailurePolicy::Abort`].
    pub on_error: FailurePolicy,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let input_root = PathBuf::from(DEFAULT_INPUT_ROOT);
        Self {
            output_root: input_root.join(DEFAULT_OUTPUT_DIR),
            input_root,
            base_url: DEFAULT_BASE_URL.to_string(),
            source_extension: "html".to_string(),
            dest_extension: "pdf".to_string(),
            flatten_segments: vec!["notes".to_string()],
            pdf: PdfOptions::default(),
            navigation_timeout_secs: 30,
            headless: true,
            sandbox: true,
            chrome_path: None,
            on_error: FailurePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("input_root", &self.input_root)
            .field("output_root", &self.output_root)
            .field("base_url", &self.base_url)
            .field("source_extension", &self.source_extension)
            .field("dest_extension", &self.dest_extension)
            .field("flatten_segments", &self.flatten_segments)
            .field("pdf", &self.pdf)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("headless", &self.headless)
            .field("sandbox", &self.sandbox)
            .field("chrome_path", &self.chrome_path)
            .field("on_error", &self.on_error)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
            output_root_set: false,
        }
    }

    /// Parse [`Self::base_url`], rejecting URLs that cannot have paths appended.
    pub fn parsed_base_url(&self) -> Result<Url, ExportError> {
        let url = Url::parse(&self.base_url).map_err(|e| ExportError::InvalidBaseUrl {
            url: self.base_url.clone(),
            detail: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ExportError::InvalidBaseUrl {
                url: self.base_url.clone(),
                detail: "URL cannot be used as a base".into(),
            });
        }
        Ok(url)
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
    output_root_set: bool,
}

impl ExportConfigBuilder {
    pub fn input_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.input_root = root.into();
        self
    }

    /// Override the output root. When unset, it follows `input_root`.
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self.output_root_set = true;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn source_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.config.source_extension = ext.as_ref().trim_start_matches('.').to_string();
        self
    }

    pub fn dest_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.config.dest_extension = ext.as_ref().trim_start_matches('.').to_string();
        self
    }

    pub fn flatten_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.flatten_segments = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn pdf(mut self, options: PdfOptions) -> Self {
        self.config.pdf = options;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.headless = v;
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn on_error(mut self, policy: FailurePolicy) -> Self {
        self.config.on_error = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExportConfig, ExportError> {
        if !self.output_root_set {
            self.config.output_root = self.config.input_root.join(DEFAULT_OUTPUT_DIR);
        }

        let c = &self.config;
        if c.source_extension.is_empty() || c.dest_extension.is_empty() {
            return Err(ExportError::InvalidConfig(
                "Source and destination extensions must not be empty".into(),
            ));
        }
        if c.source_extension == c.dest_extension {
            return Err(ExportError::InvalidConfig(format!(
                "Source and destination extension are both '{}'",
                c.source_extension
            )));
        }
        if c.flatten_segments.iter().any(|s| s.is_empty() || s.contains('/')) {
            return Err(ExportError::InvalidConfig(
                "Flatten segments must be single, non-empty directory names".into(),
            ));
        }
        if c.navigation_timeout_secs == 0 {
            return Err(ExportError::InvalidConfig(
                "Navigation timeout must be ≥ 1s".into(),
            ));
        }
        c.parsed_base_url()?;
        c.pdf.validate()?;

        Ok(self.config)
    }
}

// ── Print options ────────────────────────────────────────────────────────

/// Page margins in inches. `None` leaves the browser's default (no margin).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl Margins {
    fn values(&self) -> [Option<f64>; 4] {
        [self.top, self.bottom, self.left, self.right]
    }
}

/// Options for printing a loaded page to PDF.
///
/// Lengths are in inches, as the DevTools protocol expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfOptions {
    pub margins: Margins,
    /// Print CSS backgrounds. Default: false.
    pub print_background: bool,
    /// Landscape orientation. Default: false.
    pub landscape: bool,
    /// Paper width in inches. If None, Letter.
    pub paper_width: Option<f64>,
    /// Paper height in inches. If None, Letter.
    pub paper_height: Option<f64>,
    /// Rendering scale, 0.1–2.0. If None, 1.0.
    pub scale: Option<f64>,
    /// Let `@page` CSS rules decide the paper size. Default: false.
    pub prefer_css_page_size: bool,
}

impl PdfOptions {
    fn validate(&self) -> Result<(), ExportError> {
        let lengths = self
            .margins
            .values()
            .into_iter()
            .chain([self.paper_width, self.paper_height])
            .flatten();
        for len in lengths {
            if !len.is_finite() || len < 0.0 {
                return Err(ExportError::InvalidConfig(format!(
                    "Page lengths must be finite and ≥ 0, got {len}"
                )));
            }
        }
        if let Some(scale) = self.scale {
            if !(0.1..=2.0).contains(&scale) {
                return Err(ExportError::InvalidConfig(format!(
                    "Scale must be 0.1–2.0, got {scale}"
                )));
            }
        }
        Ok(())
    }
}

/// Parse a CSS-style length (`1in`, `2.5cm`, `10mm`, `96px`) into inches.
///
/// A bare number is taken as inches.
pub fn parse_length(s: &str) -> Result<f64, ExportError> {
    let s = s.trim().to_lowercase();
    let (number, per_inch) = if let Some(n) = s.strip_suffix("in") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix("cm") {
        (n, 2.54)
    } else if let Some(n) = s.strip_suffix("mm") {
        (n, 25.4)
    } else if let Some(n) = s.strip_suffix("px") {
        (n, 96.0)
    } else {
        (s.as_str(), 1.0)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ExportError::InvalidConfig(format!("Invalid length '{s}'")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ExportError::InvalidConfig(format!(
            "Length must be finite and ≥ 0, got '{s}'"
        )));
    }
    Ok(value / per_inch)
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the driver does when one file fails to navigate, print or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop the run with the file's error. (default)
    #[default]
    Abort,
    /// Record the failure and carry on with the next file.
    Continue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_layout() {
        let c = ExportConfig::default();
        assert_eq!(c.input_root, PathBuf::from("../out"));
        assert_eq!(c.output_root, PathBuf::from("../out/pdf"));
        assert_eq!(c.base_url, "http://localhost:8000/");
        assert_eq!(c.flatten_segments, vec!["notes".to_string()]);
        assert_eq!(c.on_error, FailurePolicy::Abort);
        assert_eq!(c.pdf.margins, Margins::default());
    }

    #[test]
    fn output_root_follows_input_root() {
        let c = ExportConfig::builder().input_root("/srv/site").build().unwrap();
        assert_eq!(c.output_root, PathBuf::from("/srv/site/pdf"));

        let c = ExportConfig::builder()
            .output_root("/tmp/pdfs")
            .input_root("/srv/site")
            .build()
            .unwrap();
        assert_eq!(c.output_root, PathBuf::from("/tmp/pdfs"));
    }

    #[test]
    fn extensions_lose_leading_dot() {
        let c = ExportConfig::builder()
            .source_extension(".htm")
            .dest_extension(".pdf")
            .build()
            .unwrap();
        assert_eq!(c.source_extension, "htm");
        assert_eq!(c.dest_extension, "pdf");
    }

    #[test]
    fn rejects_same_extensions() {
        let err = ExportConfig::builder()
            .source_extension("pdf")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = ExportConfig::builder().base_url("localhost:8000").build();
        // "localhost:8000" parses as scheme "localhost" with an opaque path.
        assert!(matches!(err, Err(ExportError::InvalidBaseUrl { .. })));

        let err = ExportConfig::builder().base_url("not a url").build();
        assert!(matches!(err, Err(ExportError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn rejects_zero_timeout_and_negative_margin() {
        assert!(ExportConfig::builder().navigation_timeout_secs(0).build().is_err());

        let pdf = PdfOptions {
            margins: Margins {
                top: Some(-1.0),
                ..Margins::default()
            },
            ..PdfOptions::default()
        };
        assert!(ExportConfig::builder().pdf(pdf).build().is_err());
    }

    #[test]
    fn rejects_out_of_range_scale() {
        let pdf = PdfOptions {
            scale: Some(3.0),
            ..PdfOptions::default()
        };
        assert!(ExportConfig::builder().pdf(pdf).build().is_err());
    }

    #[test]
    fn parse_length_units() {
        assert_eq!(parse_length("1").unwrap(), 1.0);
        assert_eq!(parse_length("0.5in").unwrap(), 0.5);
        assert!((parse_length("2.54cm").unwrap() - 1.0).abs() < 1e-9);
        assert!((parse_length("25.4mm").unwrap() - 1.0).abs() < 1e-9);
        assert!((parse_length("48px").unwrap() - 0.5).abs() < 1e-9);
        assert!((parse_length(" 10 MM ").unwrap() - 10.0 / 25.4).abs() < 1e-9);
        assert!(parse_length("abc").is_err());
        assert!(parse_length("-1cm").is_err());
    }
}
