//! Path mapping: where each HTML file's PDF goes, and which URL serves it.
//!
//! Mapping works on path components rather than on strings, so a file or
//! directory merely *containing* `notes` (e.g. `footnotes/`, `notes.html`)
//! is left alone. Rules, in order:
//!
//! 1. only files with the source extension are mapped;
//! 2. the input root is swapped for the output root;
//! 3. directory components equal to a flatten segment are dropped;
//! 4. the source extension is replaced by the destination extension.

use crate::config::ExportConfig;
use crate::error::ExportError;
use reqwest::Url;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// Pure source → destination mapping derived from an [`ExportConfig`].
#[derive(Debug, Clone)]
pub struct PathMapper {
    input_root: PathBuf,
    output_root: PathBuf,
    source_extension: OsString,
    dest_extension: OsString,
    flatten: Vec<OsString>,
}

impl PathMapper {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            input_root: config.input_root.clone(),
            output_root: config.output_root.clone(),
            source_extension: OsString::from(&config.source_extension),
            dest_extension: OsString::from(&config.dest_extension),
            flatten: config.flatten_segments.iter().map(OsString::from).collect(),
        }
    }

    /// Whether `path` carries the source extension and should be converted.
    pub fn is_source(&self, path: &Path) -> bool {
        path.extension() == Some(self.source_extension.as_os_str())
    }

    /// Destination of `source`, or `None` if it is not a source file.
    ///
    /// A path outside the input root keeps only its normal components, so the
    /// result always lands under the output root.
    pub fn destination(&self, source: &Path) -> Option<PathBuf> {
        if !self.is_source(source) {
            return None;
        }

        let parts = self.relative_components(source);
        let (file_name, dirs) = parts.split_last()?;

        let mut dest = self.output_root.clone();
        for dir in dirs {
            if !self.flatten.iter().any(|f| f.as_os_str() == *dir) {
                dest.push(dir);
            }
        }
        dest.push(file_name);
        dest.set_extension(&self.dest_extension);
        Some(dest)
    }

    /// URL path segments of `source` relative to the input root.
    pub fn relative_url_path(&self, source: &Path) -> Vec<String> {
        self.relative_components(source)
            .into_iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect()
    }

    /// Navigable URL for `source`: `base` with the relative path appended.
    ///
    /// Each segment is percent-encoded on its own, so names with spaces,
    /// `#` or `?` survive the trip through the HTTP server.
    pub fn source_url(&self, base: &Url, source: &Path) -> Result<Url, ExportError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ExportError::InvalidBaseUrl {
                url: base.to_string(),
                detail: "URL cannot be used as a base".into(),
            })?
            .pop_if_empty()
            .extend(self.relative_url_path(source));
        Ok(url)
    }

    fn relative_components<'a>(&self, path: &'a Path) -> Vec<&'a OsStr> {
        let relative = path.strip_prefix(&self.input_root).unwrap_or(path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}
