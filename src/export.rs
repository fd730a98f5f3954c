//! Export driver: walk the input tree and turn every HTML file into a PDF.
//!
//! One run owns one [`RenderSession`] and converts exactly one file at a
//! time. The session is closed after the walk whether the walk finished or
//! stopped on an error; dropping a [`ChromeSession`] also kills Chrome, so
//! the browser never outlives a panic either.

use crate::config::{ExportConfig, FailurePolicy};
use crate::error::{ExportError, FileError};
use crate::output::{ConvertedFile, FileFailure, RunStats};
use crate::pipeline::mapper::PathMapper;
use crate::pipeline::render::{ChromeSession, RenderSession};
use crate::pipeline::walk::TreeWalker;
use crate::pipeline::write;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Export every HTML file under `config.input_root` with headless Chrome.
///
/// The input root is validated before Chrome is launched, so a missing tree
/// fails fast without starting a browser.
///
/// # Errors
/// - traversal errors (root missing, unreadable directory) — always fatal
/// - [`ExportError::BrowserLaunchFailed`] if Chrome cannot be started
/// - [`ExportError::File`] for the first failing file under
///   [`FailurePolicy::Abort`]
pub async fn export_tree(config: &ExportConfig) -> Result<RunStats, ExportError> {
    let walker = open_walker(config).await?;
    let session = ChromeSession::launch(config).await?;
    run(walker, session, config).await
}

/// Export with a caller-supplied render session.
///
/// Takes ownership of `session` and closes it before returning.
pub async fn export_tree_with<R: RenderSession>(
    mut session: R,
    config: &ExportConfig,
) -> Result<RunStats, ExportError> {
    match open_walker(config).await {
        Ok(walker) => run(walker, session, config).await,
        Err(e) => {
            if let Err(close_err) = session.close().await {
                warn!("Closing render session failed: {}", close_err);
            }
            Err(e)
        }
    }
}

/// Synchronous wrapper around [`export_tree`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_tree_sync(config: &ExportConfig) -> Result<RunStats, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_tree(config))
}

/// Convert a single file.
///
/// Returns `Ok(None)` without touching the filesystem or the browser when
/// `source` does not carry the source extension.
pub async fn export_file<R: RenderSession + ?Sized>(
    session: &mut R,
    mapper: &PathMapper,
    base_url: &Url,
    source: &Path,
    config: &ExportConfig,
) -> Result<Option<ConvertedFile>, FileError> {
    let Some(destination) = mapper.destination(source) else {
        return Ok(None);
    };
    convert_to(session, mapper, base_url, source, destination, config)
        .await
        .map(Some)
}

/// Check that something answers HTTP at `base_url`.
///
/// Any response, including 404, counts as reachable.
pub async fn probe_base_url(base_url: &str, timeout_secs: u64) -> Result<(), ExportError> {
    let unreachable = |reason: String| ExportError::ServerUnreachable {
        url: base_url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| unreachable(e.to_string()))?;

    match client.get(base_url).send().await {
        Ok(response) => {
            debug!("{} answered HTTP {}", base_url, response.status());
            Ok(())
        }
        Err(e) if e.is_timeout() => Err(unreachable(format!("timed out after {}s", timeout_secs))),
        Err(e) => Err(unreachable(e.to_string())),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Validate the input root and prepare the output root.
///
/// The walker is opened first so a missing input root is never created as a
/// side effect of creating an output root nested inside it. Nesting is
/// checked on canonical paths, so `./out` and `out/pdf` are recognised.
async fn open_walker(config: &ExportConfig) -> Result<TreeWalker, ExportError> {
    config.parsed_base_url()?;

    let mut walker = TreeWalker::open(&config.input_root).await?;

    tokio::fs::create_dir_all(&config.output_root)
        .await
        .map_err(|source| ExportError::OutputDirFailed {
            path: config.output_root.clone(),
            source,
        })?;

    if let Some(nested) = nested_output_dir(&config.input_root, &config.output_root).await? {
        debug!("Not walking output tree {}", nested.display());
        walker.skip_dir(nested);
    }

    Ok(walker)
}

/// The output root as the walker will meet it, if it lies strictly inside
/// the input root.
async fn nested_output_dir(input_root: &Path, output_root: &Path) -> Result<Option<PathBuf>, ExportError> {
    let input = tokio::fs::canonicalize(input_root)
        .await
        .map_err(|source| ExportError::WalkFailed {
            path: input_root.to_path_buf(),
            source,
        })?;
    let output = tokio::fs::canonicalize(output_root)
        .await
        .map_err(|source| ExportError::OutputDirFailed {
            path: output_root.to_path_buf(),
            source,
        })?;

    match output.strip_prefix(&input) {
        Ok(rel) if !rel.as_os_str().is_empty() => Ok(Some(input_root.join(rel))),
        _ => Ok(None),
    }
}

/// Render `source` and write it to an already mapped `destination`.
async fn convert_to<R: RenderSession + ?Sized>(
    session: &mut R,
    mapper: &PathMapper,
    base_url: &Url,
    source: &Path,
    destination: PathBuf,
    config: &ExportConfig,
) -> Result<ConvertedFile, FileError> {
    let start = Instant::now();

    write::ensure_parent_dir(&destination).await?;

    let url = mapper
        .source_url(base_url, source)
        .map_err(|e| FileError::Navigation {
            url: base_url.to_string(),
            detail: e.to_string(),
        })?;

    session.open(&url).await?;
    let bytes = session.capture_pdf(&config.pdf).await?;
    write::write_pdf(&destination, &bytes).await?;

    Ok(ConvertedFile {
        source: source.to_path_buf(),
        destination,
        url: url.to_string(),
        bytes: bytes.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Drive the walk, then close the session regardless of the outcome.
async fn run<R: RenderSession>(
    walker: TreeWalker,
    mut session: R,
    config: &ExportConfig,
) -> Result<RunStats, ExportError> {
    let result = drive(walker, &mut session, config).await;
    let closed = session.close().await;

    let stats = result?;
    closed?;
    Ok(stats)
}

async fn drive<R: RenderSession>(
    mut walker: TreeWalker,
    session: &mut R,
    config: &ExportConfig,
) -> Result<RunStats, ExportError> {
    let start = Instant::now();
    let mapper = PathMapper::new(config);
    let base_url = config.parsed_base_url()?;
    let mut stats = RunStats::default();

    info!(
        "Exporting {} → {} (served at {})",
        config.input_root.display(),
        config.output_root.display(),
        base_url
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(&config.input_root, &config.output_root);
    }

    let result = convert_all(&mut walker, session, &mapper, &base_url, config, &mut stats).await;
    stats.total_duration_ms = start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(stats.converted, stats.failed);
    }

    result?;
    info!(
        "Export complete: {}/{} HTML files, {} other files skipped, {}ms",
        stats.converted, stats.html_files, stats.skipped_files, stats.total_duration_ms
    );
    Ok(stats)
}

async fn convert_all<R: RenderSession>(
    walker: &mut TreeWalker,
    session: &mut R,
    mapper: &PathMapper,
    base_url: &Url,
    config: &ExportConfig,
    stats: &mut RunStats,
) -> Result<(), ExportError> {
    while let Some(item) = walker.next_file().await {
        let source = item?;
        let Some(destination) = mapper.destination(&source) else {
            debug!("Skipping {}", source.display());
            stats.skipped_files += 1;
            continue;
        };

        stats.html_files += 1;
        let index = stats.html_files;
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(index, &source);
        }

        match convert_to(session, mapper, base_url, &source, destination, config).await {
            Ok(converted) => {
                info!("{} → {}", source.display(), converted.destination.display());
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_complete(index, &source, &converted.destination, converted.bytes);
                }
                stats.converted += 1;
            }
            Err(error) => {
                stats.failed += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(index, &source, &error.to_string());
                }
                match config.on_error {
                    FailurePolicy::Abort => return Err(error.into()),
                    FailurePolicy::Continue => {
                        warn!("{}: {}", source.display(), error);
                        stats.failures.push(FileFailure { source, error });
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_accepts_any_http_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
            }
        });

        let url = format!("http://{}/", addr);
        tokio_test::assert_ok!(probe_base_url(&url, 5).await);
    }

    #[tokio::test]
    async fn nested_output_is_found_through_dot_dot() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("x")).unwrap();
        std::fs::create_dir_all(tmp.path().join("out/pdf")).unwrap();
        let input = tmp.path().join("x/../out");

        let nested = nested_output_dir(&input, &tmp.path().join("out/pdf")).await.unwrap();
        assert_eq!(nested, Some(input.join("pdf")));
    }

    #[tokio::test]
    async fn sibling_or_same_output_is_not_nested() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("out")).unwrap();
        std::fs::create_dir_all(tmp.path().join("print")).unwrap();
        let input = tmp.path().join("out");

        assert_eq!(nested_output_dir(&input, &tmp.path().join("print")).await.unwrap(), None);
        assert_eq!(nested_output_dir(&input, &input).await.unwrap(), None);
    }

    struct StubSession;

    #[async_trait::async_trait]
    impl RenderSession for StubSession {
        async fn open(&mut self, _url: &Url) -> Result<(), FileError> {
            Ok(())
        }

        async fn capture_pdf(&mut self, _options: &crate::config::PdfOptions) -> Result<Vec<u8>, FileError> {
            Ok(b"%PDF-stub".to_vec())
        }

        async fn close(&mut self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn export_file_maps_renders_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("out");
        let config = ExportConfig::builder().input_root(&root).build().unwrap();
        let mapper = PathMapper::new(&config);
        let base = config.parsed_base_url().unwrap();
        let mut session = StubSession;

        let skipped = export_file(&mut session, &mapper, &base, &root.join("notes/a.css"), &config)
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert!(!root.join("pdf").exists());

        let converted = export_file(&mut session, &mapper, &base, &root.join("notes/a.html"), &config)
            .await
            .unwrap()
            .expect("html is converted");
        assert_eq!(converted.destination, root.join("pdf/a.pdf"));
        assert_eq!(converted.url, "http://localhost:8000/notes/a.html");
        assert_eq!(std::fs::read(root.join("pdf/a.pdf")).unwrap(), b"%PDF-stub");
    }

    #[tokio::test]
    async fn probe_reports_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = probe_base_url(&format!("http://{}/", addr), 5).await.unwrap_err();
        assert!(matches!(err, ExportError::ServerUnreachable { .. }), "got {err:?}");
    }
}
