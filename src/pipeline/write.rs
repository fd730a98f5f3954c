//! Output: create destination directories and write PDFs atomically.
//!
//! Each PDF is staged in a uniquely named temp file next to its destination
//! and persisted over it, so a failure mid-write never leaves a truncated PDF
//! behind and never touches other files in the directory.

use crate::error::FileError;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Create the parent directory of `dest` (and its ancestors).
///
/// Idempotent: an existing directory is left untouched.
pub async fn ensure_parent_dir(dest: &Path) -> Result<(), FileError> {
    let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| FileError::Write {
            path: parent.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Write `bytes` to `dest` through a [`tempfile::NamedTempFile`] in the same
/// directory, then persist it over `dest`.
///
/// The temp file is removed when staging or persisting fails.
pub async fn write_pdf(dest: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let target = dest.to_path_buf();
    let data = bytes.to_vec();

    tokio::task::spawn_blocking(move || stage_and_persist(&target, &data))
        .await
        .map_err(|e| FileError::Write {
            path: dest.to_path_buf(),
            detail: format!("write task panicked: {}", e),
        })?
        .map_err(|e| FileError::Write {
            path: dest.to_path_buf(),
            detail: e.to_string(),
        })?;

    debug!("Wrote {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}

fn stage_and_persist(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(&temp_prefix(dest))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Hidden prefix naming the destination, e.g. `.a.pdf.` for `a.pdf`.
fn temp_prefix(dest: &Path) -> OsString {
    let mut prefix = OsString::from(".");
    if let Some(name) = dest.file_name() {
        prefix.push(name);
    }
    prefix.push(".");
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn ensure_parent_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("pdf/sub/b.pdf");

        tokio_test::assert_ok!(ensure_parent_dir(&dest).await);
        fs::write(tmp.path().join("pdf/sub/keep.pdf"), b"%PDF-keep").unwrap();
        tokio_test::assert_ok!(ensure_parent_dir(&dest).await);

        assert!(tmp.path().join("pdf/sub").is_dir());
        assert_eq!(fs::read(tmp.path().join("pdf/sub/keep.pdf")).unwrap(), b"%PDF-keep");
    }

    #[tokio::test]
    async fn bare_file_name_needs_no_dir() {
        tokio_test::assert_ok!(ensure_parent_dir(Path::new("a.pdf")).await);
    }

    #[tokio::test]
    async fn ensure_parent_dir_reports_blocked_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("pdf"), b"not a dir").unwrap();

        let err = ensure_parent_dir(&tmp.path().join("pdf/a.pdf")).await.unwrap_err();
        assert!(matches!(err, FileError::Write { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn write_replaces_and_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("a.pdf");

        write_pdf(&dest, b"%PDF-1").await.unwrap();
        write_pdf(&dest, b"%PDF-2").await.unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"%PDF-2");
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.pdf")]);
    }

    #[tokio::test]
    async fn write_into_missing_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("missing/a.pdf");

        let err = write_pdf(&dest, b"%PDF").await.unwrap_err();
        assert!(matches!(err, FileError::Write { ref path, .. } if path == &dest));
    }

    #[tokio::test]
    async fn write_leaves_lookalike_neighbours_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("a.pdf");
        fs::write(tmp.path().join("a.pdf.tmp"), b"user data").unwrap();

        tokio_test::assert_ok!(write_pdf(&dest, b"%PDF-1").await);

        assert_eq!(fs::read(&dest).unwrap(), b"%PDF-1");
        assert_eq!(fs::read(tmp.path().join("a.pdf.tmp")).unwrap(), b"user data");
    }

    #[tokio::test]
    async fn write_is_not_blocked_by_lookalike_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("b.pdf");
        fs::create_dir(tmp.path().join("b.pdf.tmp")).unwrap();

        tokio_test::assert_ok!(write_pdf(&dest, b"%PDF-1").await);

        assert_eq!(fs::read(&dest).unwrap(), b"%PDF-1");
        assert!(tmp.path().join("b.pdf.tmp").is_dir());
    }

    #[test]
    fn temp_prefix_names_destination() {
        assert_eq!(temp_prefix(Path::new("out/pdf/a.pdf")), OsString::from(".a.pdf."));
    }
}
