//! Tree walking: lazily enumerate every regular file under the input root.
//!
//! The walker keeps an explicit stack of open directory handles instead of
//! recursing, so deep trees cost one `ReadDir` per level and nothing on the
//! call stack. A subdirectory is pushed as soon as it is met and drained
//! before its parent continues, which makes the order depth-first. Order
//! among siblings is whatever the OS returns.
//!
//! Symlinks and special files are skipped, never followed.

use crate::error::ExportError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::ReadDir;
use tokio_stream::Stream;
use tracing::{debug, trace};

/// A lazy, finite, non-restartable sequence of file paths.
pub struct TreeWalker {
    stack: Vec<(PathBuf, ReadDir)>,
    skip: Vec<PathBuf>,
}

impl TreeWalker {
    /// Open the root directory.
    ///
    /// # Errors
    /// - [`ExportError::RootNotFound`] if `root` does not exist
    /// - [`ExportError::NotADirectory`] if `root` is not a directory
    /// - [`ExportError::WalkFailed`] if `root` cannot be read
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ExportError> {
        let root = root.as_ref().to_path_buf();

        let metadata = match tokio::fs::metadata(&root).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ExportError::RootNotFound { path: root });
            }
            Err(source) => return Err(ExportError::WalkFailed { path: root, source }),
        };
        if !metadata.is_dir() {
            return Err(ExportError::NotADirectory { path: root });
        }

        let handle = tokio::fs::read_dir(&root)
            .await
            .map_err(|source| ExportError::WalkFailed {
                path: root.clone(),
                source,
            })?;
        debug!("Walking {}", root.display());

        Ok(Self {
            stack: vec![(root, handle)],
            skip: Vec::new(),
        })
    }

    /// Never descend into `dir`. Matched against entry paths as the walker builds them.
    pub fn skip_dir(&mut self, dir: impl Into<PathBuf>) {
        self.skip.push(dir.into());
    }

    /// Advance to the next regular file.
    ///
    /// Returns `None` once the tree is exhausted. A directory that cannot be
    /// read yields one `Err` and is abandoned; the walk can still be resumed
    /// past it, though the driver treats it as fatal.
    pub async fn next_file(&mut self) -> Option<Result<PathBuf, ExportError>> {
        loop {
            let (dir, handle) = self.stack.last_mut()?;

            let entry = match handle.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.stack.pop();
                    continue;
                }
                Err(source) => {
                    let path = dir.clone();
                    self.stack.pop();
                    return Some(Err(ExportError::WalkFailed { path, source }));
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(source) => return Some(Err(ExportError::WalkFailed { path, source })),
            };

            if file_type.is_dir() {
                if self.skip.contains(&path) {
                    debug!("Not descending into {}", path.display());
                    continue;
                }
                match tokio::fs::read_dir(&path).await {
                    Ok(handle) => self.stack.push((path, handle)),
                    Err(source) => return Some(Err(ExportError::WalkFailed { path, source })),
                }
            } else if file_type.is_file() {
                return Some(Ok(path));
            } else {
                trace!("Skipping non-regular entry {}", path.display());
            }
        }
    }

    /// Adapt the walker into a `Stream` of file paths.
    pub fn into_stream(self) -> impl Stream<Item = Result<PathBuf, ExportError>> {
        futures::stream::unfold(self, |mut walker| async move {
            walker.next_file().await.map(|item| (item, walker))
        })
    }
}
