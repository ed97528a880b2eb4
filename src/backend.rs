use std::path::Path;

use crate::error::ProjectResult;
use crate::types::FileEntry;

/// Storage collaborator implemented by all backends.
///
/// `root` identifies the project on the backend and every `relative_path` is
/// resolved below it. Implementations reject paths that would escape the
/// root. The trait is object-safe so projects can hold an
/// `Arc<dyn StorageBackend>`.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Every project file below `root` as `{path, content}` pairs.
    ///
    /// Version-control and dependency directories and binary files are left
    /// out. A single unreadable file is logged and skipped; a missing root
    /// fails the whole read.
    async fn read_project_files(&self, root: &Path) -> ProjectResult<Vec<FileEntry>>;

    /// Write `content` to `relative_path`, creating parent directories.
    async fn write_file(&self, root: &Path, relative_path: &str, content: &str) -> ProjectResult<()>;

    /// Delete `relative_path`. Deleting a path that does not exist succeeds.
    async fn delete_file(&self, root: &Path, relative_path: &str) -> ProjectResult<()>;

    /// Fails with `ProjectError::Unavailable` when `root` cannot be reached.
    async fn check_root(&self, root: &Path) -> ProjectResult<()>;

    /// Create `root` if it does not exist yet.
    async fn ensure_root(&self, root: &Path) -> ProjectResult<()>;
}
