//! Storage backend over the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;
use walkdir::WalkDir;

use crate::backend::StorageBackend;
use crate::config::ScanRules;
use crate::error::{ProjectError, ProjectResult};
use crate::path;
use crate::types::FileEntry;

/// Suffix of the temp files a write goes through. Scans never load them.
const TEMP_SUFFIX: &str = ".stagetree.tmp";

/// Reads and writes project files under a directory on disk.
#[derive(Debug, Clone, Default)]
pub struct DiskBackend {
    rules: ScanRules,
}

impl DiskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ScanRules) -> Self {
        Self { rules }
    }

    /// Join `relative_path` onto `root`, refusing anything that could leave it.
    fn resolve(root: &Path, relative_path: &str) -> ProjectResult<PathBuf> {
        if path::segments(relative_path).any(|s| s == "..") {
            return Err(ProjectError::PathTraversal(relative_path.to_string()));
        }
        let clean = path::normalize(relative_path)?;
        Ok(root.join(clean))
    }

    /// Fail with `PathTraversal` unless the deepest existing ancestor of
    /// `target` resolves inside `root` once symlinks are followed.
    async fn ensure_contained(root: &Path, target: &Path) -> ProjectResult<()> {
        let canonical_root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| io_error(root, e))?;

        let Some(parent) = target.parent() else {
            return Ok(());
        };
        for ancestor in parent.ancestors() {
            match tokio::fs::canonicalize(ancestor).await {
                Ok(resolved) if resolved.starts_with(&canonical_root) => return Ok(()),
                Ok(resolved) => {
                    tracing::warn!(
                        path = %target.display(),
                        resolved = %resolved.display(),
                        "refusing path outside project root"
                    );
                    return Err(ProjectError::PathTraversal(target.display().to_string()));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(ancestor, e)),
            }
        }
        Err(ProjectError::PathTraversal(target.display().to_string()))
    }

    fn scan(root: &Path, rules: &ScanRules) -> ProjectResult<Vec<FileEntry>> {
        if !root.is_dir() {
            return Err(ProjectError::Storage(format!(
                "project root not found: {}",
                root.display()
            )));
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && rules.skip_dir_name(&e.file_name().to_string_lossy()))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = relative_path(root, entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
                continue;
            };
            if relative.ends_with(TEMP_SUFFIX) || rules.should_skip(&relative) {
                continue;
            }

            match std::fs::read_to_string(entry.path()) {
                Ok(content) => files.push(FileEntry::new(relative, content)),
                Err(e) => {
                    tracing::warn!(path = %relative, error = %e, "skipping unreadable file");
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

/// `path` relative to `root`, joined with `/` regardless of platform.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn io_error(path: &Path, e: std::io::Error) -> ProjectError {
    ProjectError::SystemIo(format!("{}: {}", path.display(), e))
}

#[async_trait::async_trait]
impl StorageBackend for DiskBackend {
    async fn read_project_files(&self, root: &Path) -> ProjectResult<Vec<FileEntry>> {
        let root = root.to_path_buf();
        let rules = self.rules.clone();
        tokio::task::spawn_blocking(move || Self::scan(&root, &rules))
            .await
            .map_err(|e| ProjectError::Storage(format!("scan task failed: {}", e)))?
    }

    async fn write_file(&self, root: &Path, relative_path: &str, content: &str) -> ProjectResult<()> {
        let target = Self::resolve(root, relative_path)?;
        Self::ensure_contained(root, &target).await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        // Write to a uniquely named sibling, then rename over the target
        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(target.file_name().unwrap_or_default());
        temp_name.push(format!(".{}{}", Uuid::new_v4().simple(), TEMP_SUFFIX));
        let temp = target.with_file_name(temp_name);

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| io_error(&target, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error(&target, e));
        }
        Ok(())
    }

    async fn delete_file(&self, root: &Path, relative_path: &str) -> ProjectResult<()> {
        let target = Self::resolve(root, relative_path)?;
        Self::ensure_contained(root, &target).await?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&target, e)),
        }
    }

    async fn check_root(&self, root: &Path) -> ProjectResult<()> {
        match tokio::fs::metadata(root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ProjectError::Unavailable(format!(
                "project root is not a directory: {}",
                root.display()
            ))),
            Err(e) => Err(ProjectError::Unavailable(format!(
                "{}: {}",
                root.display(),
                e
            ))),
        }
    }

    async fn ensure_root(&self, root: &Path) -> ProjectResult<()> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| io_error(root, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_rejects_escapes() {
        let root = Path::new("/srv/project");
        assert!(matches!(
            DiskBackend::resolve(root, "../outside"),
            Err(ProjectError::PathTraversal(_))
        ));
        assert!(DiskBackend::resolve(root, "a//b").is_err());
        assert_eq!(
            DiskBackend::resolve(root, "/a/b.txt").unwrap(),
            root.join("a/b.txt")
        );
    }

    #[tokio::test]
    async fn write_creates_parents_and_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let backend = DiskBackend::new();

        backend
            .write_file(temp.path(), "deep/nested/file.txt", "hello")
            .await
            .unwrap();

        let dir = temp.path().join("deep/nested");
        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["file.txt".to_string()]);
        assert_eq!(std::fs::read_to_string(dir.join("file.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn read_skips_artifacts_and_binary_extensions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/index.ts"), "export {}").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        std::fs::write(root.join("logo.png"), "png").unwrap();

        let files = DiskBackend::new().read_project_files(root).await.unwrap();
        assert_eq!(files, vec![FileEntry::new("src/index.ts", "export {}")]);
    }

    #[tokio::test]
    async fn read_skips_non_utf8_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("good.txt"), "ok").unwrap();
        std::fs::write(temp.path().join("bad.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let files = DiskBackend::new()
            .read_project_files(temp.path())
            .await
            .unwrap();
        assert_eq!(files, vec![FileEntry::new("good.txt", "ok")]);
    }

    #[tokio::test]
    async fn missing_root_fails_read_and_probe() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let backend = DiskBackend::new();

        assert!(matches!(
            backend.read_project_files(&missing).await,
            Err(ProjectError::Storage(_))
        ));
        assert!(matches!(
            backend.check_root(&missing).await,
            Err(ProjectError::Unavailable(_))
        ));

        backend.ensure_root(&missing).await.unwrap();
        backend.check_root(&missing).await.unwrap();
    }

    #[tokio::test]
    async fn read_skips_leftover_temp_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join(".a.txt.0123abcd.stagetree.tmp"), "half").unwrap();

        let files = DiskBackend::new()
            .read_project_files(temp.path())
            .await
            .unwrap();
        assert_eq!(files, vec![FileEntry::new("a.txt", "a")]);
    }

    #[tokio::test]
    async fn write_does_not_clobber_file_named_like_temp() {
        let temp = TempDir::new().unwrap();
        let lookalike = temp.path().join("notes.md.stagetree.tmp");
        std::fs::write(&lookalike, "keep me").unwrap();

        DiskBackend::new()
            .write_file(temp.path(), "notes.md", "notes")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&lookalike).unwrap(), "keep me");
        assert_eq!(
            std::fs::read_to_string(temp.path().join("notes.md")).unwrap(),
            "notes"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directory_cannot_escape_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("victim.txt"), "safe").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let backend = DiskBackend::new();
        assert!(matches!(
            backend.write_file(&root, "link/new/pwn.txt", "x").await,
            Err(ProjectError::PathTraversal(_))
        ));
        assert!(matches!(
            backend.delete_file(&root, "link/victim.txt").await,
            Err(ProjectError::PathTraversal(_))
        ));
        assert!(!outside.join("new").exists());
        assert_eq!(std::fs::read_to_string(outside.join("victim.txt")).unwrap(), "safe");

        // a symlink that stays inside the root is fine
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();
        backend.write_file(&root, "alias/ok.txt", "ok").await.unwrap();
        assert_eq!(std::fs::read_to_string(root.join("real/ok.txt")).unwrap(), "ok");
    }

    #[tokio::test]
    async fn delete_absent_file_succeeds() {
        let temp = TempDir::new().unwrap();
        DiskBackend::new()
            .delete_file(temp.path(), "never-existed.txt")
            .await
            .unwrap();
    }
}
