//! Core MemoryBackend implementation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::backend::StorageBackend;
use crate::config::ScanRules;
use crate::error::{ProjectError, ProjectResult};
use crate::path;
use crate::types::FileEntry;

type Files = BTreeMap<String, String>;

/// In-memory storage backend.
///
/// Each project root maps to a flat table of relative path to content.
/// Directories are implied by path prefixes, and the same file/directory
/// conflicts a real filesystem would report are reported here too. Clones
/// share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    roots: Arc<RwLock<HashMap<PathBuf, Files>>>,
    denied: Arc<RwLock<HashSet<String>>>,
    offline: Arc<AtomicBool>,
    rules: ScanRules,
}

impl MemoryBackend {
    /// Create an empty backend with the default scan rules
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ScanRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Seed a file directly, bypassing the staged-commit path
    pub fn insert(&self, root: impl AsRef<Path>, relative_path: &str, content: &str) {
        self.roots
            .write()
            .entry(root.as_ref().to_path_buf())
            .or_default()
            .insert(relative_path.to_string(), content.to_string());
    }

    /// Current content of `relative_path`, if stored
    pub fn get(&self, root: impl AsRef<Path>, relative_path: &str) -> Option<String> {
        self.roots
            .read()
            .get(root.as_ref())
            .and_then(|files| files.get(relative_path).cloned())
    }

    /// Copy of everything stored under `root`
    pub fn snapshot(&self, root: impl AsRef<Path>) -> Option<BTreeMap<String, String>> {
        self.roots.read().get(root.as_ref()).cloned()
    }

    /// Make every write or delete of `relative_path` fail with a permission error
    pub fn deny(&self, relative_path: &str) {
        self.denied.write().insert(relative_path.to_string());
    }

    /// Simulate the whole backend becoming unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Normalize and validate a path
    pub(super) fn normalize_path(relative_path: &str) -> ProjectResult<String> {
        if path::segments(relative_path).any(|s| s == "..") {
            return Err(ProjectError::PathTraversal(relative_path.to_string()));
        }
        path::normalize(relative_path)
    }

    fn ensure_online(&self) -> ProjectResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProjectError::Unavailable("memory backend is offline".into()));
        }
        Ok(())
    }

    fn ensure_allowed(&self, relative_path: &str) -> ProjectResult<()> {
        if self.denied.read().contains(relative_path) {
            return Err(ProjectError::Storage(format!(
                "permission denied: {}",
                relative_path
            )));
        }
        Ok(())
    }

    /// Reject a write that a real filesystem would refuse: an ancestor that
    /// is a file, or an existing directory at the target path.
    fn ensure_writable(files: &Files, relative_path: &str) -> ProjectResult<()> {
        let mut ancestor = relative_path;
        while let Some((parent, _)) = ancestor.rsplit_once('/') {
            if files.contains_key(parent) {
                return Err(ProjectError::Storage(format!("not a directory: {}", parent)));
            }
            ancestor = parent;
        }

        let prefix = format!("{}/", relative_path);
        if files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
        {
            return Err(ProjectError::Storage(format!(
                "is a directory: {}",
                relative_path
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn read_project_files(&self, root: &Path) -> ProjectResult<Vec<FileEntry>> {
        self.ensure_online()?;
        let roots = self.roots.read();
        let files = roots.get(root).ok_or_else(|| {
            ProjectError::Storage(format!("project root not found: {}", root.display()))
        })?;

        Ok(files
            .iter()
            .filter(|(p, _)| !self.rules.should_skip(p))
            .map(|(p, c)| FileEntry::new(p.clone(), c.clone()))
            .collect())
    }

    async fn write_file(&self, root: &Path, relative_path: &str, content: &str) -> ProjectResult<()> {
        self.ensure_online()?;
        let relative_path = Self::normalize_path(relative_path)?;
        self.ensure_allowed(&relative_path)?;

        let mut roots = self.roots.write();
        let files = roots.entry(root.to_path_buf()).or_default();
        Self::ensure_writable(files, &relative_path)?;
        files.insert(relative_path, content.to_string());
        Ok(())
    }

    async fn delete_file(&self, root: &Path, relative_path: &str) -> ProjectResult<()> {
        self.ensure_online()?;
        let relative_path = Self::normalize_path(relative_path)?;
        self.ensure_allowed(&relative_path)?;

        if let Some(files) = self.roots.write().get_mut(root) {
            files.remove(&relative_path);
        }
        Ok(())
    }

    async fn check_root(&self, root: &Path) -> ProjectResult<()> {
        self.ensure_online()?;
        if !self.roots.read().contains_key(root) {
            return Err(ProjectError::Unavailable(format!(
                "project root not found: {}",
                root.display()
            )));
        }
        Ok(())
    }

    async fn ensure_root(&self, root: &Path) -> ProjectResult<()> {
        self.ensure_online()?;
        self.roots.write().entry(root.to_path_buf()).or_default();
        Ok(())
    }
}
