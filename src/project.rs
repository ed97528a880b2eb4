//! A project: the in-memory tree plus the log of edits staged against it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::backend::StorageBackend;
use crate::changelog::ChangeLog;
use crate::committer::BatchCommitter;
use crate::error::ProjectResult;
use crate::path;
use crate::tree::{FileNode, Tree};
use crate::types::{
    ChangeEvent, CommitResult, Metadata, OperationKind, PendingOperation, ProjectEvent,
    ProjectInfo, ProjectStats,
};

/// Mutations apply to the tree immediately and are queued in the change log
/// until [`commit`](Project::commit) writes them to the backend or
/// [`discard`](Project::discard) throws them away.
///
/// A project expects one caller at a time; the registry hands projects out
/// behind a mutex.
pub struct Project {
    info: ProjectInfo,
    tree: Tree,
    log: ChangeLog,
    backend: Arc<dyn StorageBackend>,
    events: broadcast::Sender<ProjectEvent>,
}

impl Project {
    /// Create an empty project. Call [`load`](Project::load) to populate it.
    pub fn new(info: ProjectInfo, backend: Arc<dyn StorageBackend>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            info,
            tree: Tree::new(),
            log: ChangeLog::new(),
            backend,
            events,
        }
    }

    pub fn info(&self) -> &ProjectInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn root_path(&self) -> &Path {
        &self.info.root_path
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn pending_operations(&self) -> &[PendingOperation] {
        self.log.as_slice()
    }

    /// Receive change and commit events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    /// Replace the tree with the backend's current files and clear the log.
    ///
    /// If the backend read fails the previous tree and log are kept as-is.
    pub async fn load(&mut self) -> ProjectResult<()> {
        let entries = self
            .backend
            .read_project_files(&self.info.root_path)
            .await
            .inspect_err(|e| {
                tracing::error!(project = %self.info.id, error = %e, "failed to load project");
            })?;

        self.tree = Tree::from_entries(&entries);
        self.log.clear();
        tracing::info!(
            project = %self.info.id,
            root = %self.info.root_path.display(),
            files = entries.len(),
            "project loaded"
        );
        Ok(())
    }

    /// File at `path`, or `None` when nothing (or a directory) is there.
    pub fn get_file(&self, path: &str) -> Option<&FileNode> {
        let path = path::normalize(path).ok()?;
        self.tree.find_file_node(&path)
    }

    /// Every file in the project with its path.
    pub fn files(&self) -> impl Iterator<Item = (String, &FileNode)> + '_ {
        self.tree
            .files(self.tree.root())
            .filter_map(|(id, file)| self.tree.path_of(id).map(|p| (p, file)))
    }

    /// Update the file at `path`, or create it if there is none.
    pub fn update_file(
        &mut self,
        path: &str,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> ProjectResult<()> {
        let path = path::normalize(path)?;
        let content = content.into();

        let Some(file) = self
            .tree
            .find_file(&path)
            .and_then(|id| self.tree.file_mut(id))
        else {
            self.stage_create(path, content, metadata);
            return Ok(());
        };

        file.set_content(content.clone());
        if let Some(patch) = &metadata {
            file.merge_metadata(patch);
        }

        tracing::debug!(project = %self.info.id, path = %path, "staged update");
        self.log
            .append(PendingOperation::update(path.clone(), content.clone()).with_metadata(metadata));
        self.publish_change(OperationKind::Update, path, Some(content));
        Ok(())
    }

    /// Create a file at `path`, replacing whatever node had that name.
    pub fn create_file(
        &mut self,
        path: &str,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> ProjectResult<()> {
        let path = path::normalize(path)?;
        self.stage_create(path, content.into(), metadata);
        Ok(())
    }

    /// Delete the file at `path`. Returns `false` without staging anything
    /// when no file is there.
    pub fn delete_file(&mut self, path: &str) -> ProjectResult<bool> {
        let path = path::normalize(path)?;

        let Some(id) = self.tree.find_file(&path) else {
            return Ok(false);
        };
        let Some(parent) = self.tree.node(id).and_then(|n| n.parent()) else {
            return Ok(false);
        };
        let (_, name) = path::split_parent(&path);
        self.tree.remove_child(parent, name);

        tracing::debug!(project = %self.info.id, path = %path, "staged delete");
        self.log.append(PendingOperation::delete(path.clone()));
        self.publish_change(OperationKind::Delete, path, None);
        Ok(true)
    }

    /// Attach metadata to an existing file without staging an operation.
    /// Returns `false` when there is no file at `path`.
    pub fn set_file_metadata(&mut self, path: &str, metadata: &Metadata) -> ProjectResult<bool> {
        let path = path::normalize(path)?;
        match self
            .tree
            .find_file(&path)
            .and_then(|id| self.tree.file_mut(id))
        {
            Some(file) => {
                file.merge_metadata(metadata);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write every staged operation to the backend.
    ///
    /// Individual failures are reported in the result and the log is cleared
    /// either way. If the backend cannot be reached at all the error is
    /// returned and the log is left intact for a retry.
    pub async fn commit(&mut self) -> ProjectResult<CommitResult> {
        let result = BatchCommitter::new(self.backend.as_ref(), &self.info.root_path)
            .run(self.log.as_slice())
            .await
            .inspect_err(|e| {
                tracing::error!(project = %self.info.id, error = %e, "commit failed");
            })?;

        self.log.clear();
        tracing::info!(
            project = %self.info.id,
            created = result.created_count,
            updated = result.updated_count,
            deleted = result.deleted_count,
            failed = result.failed.len(),
            "commit finished"
        );
        // no subscribers is fine
        let _ = self.events.send(ProjectEvent::Commit(result.clone()));
        Ok(result)
    }

    /// Drop staged edits and reload from the backend.
    ///
    /// The log is only cleared once the reload succeeds, so a failed discard
    /// leaves the tree and its pending edits consistent with each other.
    pub async fn discard(&mut self) -> ProjectResult<()> {
        tracing::info!(project = %self.info.id, dropped = self.log.len(), "discarding changes");
        self.load().await
    }

    pub fn stats(&self) -> ProjectStats {
        ProjectStats {
            file_count: self.tree.file_count(),
            pending_changes: self.log.len(),
            last_updated: SystemTime::now(),
        }
    }

    fn stage_create(&mut self, path: String, content: String, metadata: Option<Metadata>) {
        let (_, name) = path::split_parent(&path);
        let mut file = FileNode::new(name, content.clone());
        if let Some(patch) = &metadata {
            file.merge_metadata(patch);
        }
        self.tree.place_file(&path, file);

        tracing::debug!(project = %self.info.id, path = %path, "staged create");
        self.log
            .append(PendingOperation::create(path.clone(), content.clone()).with_metadata(metadata));
        self.publish_change(OperationKind::Create, path, Some(content));
    }

    fn publish_change(&self, kind: OperationKind, path: String, content: Option<String>) {
        // Never blocks: lagging receivers lose the oldest events instead.
        let _ = self
            .events
            .send(ProjectEvent::Change(ChangeEvent { kind, path, content }));
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("info", &self.info)
            .field("files", &self.tree.file_count())
            .field("pending", &self.log.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::error::ProjectError;
    use std::path::PathBuf;

    const ROOT: &str = "/work/demo";

    fn project_with(backend: &MemoryBackend) -> Project {
        let info = ProjectInfo {
            id: "demo".into(),
            name: "demo".into(),
            root_path: PathBuf::from(ROOT),
            language: "typescript".into(),
            metadata: Metadata::new(),
        };
        Project::new(info, Arc::new(backend.clone()), 16)
    }

    #[tokio::test]
    async fn update_of_missing_file_creates_it() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "seed.txt", "seed");
        let mut project = project_with(&backend);
        project.load().await.unwrap();

        project.update_file("new/file.txt", "x", None).unwrap();
        project.update_file("seed.txt", "changed", None).unwrap();

        let kinds: Vec<_> = project.pending_operations().iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Create, OperationKind::Update]);
        assert_eq!(project.get_file("seed.txt").unwrap().content(), "changed");
    }

    #[tokio::test]
    async fn malformed_paths_are_rejected_without_changes() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "a.txt", "a");
        let mut project = project_with(&backend);
        project.load().await.unwrap();

        let err = project.create_file("../escape.txt", "x", None).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidPath(_)));
        assert!(project.update_file("", "x", None).is_err());
        assert!(project.delete_file("a//b").is_err());

        assert!(project.pending_operations().is_empty());
        assert_eq!(project.stats().file_count, 1);
    }

    #[tokio::test]
    async fn delete_of_missing_file_is_noop() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "dir/a.txt", "a");
        let mut project = project_with(&backend);
        project.load().await.unwrap();

        assert!(!project.delete_file("nope.txt").unwrap());
        // a directory is not a file
        assert!(!project.delete_file("dir").unwrap());
        assert!(project.pending_operations().is_empty());

        assert!(project.delete_file("dir/a.txt").unwrap());
        assert_eq!(project.pending_operations().len(), 1);
        assert!(project.get_file("dir/a.txt").is_none());
    }

    #[tokio::test]
    async fn metadata_is_merged_and_not_logged() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "src/index.ts", "import x from './x'");
        let mut project = project_with(&backend);
        project.load().await.unwrap();

        let mut patch = Metadata::new();
        patch.insert("imports".into(), serde_json::json!(["./x"]));
        patch.insert("owner".into(), serde_json::json!("web"));
        assert!(project.set_file_metadata("src/index.ts", &patch).unwrap());
        assert!(!project.set_file_metadata("missing.ts", &patch).unwrap());

        let meta = project.get_file("src/index.ts").unwrap().metadata();
        assert_eq!(meta.imports, vec!["./x".to_string()]);
        assert_eq!(meta.extra.get("owner"), Some(&serde_json::json!("web")));
        assert_eq!(meta.language.as_deref(), Some("typescript"));
        assert!(project.pending_operations().is_empty());
    }

    #[tokio::test]
    async fn staged_metadata_reaches_node_and_log() {
        let backend = MemoryBackend::new();
        let mut project = project_with(&backend);

        let mut created = Metadata::new();
        created.insert("imports".into(), serde_json::json!(["./cart", "./user"]));
        created.insert("owner".into(), serde_json::json!("web"));
        created.insert("size".into(), serde_json::json!(9999));
        created.insert("lastModified".into(), serde_json::json!(0));
        project
            .create_file("src/shop.ts", "export {}", Some(created.clone()))
            .unwrap();

        let mut updated = Metadata::new();
        updated.insert("language".into(), serde_json::json!("tsx"));
        updated.insert("reviewed".into(), serde_json::json!(true));
        project
            .update_file("src/shop.ts", "export const x = 1", Some(updated.clone()))
            .unwrap();

        let meta = project.get_file("src/shop.ts").unwrap().metadata();
        assert_eq!(meta.imports, vec!["./cart".to_string(), "./user".to_string()]);
        assert_eq!(meta.language.as_deref(), Some("tsx"));
        assert_eq!(meta.extra.get("owner"), Some(&serde_json::json!("web")));
        assert_eq!(meta.extra.get("reviewed"), Some(&serde_json::json!(true)));
        assert_eq!(meta.size, "export const x = 1".len() as u64);
        assert!(meta.last_modified > SystemTime::UNIX_EPOCH);
        assert!(!meta.extra.contains_key("size"));
        assert!(!meta.extra.contains_key("lastModified"));

        let logged: Vec<_> = project
            .pending_operations()
            .iter()
            .map(|op| (op.kind, op.metadata.clone()))
            .collect();
        assert_eq!(
            logged,
            vec![
                (OperationKind::Create, Some(created)),
                (OperationKind::Update, Some(updated)),
            ]
        );
    }

    #[tokio::test]
    async fn failed_discard_keeps_pending_edits() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "a.txt", "a");
        let mut project = project_with(&backend);
        project.load().await.unwrap();
        project.update_file("a.txt", "edited", None).unwrap();

        backend.set_offline(true);
        assert!(project.discard().await.is_err());
        assert_eq!(project.pending_operations().len(), 1);
        assert_eq!(project.stats().pending_changes, 1);
        assert_eq!(project.get_file("a.txt").unwrap().content(), "edited");

        backend.set_offline(false);
        project.discard().await.unwrap();
        assert!(project.pending_operations().is_empty());
        assert_eq!(project.get_file("a.txt").unwrap().content(), "a");
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_state() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "a.txt", "a");
        let mut project = project_with(&backend);
        project.load().await.unwrap();
        project.create_file("b.txt", "b", None).unwrap();

        backend.set_offline(true);
        assert!(project.load().await.is_err());

        assert_eq!(project.stats().file_count, 2);
        assert_eq!(project.pending_operations().len(), 1);
    }

    #[tokio::test]
    async fn update_stamps_last_modified() {
        let backend = MemoryBackend::new();
        backend.insert(ROOT, "a.txt", "a");
        let mut project = project_with(&backend);
        project.load().await.unwrap();
        let before = project.get_file("a.txt").unwrap().metadata().last_modified;
        let id = project.get_file("a.txt").unwrap().id();

        project.update_file("a.txt", "longer", None).unwrap();

        let file = project.get_file("a.txt").unwrap();
        assert!(file.metadata().last_modified >= before);
        assert_eq!(file.metadata().size, 6);
        // updating in place keeps the file identity
        assert_eq!(file.id(), id);
    }
}
