//! Live projects keyed by id.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::StorageBackend;
use crate::config::EngineConfig;
use crate::error::{ProjectError, ProjectResult};
use crate::project::Project;
use crate::types::{Metadata, ProjectInfo};

/// A resident project. Lock it for the duration of any call that mutates it.
pub type SharedProject = Arc<Mutex<Project>>;

/// Owns every resident project; the only place a project is evicted from.
pub struct ProjectRegistry {
    projects: RwLock<HashMap<String, SharedProject>>,
    backend: Arc<dyn StorageBackend>,
    config: EngineConfig,
}

impl ProjectRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: Arc<dyn StorageBackend>, config: EngineConfig) -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn contains(&self, id: &str) -> bool {
        self.projects.read().contains_key(id)
    }

    /// Ids of every resident project, sorted
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.projects.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Resident project `id`, or a freshly loaded one when `root` is given.
    ///
    /// Without a root an unknown id is `NotFound`. If two callers load the
    /// same id at once, both receive whichever project was stored first.
    pub async fn get_project(&self, id: &str, root: Option<&Path>) -> ProjectResult<SharedProject> {
        if let Some(project) = self.resident(id) {
            return Ok(project);
        }
        let Some(root) = root else {
            return Err(ProjectError::NotFound(format!("project {}", id)));
        };

        let mut project = self.build(id, &name_from_root(root, id), root);
        project.load().await?;

        let shared = self
            .projects
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(project)))
            .clone();
        Ok(shared)
    }

    /// Load `root` as project `id`. Fails if `id` is already resident.
    pub async fn load_project(&self, id: &str, root: &Path) -> ProjectResult<SharedProject> {
        if self.contains(id) {
            return Err(ProjectError::AlreadyExists(format!("project {}", id)));
        }

        let mut project = self.build(id, &name_from_root(root, id), root);
        project.load().await?;
        self.insert_new(id, project)
    }

    /// Register an empty project under a new id, creating its root on the
    /// backend if needed.
    pub async fn create_project(&self, name: &str, root: &Path) -> ProjectResult<SharedProject> {
        let id = Uuid::new_v4().to_string();
        self.backend.ensure_root(root).await?;

        let project = self.build(&id, name, root);
        tracing::info!(project = %id, name, root = %root.display(), "project created");
        self.insert_new(&id, project)
    }

    /// Evict `id` without saving staged changes.
    pub fn delete_project(&self, id: &str) -> ProjectResult<()> {
        match self.projects.write().remove(id) {
            Some(_) => {
                tracing::info!(project = %id, "project deleted");
                Ok(())
            }
            None => Err(ProjectError::NotFound(format!("project {}", id))),
        }
    }

    /// Commit pending changes when `save_changes` is set, then evict `id`.
    ///
    /// Unknown ids are ignored. If the commit cannot reach the backend the
    /// error is returned and the project stays resident.
    pub async fn close_project(&self, id: &str, save_changes: bool) -> ProjectResult<()> {
        let Some(project) = self.resident(id) else {
            return Ok(());
        };

        if save_changes {
            let mut project = project.lock().await;
            if !project.pending_operations().is_empty() {
                project.commit().await?;
            }
        }

        let mut projects = self.projects.write();
        if projects.get(id).is_some_and(|p| Arc::ptr_eq(p, &project)) {
            projects.remove(id);
        }
        tracing::info!(project = %id, saved = save_changes, "project closed");
        Ok(())
    }

    /// Close every project, saving changes. All projects are attempted; the
    /// first failure is returned.
    pub async fn dispose(&self) -> ProjectResult<()> {
        let mut first_error = None;
        for id in self.project_ids() {
            if let Err(e) = self.close_project(&id, true).await {
                tracing::error!(project = %id, error = %e, "failed to close project");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn resident(&self, id: &str) -> Option<SharedProject> {
        self.projects.read().get(id).cloned()
    }

    fn build(&self, id: &str, name: &str, root: &Path) -> Project {
        let info = ProjectInfo {
            id: id.to_string(),
            name: name.to_string(),
            root_path: root.to_path_buf(),
            language: self.config.default_language.clone(),
            metadata: Metadata::new(),
        };
        Project::new(info, Arc::clone(&self.backend), self.config.event_capacity)
    }

    fn insert_new(&self, id: &str, project: Project) -> ProjectResult<SharedProject> {
        match self.projects.write().entry(id.to_string()) {
            Entry::Occupied(_) => Err(ProjectError::AlreadyExists(format!("project {}", id))),
            Entry::Vacant(slot) => Ok(slot.insert(Arc::new(Mutex::new(project))).clone()),
        }
    }
}

fn name_from_root(root: &Path, id: &str) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;

    #[test]
    fn name_falls_back_to_id() {
        assert_eq!(name_from_root(Path::new("/srv/shop"), "x"), "shop");
        assert_eq!(name_from_root(Path::new("/"), "x"), "x");
    }

    #[tokio::test]
    async fn delete_unknown_project_is_not_found() {
        let registry = ProjectRegistry::new(Arc::new(MemoryBackend::new()));
        let err = registry.delete_project("ghost").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.http_status(), 404);
    }
}
