//! Core types shared by the tree, the change log, the committer and the project.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Caller-supplied metadata: string keys mapped to JSON scalar or array values.
pub type Metadata = BTreeMap<String, Value>;

/// A `{path, content}` pair as produced by a storage scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Metadata carried by every file node.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub size: u64,
    #[serde(with = "serde_millis")]
    pub last_modified: SystemTime,
    pub language: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, flatten)]
    pub extra: Metadata,
}

impl FileMetadata {
    /// Fresh metadata for `content` stored at `path`.
    pub fn for_content(path: &str, content: &str) -> Self {
        Self {
            size: content.len() as u64,
            last_modified: SystemTime::now(),
            language: language_for_path(path).map(str::to_string),
            imports: Vec::new(),
            exports: Vec::new(),
            dependencies: Vec::new(),
            extra: Metadata::new(),
        }
    }

    /// Merge caller metadata into this record.
    ///
    /// Known keys land in their typed fields when the value has the right
    /// shape; everything else is kept in `extra`. `size` and `lastModified`
    /// are owned by the tree and never overwritten from outside.
    pub fn merge(&mut self, patch: &Metadata) {
        for (key, value) in patch {
            match (key.as_str(), value) {
                ("size" | "lastModified", _) => {}
                ("language", Value::String(lang)) => self.language = Some(lang.clone()),
                ("imports", Value::Array(items)) => self.imports = string_list(items),
                ("exports", Value::Array(items)) => self.exports = string_list(items),
                ("dependencies", Value::Array(items)) => self.dependencies = string_list(items),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub(crate) fn touch(&mut self, content: &str) {
        self.size = content.len() as u64;
        self.last_modified = SystemTime::now();
    }
}

fn string_list(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Language tag guessed from a file extension.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    let lang = match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "rs" => "rust",
        "py" => "python",
        "go" => "go",
        "json" => "json",
        "md" => "markdown",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" | "htm" => "html",
        "css" => "css",
        _ => return None,
    };
    Some(lang)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// One staged mutation waiting for the next commit.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub path: String,
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
}

impl PendingOperation {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Create,
            path: path.into(),
            content: Some(content.into()),
            metadata: None,
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Update,
            ..Self::create(path, content)
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            path: path.into(),
            content: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A single operation the committer could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub path: String,
    pub error: String,
}

/// Aggregate outcome of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub success: bool,
    pub created_count: usize,
    pub updated_count: usize,
    pub deleted_count: usize,
    pub failed: Vec<FailedOperation>,
}

impl CommitResult {
    pub fn applied(&self) -> usize {
        self.created_count + self.updated_count + self.deleted_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub file_count: usize,
    pub pending_changes: usize,
    #[serde(with = "serde_millis")]
    pub last_updated: SystemTime,
}

/// Descriptive fields of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    pub root_path: PathBuf,
    pub language: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Payload of a change notification. `content` is `None` for deletes.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: OperationKind,
    pub path: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectEvent {
    Change(ChangeEvent),
    Commit(CommitResult),
}
