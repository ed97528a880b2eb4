//! Node representation for the in-memory project tree.

use std::collections::HashMap;

use uuid::Uuid;

use crate::types::{FileMetadata, Metadata};

/// Handle to a node slot in a [`Tree`](super::Tree).
///
/// Handles are only meaningful for the tree that issued them and go stale
/// once the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) usize);

/// File payload: content plus metadata, with a stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    id: Uuid,
    content: String,
    metadata: FileMetadata,
}

impl FileNode {
    /// Create a file named `name` holding `content`
    pub fn new(name: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        let metadata = FileMetadata::for_content(name, &content);
        Self {
            id: Uuid::new_v4(),
            content,
            metadata,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Replace the content and stamp `last_modified`
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.metadata.touch(&self.content);
    }

    pub fn merge_metadata(&mut self, patch: &Metadata) {
        self.metadata.merge(patch);
    }
}

/// Directory payload: children by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryNode {
    pub(super) children: HashMap<String, NodeId>,
}

impl DirectoryNode {
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}

/// Node kind - either a file or directory
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File(FileNode),
    Directory(DirectoryNode),
}

impl NodeKind {
    pub fn directory() -> Self {
        NodeKind::Directory(DirectoryNode::default())
    }
}

/// A named slot in the tree. `parent` is a navigation link toward the root,
/// never an owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(super) name: String,
    pub(super) parent: Option<NodeId>,
    pub(super) kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Check if this node is a file
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(_))
    }

    /// Check if this node is a directory
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirectoryNode> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }
}
