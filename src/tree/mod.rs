//! In-memory project tree.
//!
//! Nodes live in an arena owned by [`Tree`]; directories refer to their
//! children and children to their parent through [`NodeId`] handles, so the
//! parent link never participates in ownership.

mod node;

use std::collections::HashMap;

pub use node::{DirectoryNode, FileNode, Node, NodeId, NodeKind};

use crate::path;
use crate::types::FileEntry;

#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding only the root directory
    pub fn new() -> Self {
        let root = Node {
            name: String::new(),
            parent: None,
            kind: NodeKind::directory(),
        };
        Self {
            slots: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Build a tree from a flat list of `{path, content}` entries.
    ///
    /// Entries whose path is malformed are skipped. A later entry for the same
    /// path replaces an earlier one.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a FileEntry>,
    {
        let mut tree = Self::new();
        for entry in entries {
            let path = match path::normalize(&entry.path) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(path = %entry.path, error = %e, "skipping malformed entry");
                    continue;
                }
            };
            tree.place_file(&path, FileNode::new(path::split_parent(&path).1, &*entry.content));
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(Node::is_dir)
    }

    pub fn file(&self, id: NodeId) -> Option<&FileNode> {
        self.node(id).and_then(Node::as_file)
    }

    pub fn file_mut(&mut self, id: NodeId) -> Option<&mut FileNode> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn get_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.node(dir)
            .and_then(Node::as_dir)
            .and_then(|d| d.children.get(name).copied())
    }

    fn children_mut(&mut self, dir: NodeId) -> Option<&mut HashMap<String, NodeId>> {
        match self.node_mut(dir).map(|n| &mut n.kind) {
            Some(NodeKind::Directory(d)) => Some(&mut d.children),
            _ => None,
        }
    }

    /// Insert or replace the child `name` under `dir`.
    ///
    /// A replaced child is dropped together with its whole subtree. Returns
    /// `None` only when `dir` is not a live directory.
    pub fn add_child(
        &mut self,
        dir: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Option<NodeId> {
        if !self.is_dir(dir) {
            return None;
        }
        Some(self.attach(dir, name.into(), kind))
    }

    /// Remove the child `name` from `dir`; absent children are ignored.
    pub fn remove_child(&mut self, dir: NodeId, name: &str) {
        let removed = self.children_mut(dir).and_then(|c| c.remove(name));
        if let Some(id) = removed {
            self.release(id);
        }
    }

    /// Resolve `path` to a file. Any missing segment, or a directory where a
    /// file is expected, yields `None`.
    pub fn find_file(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path::segments(path) {
            current = self.get_child(current, segment)?;
        }
        self.file(current).map(|_| current)
    }

    pub fn find_file_node(&self, path: &str) -> Option<&FileNode> {
        self.find_file(path).and_then(|id| self.file(id))
    }

    /// Walk `dir_path` from the root, creating missing directories.
    ///
    /// Repeated calls return the same handle. A file occupying a directory
    /// segment is replaced by a directory.
    pub fn ensure_directory_path(&mut self, dir_path: &str) -> NodeId {
        let mut current = self.root;
        for segment in path::segments(dir_path) {
            current = match self.get_child(current, segment) {
                Some(id) if self.is_dir(id) => id,
                _ => self.attach(current, segment.to_string(), NodeKind::directory()),
            };
        }
        current
    }

    /// Place `file` at `path`, creating parent directories. Returns the new
    /// node handle.
    pub fn place_file(&mut self, path: &str, file: FileNode) -> NodeId {
        let (parent, name) = path::split_parent(path);
        let dir = self.ensure_directory_path(parent);
        self.attach(dir, name.to_string(), NodeKind::File(file))
    }

    /// Depth-first iterator over every file below `dir`. Nothing is cached;
    /// each call walks the current tree.
    pub fn files(&self, dir: NodeId) -> Files<'_> {
        Files {
            tree: self,
            stack: vec![dir],
        }
    }

    pub fn file_count(&self) -> usize {
        self.files(self.root).count()
    }

    /// Path of `id` relative to the root, derived from parent links.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.node(parent)?;
        }
        names.reverse();
        Some(names.join("/"))
    }

    fn attach(&mut self, dir: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = self.alloc(Node {
            name: name.clone(),
            parent: Some(dir),
            kind,
        });
        let replaced = self.children_mut(dir).and_then(|c| c.insert(name, id));
        if let Some(old) = replaced {
            self.release(old);
        }
        id
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Free `id` and everything below it.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.slots.get_mut(id.0).and_then(Option::take) {
                if let NodeKind::Directory(dir) = node.kind {
                    stack.extend(dir.children.into_values());
                }
                self.free.push(id.0);
            }
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`Tree::files`].
#[derive(Debug)]
pub struct Files<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Files<'a> {
    type Item = (NodeId, &'a FileNode);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.stack.pop() {
            match tree.node(id).map(Node::kind) {
                Some(NodeKind::File(file)) => return Some((id, file)),
                Some(NodeKind::Directory(dir)) => self.stack.extend(dir.children.values().copied()),
                None => {}
            }
        }
        None
    }
}
