//! Ordered log of staged operations not yet applied to storage.

use std::slice;

use crate::types::{OperationKind, PendingOperation};

/// Append-only sequence of pending operations.
///
/// Entries are never reordered or merged: a create followed by an update of
/// the same path is two entries. The only way to drop entries is [`clear`],
/// which drops all of them.
///
/// [`clear`]: ChangeLog::clear
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    ops: Vec<PendingOperation>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, op: PendingOperation) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn as_slice(&self) -> &[PendingOperation] {
        &self.ops
    }

    pub fn iter(&self) -> slice::Iter<'_, PendingOperation> {
        self.ops.iter()
    }

    /// Entries of one kind, in log order.
    pub fn of_kind(&self, kind: OperationKind) -> impl Iterator<Item = &PendingOperation> {
        self.ops.iter().filter(move |op| op.kind == kind)
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a PendingOperation;
    type IntoIter = slice::Iter<'a, PendingOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
