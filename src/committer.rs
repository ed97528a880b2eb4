//! Applies a change log to a storage backend.
//!
//! A commit always runs the same phases in the same order:
//!
//! ```text
//! Idle -> ApplyingCreates -> ApplyingUpdates -> ApplyingDeletes -> Done
//! ```
//!
//! Within a phase, operations run in log order. Every operation is attempted
//! even when earlier ones failed, and nothing is rolled back: the result
//! lists exactly what was applied and what was not.

use std::path::Path;

use crate::backend::StorageBackend;
use crate::error::{ProjectError, ProjectResult};
use crate::types::{CommitResult, FailedOperation, OperationKind, PendingOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    Idle,
    ApplyingCreates,
    ApplyingUpdates,
    ApplyingDeletes,
    Done,
}

impl CommitPhase {
    /// Operation kind applied in this phase, if any
    pub fn kind(self) -> Option<OperationKind> {
        match self {
            CommitPhase::ApplyingCreates => Some(OperationKind::Create),
            CommitPhase::ApplyingUpdates => Some(OperationKind::Update),
            CommitPhase::ApplyingDeletes => Some(OperationKind::Delete),
            CommitPhase::Idle | CommitPhase::Done => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            CommitPhase::Idle => CommitPhase::ApplyingCreates,
            CommitPhase::ApplyingCreates => CommitPhase::ApplyingUpdates,
            CommitPhase::ApplyingUpdates => CommitPhase::ApplyingDeletes,
            CommitPhase::ApplyingDeletes | CommitPhase::Done => CommitPhase::Done,
        }
    }
}

/// One commit of a change log against `root` on `backend`.
pub struct BatchCommitter<'a> {
    backend: &'a dyn StorageBackend,
    root: &'a Path,
    phase: CommitPhase,
    result: CommitResult,
}

impl<'a> BatchCommitter<'a> {
    pub fn new(backend: &'a dyn StorageBackend, root: &'a Path) -> Self {
        Self {
            backend,
            root,
            phase: CommitPhase::Idle,
            result: CommitResult::default(),
        }
    }

    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    /// Apply `ops` and return the aggregate result.
    ///
    /// Only an unreachable backend is an error; it is detected before any
    /// operation is applied.
    pub async fn run(mut self, ops: &[PendingOperation]) -> ProjectResult<CommitResult> {
        self.backend.check_root(self.root).await?;

        while self.phase != CommitPhase::Done {
            self.phase = self.phase.next();
            let Some(kind) = self.phase.kind() else {
                continue;
            };
            tracing::debug!(phase = ?self.phase, "commit phase started");
            for op in ops.iter().filter(|op| op.kind == kind) {
                self.apply(op).await;
            }
        }

        self.result.success = self.result.failed.is_empty();
        Ok(self.result)
    }

    async fn apply(&mut self, op: &PendingOperation) {
        let outcome = match op.kind {
            OperationKind::Create | OperationKind::Update => match op.content.as_deref() {
                Some(content) => self.backend.write_file(self.root, &op.path, content).await,
                None => Err(ProjectError::Validation(format!(
                    "{:?} of {} carries no content",
                    op.kind, op.path
                ))),
            },
            OperationKind::Delete => self.backend.delete_file(self.root, &op.path).await,
        };

        match outcome {
            Ok(()) => match op.kind {
                OperationKind::Create => self.result.created_count += 1,
                OperationKind::Update => self.result.updated_count += 1,
                OperationKind::Delete => self.result.deleted_count += 1,
            },
            Err(e) => {
                tracing::warn!(path = %op.path, kind = ?op.kind, error = %e, "commit operation failed");
                self.result.failed.push(FailedOperation {
                    path: op.path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}
