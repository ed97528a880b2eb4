//! stagetree: an in-memory project file tree with staged edits that are
//! committed to storage in batches.

pub mod backend;
pub mod backends;
pub mod changelog;
pub mod committer;
pub mod config;
pub mod error;
pub mod logging;
pub mod path;
pub mod project;
pub mod registry;
pub mod tree;
pub mod types;

// Re-export
pub use backend::StorageBackend;
pub use backends::{DiskBackend, MemoryBackend};
pub use changelog::ChangeLog;
pub use committer::{BatchCommitter, CommitPhase};
pub use config::{EngineConfig, LogFormat, LoggingConfig, ScanRules};
pub use error::{ProjectError, ProjectResult};
pub use project::Project;
pub use registry::{ProjectRegistry, SharedProject};
pub use tree::{FileNode, NodeId, Tree};
pub use types::*;
