use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid: {0}")]
    Validation(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("path escapes project root: {0}")]
    PathTraversal(String),

    #[error("storage error: {0}")]
    Storage(String),

    // std::io::Error is stringified so it works with Serialize/Deserialize
    #[error("system I/O error: {0}")]
    SystemIo(String),

    /// The storage backend cannot be reached at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProjectError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProjectError::NotFound(_))
    }

    /// Status code the route layer answers with when an operation fails.
    pub fn http_status(&self) -> u16 {
        match self {
            ProjectError::NotFound(_) => 404,
            ProjectError::InvalidPath(_) | ProjectError::Validation(_) => 400,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::SystemIo(e.to_string())
    }
}

impl From<toml::de::Error> for ProjectError {
    fn from(e: toml::de::Error) -> Self {
        ProjectError::Config(e.to_string())
    }
}

pub type ProjectResult<T> = Result<T, ProjectError>;
