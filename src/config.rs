//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! default_language = "rust"
//! event_capacity = 64
//!
//! [scan]
//! skip_dirs = [".git", "node_modules", "target"]
//! skip_extensions = ["png", "zip"]
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProjectError, ProjectResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Language recorded on projects the registry opens
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Buffered events per project before slow subscribers start lagging
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub scan: ScanRules,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_language() -> String {
    "typescript".to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            event_capacity: default_event_capacity(),
            scan: ScanRules::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> ProjectResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ProjectResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ProjectError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> ProjectResult<()> {
        if self.event_capacity == 0 {
            return Err(ProjectError::Config(
                "event_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// What a storage scan leaves out of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRules {
    /// Directory names skipped wherever they appear
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// File extensions (without the dot, case-insensitive) that are skipped
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
}

fn default_skip_dirs() -> Vec<String> {
    [".git", ".hg", ".svn", "node_modules", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_skip_extensions() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "ico", "woff", "woff2", "ttf", "eot", "pdf", "zip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            skip_dirs: default_skip_dirs(),
            skip_extensions: default_skip_extensions(),
        }
    }
}

impl ScanRules {
    /// Whether a project-relative path should be left out of a scan
    pub fn should_skip(&self, relative_path: &str) -> bool {
        let mut segments = relative_path.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                if self.skip_dirs.iter().any(|d| d == segment) {
                    return true;
                }
            } else {
                return self.skip_file_name(segment);
            }
        }
        false
    }

    /// Whether a directory with this name is pruned from a scan
    pub fn skip_dir_name(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }

    fn skip_file_name(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((_, ext)) => self
                .skip_extensions
                .iter()
                .any(|skip| skip.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
