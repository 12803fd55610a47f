//! Repository configuration, stored as `.twig/config.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TwigResult;
use crate::fsutil::atomic_write;

/// Branch created by `init` unless configured otherwise.
pub const DEFAULT_BRANCH: &str = "master";

/// Ignore file read from the working directory root.
pub const DEFAULT_IGNORE_FILE: &str = ".twigignore";

/// Per-repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Name of the branch created at `init`.
    pub default_branch: String,
    /// Name of the ignore file at the working directory root.
    pub ignore_file: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }
}

impl RepoConfig {
    /// Load the config, or return defaults if the file is absent.
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }
}
