use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".docflow/workspace")
}

fn default_pipelines_dir() -> PathBuf {
    PathBuf::from("pipelines")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".docflow/artifacts")
}

fn default_archive() -> bool {
    true
}

fn default_parallelism() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Root of the per-entry working and output directories.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Searched for `<name>.json` / `<name>.toml` pipeline definitions.
    #[serde(default = "default_pipelines_dir")]
    pub pipelines_dir: PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Content cache shared by all entries; `<workspace_dir>/cache` if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Zip each entry's output directory into `artifacts_dir`.
    #[serde(default = "default_archive")]
    pub archive: bool,
    /// Manifest entries processed at the same time.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            pipelines_dir: default_pipelines_dir(),
            artifacts_dir: default_artifacts_dir(),
            cache_dir: None,
            archive: default_archive(),
            parallelism: default_parallelism(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("cache"))
    }

    /// Defaults rooted at `root`, for tests and embedding.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            workspace_dir: root.join("workspace"),
            pipelines_dir: root.join("pipelines"),
            artifacts_dir: root.join("artifacts"),
            cache_dir: Some(root.join("cache")),
            ..Self::default()
        }
    }
}
