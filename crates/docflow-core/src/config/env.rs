use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOCFLOW_WORKSPACE_DIR") {
            self.engine.workspace_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCFLOW_PIPELINES_DIR") {
            self.engine.pipelines_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCFLOW_ARTIFACTS_DIR") {
            self.engine.artifacts_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCFLOW_CACHE_DIR") {
            self.engine.cache_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("DOCFLOW_ARCHIVE") {
            if let Ok(enabled) = v.parse::<bool>() {
                self.engine.archive = enabled;
            } else {
                tracing::warn!("ignoring invalid DOCFLOW_ARCHIVE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DOCFLOW_PARALLELISM") {
            if let Ok(n) = v.parse::<usize>() {
                self.engine.parallelism = n;
            } else {
                tracing::warn!("ignoring invalid DOCFLOW_PARALLELISM value: {v}");
            }
        }
    }
}
