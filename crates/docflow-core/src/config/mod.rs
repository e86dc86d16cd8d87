mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::Context;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.parallelism == 0 {
            anyhow::bail!("engine.parallelism must be at least 1");
        }
        if self.engine.parallelism > tokio::sync::Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "engine.parallelism must be at most {}",
                tokio::sync::Semaphore::MAX_PERMITS
            );
        }
        if self.engine.workspace_dir.as_os_str().is_empty() {
            anyhow::bail!("engine.workspace_dir must not be empty");
        }
        if self.engine.artifacts_dir.as_os_str().is_empty() {
            anyhow::bail!("engine.artifacts_dir must not be empty");
        }
        Ok(())
    }
}
