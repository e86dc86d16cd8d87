use std::fmt;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::ContentCache;
use crate::error::{ConfigError, SourceError};
use crate::registry::{Capability, Locations, Variant};

/// Where a source's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    pub fingerprint: String,
}

/// Resolves a location descriptor into a file inside the working directory.
pub trait Location: Send + Sync + fmt::Debug {
    fn kind(&self) -> &str;

    /// # Errors
    ///
    /// Returns `SourceError` when the content cannot be read or cached.
    fn fetch(&self, working_dir: &Path, cache: &ContentCache) -> Result<Fetched, SourceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LocalLocation {
    /// Path of a file on the local filesystem.
    pub path: PathBuf,
}

/// Content embedded directly in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InlineLocation {
    /// File name the content is materialized under.
    pub filename: String,
    pub content: String,
}

impl Location for LocalLocation {
    fn kind(&self) -> &str {
        "local"
    }

    fn fetch(&self, working_dir: &Path, cache: &ContentCache) -> Result<Fetched, SourceError> {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SourceError::InvalidName(self.path.display().to_string()))?;
        let key = ContentCache::descriptor_key(self.kind(), self);
        if let Some(fetched) = reuse(key.as_deref(), name, working_dir, cache)? {
            return Ok(fetched);
        }
        let bytes = std::fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(self.path.clone())
            } else {
                SourceError::Io {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;
        place(&bytes, key, name, working_dir, cache)
    }
}

impl Location for InlineLocation {
    fn kind(&self) -> &str {
        "inline"
    }

    fn fetch(&self, working_dir: &Path, cache: &ContentCache) -> Result<Fetched, SourceError> {
        let name = Path::new(&self.filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n == self.filename)
            .ok_or_else(|| SourceError::InvalidName(self.filename.clone()))?;
        let key = ContentCache::descriptor_key(self.kind(), self);
        if let Some(fetched) = reuse(key.as_deref(), name, working_dir, cache)? {
            return Ok(fetched);
        }
        place(self.content.as_bytes(), key, name, working_dir, cache)
    }
}

/// Copy a previously fetched descriptor's content without touching its origin.
fn reuse(
    key: Option<&str>,
    name: &str,
    working_dir: &Path,
    cache: &ContentCache,
) -> Result<Option<Fetched>, SourceError> {
    let Some(fingerprint) = key.and_then(|k| cache.lookup(k)) else {
        return Ok(None);
    };
    tracing::debug!(%fingerprint, "descriptor served from cache");
    copy_out(fingerprint, name, working_dir, cache).map(Some)
}

fn place(
    bytes: &[u8],
    key: Option<String>,
    name: &str,
    working_dir: &Path,
    cache: &ContentCache,
) -> Result<Fetched, SourceError> {
    let fingerprint = cache.store(bytes).map_err(SourceError::Cache)?;
    if let Some(key) = key {
        cache.remember(key, &fingerprint);
    }
    copy_out(fingerprint, name, working_dir, cache)
}

fn copy_out(
    fingerprint: String,
    name: &str,
    working_dir: &Path,
    cache: &ContentCache,
) -> Result<Fetched, SourceError> {
    let path = working_dir.join(name);
    cache
        .copy_to(&fingerprint, &path)
        .map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;
    Ok(Fetched { path, fingerprint })
}

fn variant<T>(tag: &'static str, description: &str) -> Variant<Locations>
where
    T: Location + serde::de::DeserializeOwned + JsonSchema + 'static,
{
    Variant::new(tag, description, schemars::schema_for!(T), move |payload, _| {
        let location: T = serde_json::from_value(payload)
            .map_err(|e| ConfigError::validation(Locations::NAME, tag, e))?;
        let location: Box<dyn Location> = Box::new(location);
        Ok(location)
    })
}

#[must_use]
pub fn builtin() -> Vec<Variant<Locations>> {
    vec![
        variant::<LocalLocation>("local", "A file on the local filesystem"),
        variant::<InlineLocation>("inline", "Content embedded in the manifest"),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::TypeRegistry;

    #[test]
    fn local_fetch_copies_into_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, "hello").unwrap();
        let work = dir.path().join("work");
        let cache = ContentCache::new(dir.path().join("cache"));

        let fetched = LocalLocation { path: input }.fetch(&work, &cache).unwrap();
        assert_eq!(fetched.path, work.join("input.txt"));
        assert_eq!(std::fs::read_to_string(&fetched.path).unwrap(), "hello");
        assert!(cache.contains(&fetched.fingerprint));
    }

    #[test]
    fn refetch_uses_cache_after_original_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("report.txt");
        std::fs::write(&input, "kept").unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        let location = LocalLocation { path: input.clone() };

        let first = location.fetch(&dir.path().join("w1"), &cache).unwrap();
        std::fs::remove_file(&input).unwrap();
        let second = location.fetch(&dir.path().join("w2"), &cache).unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(second.path, dir.path().join("w2/report.txt"));
        assert_eq!(std::fs::read_to_string(&second.path).unwrap(), "kept");
    }

    #[test]
    fn evicted_entry_falls_back_to_origin() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "again").unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        let location = LocalLocation { path: input };

        let first = location.fetch(&dir.path().join("w1"), &cache).unwrap();
        std::fs::remove_dir_all(cache.root()).unwrap();
        let second = location.fetch(&dir.path().join("w2"), &cache).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert!(cache.contains(&second.fingerprint));
    }

    #[test]
    fn local_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        let err = LocalLocation {
            path: dir.path().join("missing.pdf"),
        }
        .fetch(dir.path(), &cache)
        .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn inline_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        let err = InlineLocation {
            filename: "../escape.txt".into(),
            content: "x".into(),
        }
        .fetch(dir.path(), &cache)
        .unwrap_err();
        assert!(matches!(err, SourceError::InvalidName(_)));
    }

    #[test]
    fn same_content_shares_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        let a = InlineLocation {
            filename: "a.txt".into(),
            content: "same".into(),
        }
        .fetch(&dir.path().join("w1"), &cache)
        .unwrap();
        let b = InlineLocation {
            filename: "b.txt".into(),
            content: "same".into(),
        }
        .fetch(&dir.path().join("w2"), &cache)
        .unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn parse_through_registry() {
        let mut registry = TypeRegistry::new();
        registry.register(builtin());
        let location = registry
            .parse_tagged::<Locations>(json!({"type": "inline", "filename": "a.txt", "content": "x"}))
            .unwrap();
        assert_eq!(location.kind(), "inline");

        let err = registry
            .parse_tagged::<Locations>(json!({"type": "local", "path": "/x", "mode": "r"}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
