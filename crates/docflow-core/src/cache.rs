use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Directory of fetched inputs keyed by their blake3 content fingerprint.
///
/// Shared by every manifest entry of one engine invocation. Entries are
/// written to a temporary file and renamed into place, so concurrent writers
/// of the same fingerprint leave one complete copy behind.
///
/// Alongside the content, an in-memory index maps location descriptors to
/// the fingerprint they produced. Clones share the index, so a descriptor
/// fetched once is served from the cache for the rest of the invocation.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
    index: Arc<Mutex<HashMap<String, String>>>,
}

impl ContentCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Arc::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn fingerprint(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    #[must_use]
    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        let shard = fingerprint.get(..2).unwrap_or("00");
        self.root.join(shard).join(fingerprint)
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.path_for(fingerprint).is_file()
    }

    /// Index key for a location descriptor of the given kind. `None` when the
    /// descriptor has no JSON form (e.g. a non UTF-8 path).
    #[must_use]
    pub fn descriptor_key<T: Serialize>(kind: &str, descriptor: &T) -> Option<String> {
        let value = serde_json::to_value(descriptor).ok()?;
        let canonical = serde_json::json!({"kind": kind, "descriptor": value});
        Some(Self::fingerprint(canonical.to_string().as_bytes()))
    }

    /// Fingerprint previously recorded for `key`, if its content is still
    /// cached.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        let index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        index
            .get(key)
            .filter(|fingerprint| self.contains(fingerprint))
            .cloned()
    }

    pub fn remember(&self, key: String, fingerprint: &str) {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        index.insert(key, fingerprint.to_owned());
    }

    /// Store `bytes` and return their fingerprint. Already cached content is
    /// not rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be written.
    pub fn store(&self, bytes: &[u8]) -> io::Result<String> {
        let fingerprint = Self::fingerprint(bytes);
        let path = self.path_for(&fingerprint);
        if path.is_file() {
            tracing::debug!(%fingerprint, "cache hit");
            return Ok(fingerprint);
        }
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;
        let tmp = parent.join(format!(".{fingerprint}.{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(%fingerprint, bytes = bytes.len(), "cached content");
        Ok(fingerprint)
    }

    /// # Errors
    ///
    /// Returns an error if the cached file exists but cannot be read.
    pub fn read(&self, fingerprint: &str) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(fingerprint)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Copy the cached content for `fingerprint` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is missing or the copy fails.
    pub fn copy_to(&self, fingerprint: &str, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(self.path_for(fingerprint), dest)?;
        Ok(())
    }
}
