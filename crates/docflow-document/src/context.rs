use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A producing transformer together with the arguments it ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContextEntry {
    pub transformer: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ContextEntry {
    #[must_use]
    pub fn new(transformer: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            transformer: transformer.into(),
            arguments,
        }
    }
}

/// Append-only audit trail of the transformers that produced a document.
///
/// Entries are kept in execution order. A context is never edited in place:
/// [`Context::appended`] returns a copy with one more entry, which is how a
/// document derived from a predecessor inherits its lineage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Context(Vec<ContextEntry>);

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[ContextEntry] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ContextEntry> {
        self.0.last()
    }

    /// Copy of this context with `entry` appended.
    #[must_use]
    pub fn appended(&self, entry: ContextEntry) -> Self {
        let mut entries = Vec::with_capacity(self.0.len() + 1);
        entries.extend_from_slice(&self.0);
        entries.push(entry);
        Self(entries)
    }

    /// Transformer identities in execution order.
    pub fn transformers(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.transformer.as_str())
    }

    /// Whether every entry of `self` appears, in order, at the start of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Context) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl From<Vec<ContextEntry>> for Context {
    fn from(entries: Vec<ContextEntry>) -> Self {
        Self(entries)
    }
}
