//! Manifest sources and their materialization into local artifacts.

pub mod location;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::ContentCache;
use crate::error::{ConfigError, SourceError};
use crate::registry::{Capability, Locations, Sources, TypeRegistry, Variant};

use self::location::Location;

/// A source's content placed inside an entry's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Source type tag, e.g. `pdf` or `csv`.
    pub kind: String,
    pub path: PathBuf,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Where finished outputs of an entry are copied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Destination {
    pub path: PathBuf,
}

/// One manifest entry: a typed reference to input content plus the name of
/// the pipeline that processes it.
pub trait Source: Send + Sync + fmt::Debug {
    fn kind(&self) -> &str;

    fn id(&self) -> &str;

    fn pipeline(&self) -> &str;

    fn destination(&self) -> Option<&Destination> {
        None
    }

    /// The source's own fields as a JSON object, as bindings see them.
    fn fields(&self) -> Map<String, Value>;

    /// Fetch the content and place it in `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the content cannot be fetched or copied.
    fn materialize(&self, working_dir: &Path, cache: &ContentCache)
    -> Result<Artifact, SourceError>;
}

/// Kinds of file-backed sources; the tag doubles as the artifact kind.
pub const FILE_KINDS: &[(&str, &str)] = &[
    ("text", "Plain text file"),
    ("markdown", "Markdown file"),
    ("html", "HTML page"),
    ("xml", "XML file"),
    ("csv", "Comma separated values"),
    ("json", "JSON record"),
    ("pdf", "PDF document"),
    ("docx", "Word document"),
    ("audio", "Audio recording"),
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FileSourceConfig {
    /// Unique identifier of the entry within the manifest.
    pub id: String,
    /// Name of the pipeline that processes this source.
    pub pipeline: String,
    /// Tagged location object, e.g. `{"type": "local", "path": "a.pdf"}`.
    pub location: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    /// Free-form values available to bindings under `metadata.<key>`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct FileSource {
    kind: String,
    config: FileSourceConfig,
    location: Box<dyn Location>,
}

impl FileSource {
    /// # Errors
    ///
    /// Returns `ConfigError` if the location is not a registered variant.
    pub fn new(
        kind: impl Into<String>,
        config: FileSourceConfig,
        registry: &TypeRegistry,
    ) -> Result<Self, ConfigError> {
        let location = registry.parse_tagged::<Locations>(config.location.clone())?;
        Ok(Self {
            kind: kind.into(),
            config,
            location,
        })
    }
}

impl Source for FileSource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn id(&self) -> &str {
        &self.config.id
    }

    fn pipeline(&self) -> &str {
        &self.config.pipeline
    }

    fn destination(&self) -> Option<&Destination> {
        self.config.destination.as_ref()
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(&self.config) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("type".into(), Value::String(self.kind.clone()));
        fields
    }

    fn materialize(
        &self,
        working_dir: &Path,
        cache: &ContentCache,
    ) -> Result<Artifact, SourceError> {
        let fetched = self.location.fetch(working_dir, cache)?;
        tracing::debug!(
            id = %self.config.id,
            kind = %self.kind,
            location = self.location.kind(),
            path = %fetched.path.display(),
            "materialized source"
        );
        Ok(Artifact {
            kind: self.kind.clone(),
            path: fetched.path,
            source_id: self.config.id.clone(),
            fingerprint: Some(fetched.fingerprint),
        })
    }
}

fn file_variant(tag: &'static str, description: &str) -> Variant<Sources> {
    Variant::new(
        tag,
        description,
        schemars::schema_for!(FileSourceConfig),
        move |payload, registry| {
            let config: FileSourceConfig = serde_json::from_value(payload)
                .map_err(|e| ConfigError::validation(Sources::NAME, tag, e))?;
            let source: Box<dyn Source> = Box::new(FileSource::new(tag, config, registry)?);
            Ok(source)
        },
    )
}

#[must_use]
pub fn builtin() -> Vec<Variant<Sources>> {
    FILE_KINDS
        .iter()
        .map(|&(tag, description)| file_variant(tag, description))
        .collect()
}

/// The parsed list of sources for one engine invocation.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    sources: Vec<Arc<dyn Source>>,
}

impl Manifest {
    #[must_use]
    pub fn from_sources(sources: Vec<Arc<dyn Source>>) -> Self {
        Self { sources }
    }

    /// Parse a JSON array of tagged sources, or an object with a `sources`
    /// array.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed JSON or an invalid source entry.
    pub fn parse(json: &str, registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("sources") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(ConfigError::validation(
                        "manifest",
                        "sources",
                        "expected a `sources` array",
                    ));
                }
            },
            _ => {
                return Err(ConfigError::validation(
                    "manifest",
                    "sources",
                    "expected an array of sources",
                ));
            }
        };
        let sources = entries
            .into_iter()
            .map(|entry| registry.parse_tagged::<Sources>(entry).map(Arc::<dyn Source>::from))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = sources.len(), "parsed manifest");
        Ok(Self { sources })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise the
    /// errors of [`Manifest::parse`].
    pub fn load(path: &Path, registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json, registry)
    }

    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
