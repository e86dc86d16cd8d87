use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::registry::{Transformers, TypeRegistry};
use crate::transformer::Transformer;

/// Where a pipe's first step takes one of its inputs from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipeSource {
    /// The manifest entry's materialized source.
    Manifest,
    /// The latest document produced under `name`.
    Pipe { name: String },
    Nothing,
}

impl PipeSource {
    #[must_use]
    pub fn pipe(name: impl Into<String>) -> Self {
        Self::Pipe { name: name.into() }
    }
}

/// A per-entry value substituted into a step argument before build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    /// The entry's output directory.
    OutputDirectory,
    /// The entry's working directory.
    WorkingDirectory,
    /// Dotted path into the manifest source's fields, e.g. `metadata.author`.
    Source(String),
}

/// Serialized form of one transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Registered transformer tag.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
    /// Arguments filled in per manifest entry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bind: BTreeMap<String, Binding>,
}

impl StepConfig {
    #[must_use]
    pub fn new(kind: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.into(),
            arguments,
            bind: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_binding(mut self, argument: impl Into<String>, binding: Binding) -> Self {
        self.bind.insert(argument.into(), binding);
        self
    }

    /// The configuration an already built transformer was created from.
    #[must_use]
    pub fn from_transformer(transformer: &dyn Transformer) -> Self {
        Self::new(transformer.kind(), transformer.arguments())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::UnboundPlaceholder` if bindings are still
    /// pending, otherwise any error from the registry parse.
    pub fn build(&self, registry: &TypeRegistry) -> Result<Box<dyn Transformer>, ConfigError> {
        if let Some(argument) = self.bind.keys().next() {
            return Err(ConfigError::UnboundPlaceholder {
                step: self.kind.clone(),
                argument: argument.clone(),
            });
        }
        registry.parse::<Transformers>(&self.kind, Value::Object(self.arguments.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipeDefinition {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<PipeSource>,
    pub steps: Vec<StepConfig>,
}

/// The persisted, pure-data form of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    pub name: String,
    pub pipes: Vec<PipeDefinition>,
}

impl PipelineDefinition {
    /// # Errors
    ///
    /// Returns `ConfigError::Json` on malformed input.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Toml` on malformed input.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml)?)
    }

    /// Load a `.toml` or `.json` definition file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, or a parse error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
