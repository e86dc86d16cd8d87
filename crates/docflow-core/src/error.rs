use std::path::PathBuf;

/// Pipeline, transformer, or manifest configuration that cannot be used.
///
/// Raised at parse or build time and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no {0} variants registered")]
    UnregisteredCapability(&'static str),

    #[error("unknown {capability} type `{tag}` (known: {known})")]
    UnknownType {
        capability: &'static str,
        tag: String,
        known: String,
    },

    #[error("{capability} configuration is missing a `type` tag")]
    MissingTag { capability: &'static str },

    #[error("invalid {capability} `{tag}` configuration: {message}")]
    Validation {
        capability: &'static str,
        tag: String,
        message: String,
    },

    #[error("step `{step}` argument `{argument}` is an unbound placeholder")]
    UnboundPlaceholder { step: String, argument: String },

    #[error("cannot bind argument `{argument}`: {message}")]
    Binding { argument: String, message: String },

    #[error("pipe `{0}` has no steps")]
    EmptyPipe(String),

    #[error("pipeline `{0}` has no pipes")]
    EmptyPipeline(String),

    #[error("pipeline `{0}` not found")]
    PipelineNotFound(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn validation(
        capability: &'static str,
        tag: &str,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Validation {
            capability,
            tag: tag.to_owned(),
            message: message.to_string(),
        }
    }
}

/// Failure raised by a transformer's `transform` call.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{transformer} expected {expected}, found {found}")]
    TypeMismatch {
        transformer: String,
        expected: String,
        found: String,
    },

    #[error("{transformer} failed: {message}")]
    Execution {
        transformer: String,
        message: String,
    },

    #[error("{transformer} IO error: {source}")]
    Io {
        transformer: String,
        source: std::io::Error,
    },
}

impl TransformError {
    pub fn execution(transformer: &str, message: impl Into<String>) -> Self {
        Self::Execution {
            transformer: transformer.to_owned(),
            message: message.into(),
        }
    }

    pub fn io(transformer: &str, source: std::io::Error) -> Self {
        Self::Io {
            transformer: transformer.to_owned(),
            source,
        }
    }
}

/// A manifest source that could not be materialized into a local artifact.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("cache error: {0}")]
    Cache(#[source] std::io::Error),
}

/// Anything that aborts a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pipe `{pipe}` references `{reference}`, which has no output yet")]
    UnresolvedReference { pipe: String, reference: String },

    #[error("pipe `{pipe}` reads the manifest source, but none was supplied")]
    MissingManifestSource { pipe: String },

    #[error("failed to materialize source `{id}`: {source}")]
    Source { id: String, source: SourceError },

    #[error("pipe `{pipe}` step {step} ({transformer}): {source}")]
    Transform {
        pipe: String,
        step: usize,
        transformer: String,
        source: TransformError,
    },
}

impl PipelineError {
    /// Name of the pipe the failure happened in, when it is known.
    #[must_use]
    pub fn pipe(&self) -> Option<&str> {
        match self {
            Self::UnresolvedReference { pipe, .. }
            | Self::MissingManifestSource { pipe }
            | Self::Transform { pipe, .. } => Some(pipe),
            Self::Config(_) | Self::Source { .. } => None,
        }
    }

    #[must_use]
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Transform { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Failure of one manifest entry outside the pipeline itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{stage}: IO error on {path}: {source}")]
    Io {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] crate::archive::ArchiveError),

    #[error("failed to serialize document: {0}")]
    Document(#[from] docflow_document::DocumentError),

    #[error("entry task failed: {0}")]
    Task(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::Pipeline(PipelineError::Config(err))
    }
}
