//! Drives manifest entries through their pipelines and persists the results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docflow_document::Document;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::archive::{Archive, archive_dir};
use crate::cache::ContentCache;
use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError, PipelineError, TransformError};
use crate::pipeline::{BindingContext, Pipeline, PipelineDefinition, RunContext};
use crate::registry::{Documents, TypeRegistry};
use crate::source::{Destination, Manifest, Source};

const DOCUMENT_FILE: &str = "document.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    TypeMismatch,
    UnresolvedReference,
    SourceMaterialization,
    TransformerExecution,
    Io,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::TypeMismatch => "type_mismatch",
            Self::UnresolvedReference => "unresolved_reference",
            Self::SourceMaterialization => "source_materialization",
            Self::TransformerExecution => "transformer_execution",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entry produced no result, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    /// Pipe name, or the engine phase when the failure happened outside a pipe.
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub message: String,
}

impl From<&EngineError> for FailureRecord {
    fn from(err: &EngineError) -> Self {
        let (kind, stage) = match err {
            EngineError::Pipeline(e) => {
                let kind = match e {
                    PipelineError::Config(_) | PipelineError::MissingManifestSource { .. } => {
                        FailureKind::Configuration
                    }
                    PipelineError::UnresolvedReference { .. } => FailureKind::UnresolvedReference,
                    PipelineError::Source { .. } => FailureKind::SourceMaterialization,
                    PipelineError::Transform { source, .. } => match source {
                        TransformError::TypeMismatch { .. } => FailureKind::TypeMismatch,
                        TransformError::Execution { .. } | TransformError::Io { .. } => {
                            FailureKind::TransformerExecution
                        }
                    },
                };
                let stage = match (e.pipe(), e) {
                    (Some(pipe), _) => pipe.to_owned(),
                    (None, PipelineError::Source { .. }) => "source".to_owned(),
                    (None, _) => "build".to_owned(),
                };
                (kind, stage)
            }
            EngineError::Io { stage, .. } => (FailureKind::Io, (*stage).to_owned()),
            EngineError::Archive(_) => (FailureKind::Io, "archive".to_owned()),
            EngineError::Document(_) => (FailureKind::Io, "persist".to_owned()),
            EngineError::Task(_) => (FailureKind::TransformerExecution, "task".to_owned()),
        };
        let step = match err {
            EngineError::Pipeline(e) => e.step(),
            _ => None,
        };
        Self {
            kind,
            stage,
            step,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        document: Document,
        output_dir: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<Archive>,
    },
    Failed(FailureRecord),
}

/// Result of one manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    pub id: String,
    pub pipeline: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl EntryReport {
    fn new(source: &dyn Source, outcome: Outcome) -> Self {
        Self {
            id: source.id().to_owned(),
            pipeline: source.pipeline().to_owned(),
            outcome,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, Outcome::Completed { .. })
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        match &self.outcome {
            Outcome::Completed { document, .. } => Some(document),
            Outcome::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureRecord> {
        match &self.outcome {
            Outcome::Failed(record) => Some(record),
            Outcome::Completed { .. } => None,
        }
    }
}

struct Completed {
    document: Document,
    output_dir: PathBuf,
    artifact: Option<Archive>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<TypeRegistry>,
    config: Arc<EngineConfig>,
    pipelines: Arc<Vec<PipelineDefinition>>,
    cache: ContentCache,
}

impl Engine {
    #[must_use]
    pub fn new(registry: TypeRegistry, config: EngineConfig) -> Self {
        let cache = ContentCache::new(config.cache_dir());
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            pipelines: Arc::new(Vec::new()),
            cache,
        }
    }

    /// Definitions consulted before the pipelines directory.
    #[must_use]
    pub fn with_pipelines(mut self, pipelines: Vec<PipelineDefinition>) -> Self {
        self.pipelines = Arc::new(pipelines);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Look up a definition by name: loaded definitions first, then
    /// `<pipelines_dir>/<name>.json`, then `<pipelines_dir>/<name>.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PipelineNotFound` if no definition matches, or the
    /// error of loading a matching file.
    pub fn find_pipeline(&self, name: &str) -> Result<PipelineDefinition, ConfigError> {
        if let Some(definition) = self.pipelines.iter().find(|p| p.name == name) {
            return Ok(definition.clone());
        }
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(ConfigError::PipelineNotFound(name.to_owned()));
        }
        for ext in ["json", "toml"] {
            let path = self.config.pipelines_dir.join(format!("{name}.{ext}"));
            if path.is_file() {
                tracing::debug!(pipeline = name, path = %path.display(), "loading pipeline definition");
                return PipelineDefinition::load(&path);
            }
        }
        Err(ConfigError::PipelineNotFound(name.to_owned()))
    }

    /// Working root of entry `index`: `<workspace_dir>/<index>-<id>`.
    #[must_use]
    pub fn entry_dir(&self, index: usize, id: &str) -> PathBuf {
        let id: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.config.workspace_dir.join(format!("{index:04}-{id}"))
    }

    /// Process one manifest entry synchronously. Failures are reported, not
    /// returned, so sibling entries are unaffected.
    pub fn run_entry(&self, index: usize, source: &dyn Source) -> EntryReport {
        let span = tracing::info_span!("entry", index, id = %source.id(), pipeline = %source.pipeline());
        let _enter = span.enter();
        tracing::info!("processing entry");

        match self.process(index, source) {
            Ok(completed) => {
                tracing::info!(
                    output_dir = %completed.output_dir.display(),
                    archived = completed.artifact.is_some(),
                    "entry completed"
                );
                EntryReport::new(
                    source,
                    Outcome::Completed {
                        document: completed.document,
                        output_dir: completed.output_dir,
                        artifact: completed.artifact,
                    },
                )
            }
            Err(e) => {
                let record = FailureRecord::from(&e);
                tracing::warn!(kind = %record.kind, stage = %record.stage, "entry failed: {e:#}");
                EntryReport::new(source, Outcome::Failed(record))
            }
        }
    }

    fn process(&self, index: usize, source: &dyn Source) -> Result<Completed, EngineError> {
        let entry_dir = self.entry_dir(index, source.id());
        let working_dir = entry_dir.join("work");
        let output_dir = entry_dir.join("output");
        if entry_dir.exists() {
            std::fs::remove_dir_all(&entry_dir).map_err(io("workspace", &entry_dir))?;
        }
        std::fs::create_dir_all(&working_dir).map_err(io("workspace", &working_dir))?;
        std::fs::create_dir_all(&output_dir).map_err(io("workspace", &output_dir))?;

        let definition = self.find_pipeline(source.pipeline())?;
        let bound = definition.bind(&BindingContext::for_source(source, &working_dir, &output_dir))?;
        let pipeline = Pipeline::build(&bound, &self.registry)?;

        let mut ctx = RunContext::new(&working_dir, &self.cache).with_source(source);
        let run = pipeline.run(&mut ctx)?;

        let document_path = output_dir.join(DOCUMENT_FILE);
        let json = run.result.to_canonical_json()?;
        std::fs::write(&document_path, json).map_err(io("persist", &document_path))?;

        let artifact = if self.config.archive {
            Some(archive_dir(&output_dir, &self.config.artifacts_dir)?)
        } else {
            None
        };

        if let Some(destination) = source.destination() {
            stage(destination, &document_path, artifact.as_ref())?;
        }

        Ok(Completed {
            document: run.result,
            output_dir,
            artifact,
        })
    }

    /// Run every manifest entry, at most `parallelism` at a time.
    ///
    /// Reports are returned in manifest order.
    pub async fn run(&self, manifest: &Manifest) -> Vec<EntryReport> {
        let permits = self.config.parallelism.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut handles = Vec::with_capacity(manifest.len());

        for (index, source) in manifest.sources().iter().enumerate() {
            let engine = self.clone();
            let source = Arc::clone(source);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tokio::task::spawn_blocking(move || engine.run_entry(index, source.as_ref())).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, source) in handles.into_iter().zip(manifest.sources()) {
            let report = match handle.await {
                Ok(Ok(report)) => report,
                Ok(Err(e)) | Err(e) => {
                    let err = EngineError::Task(e.to_string());
                    tracing::warn!(id = %source.id(), "entry task failed: {e}");
                    EntryReport::new(source.as_ref(), Outcome::Failed(FailureRecord::from(&err)))
                }
            };
            reports.push(report);
        }

        let completed = reports.iter().filter(|r| r.is_completed()).count();
        tracing::info!(
            entries = reports.len(),
            completed,
            failed = reports.len() - completed,
            "manifest finished"
        );
        reports
    }
}

fn io<'a>(stage: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> EngineError + 'a {
    move |source| EngineError::Io {
        stage,
        path: path.to_path_buf(),
        source,
    }
}

/// Copy the persisted document and the archive into the destination directory.
fn stage(
    destination: &Destination,
    document_path: &Path,
    artifact: Option<&Archive>,
) -> Result<(), EngineError> {
    let dir = &destination.path;
    std::fs::create_dir_all(dir).map_err(io("stage", dir))?;
    let target = dir.join(DOCUMENT_FILE);
    std::fs::copy(document_path, &target).map_err(io("stage", &target))?;
    if let Some(archive) = artifact {
        let target = dir.join(format!("{}.zip", archive.id));
        std::fs::copy(&archive.path, &target).map_err(io("stage", &target))?;
    }
    tracing::debug!(destination = %dir.display(), "staged outputs");
    Ok(())
}

/// Read a persisted `document.json` back through the registry.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or is not a registered
/// document variant.
pub fn load_document(path: &Path, registry: &TypeRegistry) -> Result<Document, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    let document = registry.parse_tagged::<Documents>(value)?;
    Ok(*document)
}
