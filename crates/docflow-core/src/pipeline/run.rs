use std::collections::BTreeMap;
use std::path::Path;

use docflow_document::Document;

use super::{Pipe, Pipeline};
use crate::cache::ContentCache;
use crate::error::{ConfigError, PipelineError};
use crate::pipeline::definition::PipeSource;
use crate::source::{Artifact, Source};
use crate::transformer::Input;

/// Per-run state shared by every pipe of one pipeline execution.
#[derive(Debug)]
pub struct RunContext<'a> {
    source: Option<&'a dyn Source>,
    working_dir: &'a Path,
    cache: &'a ContentCache,
    artifact: Option<Artifact>,
}

impl<'a> RunContext<'a> {
    #[must_use]
    pub fn new(working_dir: &'a Path, cache: &'a ContentCache) -> Self {
        Self {
            source: None,
            working_dir,
            cache,
            artifact: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: &'a dyn Source) -> Self {
        self.source = Some(source);
        self
    }

    /// The manifest source's artifact, if it was materialized during this run.
    #[must_use]
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    fn materialize(&mut self, pipe: &str) -> Result<&Artifact, PipelineError> {
        let artifact = match self.artifact.take() {
            Some(artifact) => artifact,
            None => {
                let source = self.source.ok_or_else(|| PipelineError::MissingManifestSource {
                    pipe: pipe.to_owned(),
                })?;
                source
                    .materialize(self.working_dir, self.cache)
                    .map_err(|e| PipelineError::Source {
                        id: source.id().to_owned(),
                        source: e,
                    })?
            }
        };
        Ok(self.artifact.insert(artifact))
    }
}

/// Outcome of [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Output of the last pipe executed.
    pub result: Document,
    /// Latest document per pipe name.
    pub documents: BTreeMap<String, Document>,
}

impl Pipe {
    fn execute(
        &self,
        documents: &BTreeMap<String, Document>,
        ctx: &mut RunContext<'_>,
    ) -> Result<Document, PipelineError> {
        for source in &self.sources {
            if let PipeSource::Pipe { name } = source
                && !documents.contains_key(name)
            {
                return Err(PipelineError::UnresolvedReference {
                    pipe: self.name.clone(),
                    reference: name.clone(),
                });
            }
        }
        let artifact = if self.sources.contains(&PipeSource::Manifest) {
            Some(ctx.materialize(&self.name)?)
        } else {
            None
        };

        let mut inputs = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            inputs.push(match source {
                PipeSource::Manifest => artifact.map_or(Input::Nothing, Input::Artifact),
                PipeSource::Pipe { name } => documents.get(name).map_or(Input::Nothing, Input::Document),
                PipeSource::Nothing => Input::Nothing,
            });
        }

        let mut current: Option<Document> = None;
        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!(pipe = %self.name, step = index, transformer = step.kind(), "running step");
            let produced = match &current {
                None => step.transform(&inputs),
                Some(previous) => step.transform(&[Input::Document(previous)]),
            };
            current = Some(produced.map_err(|source| PipelineError::Transform {
                pipe: self.name.clone(),
                step: index,
                transformer: step.kind().to_owned(),
                source,
            })?);
        }
        current.ok_or_else(|| ConfigError::EmptyPipe(self.name.clone()).into())
    }
}

impl Pipeline {
    /// Execute every pipe in declared order.
    ///
    /// A pipe's output replaces any earlier document stored under the same
    /// name, so repeated names fold results into one accumulator.
    ///
    /// # Errors
    ///
    /// Returns the first `PipelineError` raised; later pipes do not run.
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Result<PipelineRun, PipelineError> {
        let mut documents: BTreeMap<String, Document> = BTreeMap::new();
        let mut last = None;
        for pipe in &self.pipes {
            let span = tracing::info_span!("pipe", pipeline = %self.name, pipe = %pipe.name);
            let _enter = span.enter();
            let document = pipe.execute(&documents, ctx)?;
            tracing::debug!(kind = %document.kind(), context = document.context().len(), "pipe finished");
            documents.insert(pipe.name.clone(), document);
            last = Some(pipe.name.as_str());
        }
        let result = last
            .and_then(|name| documents.get(name))
            .cloned()
            .ok_or_else(|| ConfigError::EmptyPipeline(self.name.clone()))?;
        Ok(PipelineRun { result, documents })
    }
}
