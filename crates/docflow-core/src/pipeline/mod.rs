//! Declarative pipelines: named pipes chaining transformers over resolved
//! sources, executed in declared order.

mod bind;
mod definition;
mod run;


pub use bind::BindingContext;
pub use definition::{Binding, PipeDefinition, PipeSource, PipelineDefinition, StepConfig};
pub use run::{PipelineRun, RunContext};

use crate::error::ConfigError;
use crate::registry::TypeRegistry;
use crate::transformer::Transformer;

/// An executable stage: resolved sources fed through a linear chain of steps.
#[derive(Debug)]
pub struct Pipe {
    name: String,
    sources: Vec<PipeSource>,
    steps: Vec<Box<dyn Transformer>>,
}

impl Pipe {
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyPipe` if `steps` is empty.
    pub fn new(
        name: impl Into<String>,
        sources: Vec<PipeSource>,
        steps: Vec<Box<dyn Transformer>>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(ConfigError::EmptyPipe(name));
        }
        Ok(Self {
            name,
            sources,
            steps,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if a step cannot be built or the pipe is empty.
    pub fn build(definition: &PipeDefinition, registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let steps = definition
            .steps
            .iter()
            .map(|step| step.build(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(definition.name.clone(), definition.sources.clone(), steps)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sources(&self) -> &[PipeSource] {
        &self.sources
    }

    #[must_use]
    pub fn steps(&self) -> &[Box<dyn Transformer>] {
        &self.steps
    }

    #[must_use]
    pub fn definition(&self) -> PipeDefinition {
        PipeDefinition {
            name: self.name.clone(),
            sources: self.sources.clone(),
            steps: self
                .steps
                .iter()
                .map(|step| StepConfig::from_transformer(step.as_ref()))
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    name: String,
    pipes: Vec<Pipe>,
}

impl Pipeline {
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyPipeline` if `pipes` is empty.
    pub fn new(name: impl Into<String>, pipes: Vec<Pipe>) -> Result<Self, ConfigError> {
        let name = name.into();
        if pipes.is_empty() {
            return Err(ConfigError::EmptyPipeline(name));
        }
        Ok(Self { name, pipes })
    }

    /// Build executable pipes from a fully bound definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown transformer types, invalid
    /// arguments, leftover bindings, or empty pipes.
    pub fn build(definition: &PipelineDefinition, registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let pipes = definition
            .pipes
            .iter()
            .map(|pipe| Pipe::build(pipe, registry))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(pipeline = %definition.name, pipes = pipes.len(), "built pipeline");
        Self::new(definition.name.clone(), pipes)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    /// The definition this pipeline would be rebuilt from.
    #[must_use]
    pub fn definition(&self) -> PipelineDefinition {
        PipelineDefinition {
            name: self.name.clone(),
            pipes: self.pipes.iter().map(Pipe::definition).collect(),
        }
    }
}
