//! Type registry, transformer contract, pipeline execution, and the engine
//! that drives manifest entries through their pipelines.

pub mod archive;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod transformer;

pub use archive::{Archive, ArchiveError};
pub use cache::ContentCache;
pub use config::{Config, EngineConfig};
pub use engine::{Engine, EntryReport, FailureKind, FailureRecord, Outcome, load_document};
pub use error::{ConfigError, EngineError, PipelineError, SourceError, TransformError};
pub use pipeline::{
    Binding, BindingContext, Pipe, PipeDefinition, PipeSource, Pipeline, PipelineDefinition,
    PipelineRun, RunContext, StepConfig,
};
pub use registry::{Capability, Documents, Locations, Sources, Transformers, TypeRegistry, Variant};
pub use source::{Artifact, Destination, Manifest, Source};
pub use transformer::{Expect, Input, Transformer, TransformerVariant};
