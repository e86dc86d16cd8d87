//! The contract every transformation step satisfies.

use std::fmt;

use docflow_document::{ContextEntry, Document, DocumentKind};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, TransformError};
use crate::registry::{Capability, Transformers, TypeRegistry, Variant};
use crate::source::Artifact;

/// One positional input handed to [`Transformer::transform`].
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Document(&'a Document),
    Artifact(&'a Artifact),
    Nothing,
}

impl<'a> Input<'a> {
    #[must_use]
    pub fn document(&self) -> Option<&'a Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&'a Artifact> {
        match self {
            Self::Artifact(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Input<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(d) => write!(f, "{} document", d.kind()),
            Self::Artifact(a) => write!(f, "{} artifact", a.kind),
            Self::Nothing => f.write_str("nothing"),
        }
    }
}

/// Declared shape of one positional input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Document(DocumentKind),
    AnyDocument,
    /// A materialized manifest source of one of the listed kinds; empty accepts any.
    Artifact(&'static [&'static str]),
    Nothing,
}

impl Expect {
    #[must_use]
    pub fn accepts(&self, input: &Input<'_>) -> bool {
        match (self, input) {
            (Self::Document(kind), Input::Document(d)) => d.kind() == *kind,
            (Self::AnyDocument, Input::Document(_)) | (Self::Nothing, Input::Nothing) => true,
            (Self::Artifact(kinds), Input::Artifact(a)) => {
                kinds.is_empty() || kinds.iter().any(|k| *k == a.kind)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(kind) => write!(f, "{kind} document"),
            Self::AnyDocument => f.write_str("any document"),
            Self::Artifact([]) => f.write_str("any artifact"),
            Self::Artifact(kinds) => write!(f, "{} artifact", kinds.join("|")),
            Self::Nothing => f.write_str("nothing"),
        }
    }
}

/// A single typed conversion step.
///
/// Implementations provide [`Transformer::apply`]; callers go through
/// [`Transformer::transform`], which checks the inputs against
/// [`Transformer::inputs`] before running and the result against
/// [`Transformer::output`] afterwards.
pub trait Transformer: Send + Sync + fmt::Debug {
    /// Discriminator tag, also the identity recorded in document context.
    fn kind(&self) -> &str;

    /// Bound arguments, serialized the way they appear in a pipeline definition.
    fn arguments(&self) -> serde_json::Value;

    fn inputs(&self) -> &[Expect];

    fn output(&self) -> DocumentKind;

    /// Variant-specific conversion. Inputs are already type-checked.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` when the conversion itself fails.
    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError>;

    fn record(&self) -> ContextEntry {
        ContextEntry::new(self.kind(), self.arguments())
    }

    /// # Errors
    ///
    /// Returns `TransformError::TypeMismatch` if an input or the produced
    /// document does not match the declared types, or any error from `apply`.
    fn transform(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        check_inputs(self.kind(), self.inputs(), inputs)?;
        let document = self.apply(inputs)?;
        if document.kind() != self.output() {
            return Err(TransformError::TypeMismatch {
                transformer: self.kind().to_owned(),
                expected: format!("to produce a {} document", self.output()),
                found: document.kind().to_string(),
            });
        }
        Ok(document)
    }
}

fn check_inputs(
    transformer: &str,
    expected: &[Expect],
    inputs: &[Input<'_>],
) -> Result<(), TransformError> {
    if inputs.is_empty() && expected.iter().all(|e| *e == Expect::Nothing) {
        return Ok(());
    }
    if inputs.len() != expected.len() {
        return Err(TransformError::TypeMismatch {
            transformer: transformer.to_owned(),
            expected: list(expected),
            found: list(inputs),
        });
    }
    for (position, (expect, input)) in expected.iter().zip(inputs).enumerate() {
        if !expect.accepts(input) {
            return Err(TransformError::TypeMismatch {
                transformer: transformer.to_owned(),
                expected: format!("{expect} at input {position}"),
                found: input.to_string(),
            });
        }
    }
    Ok(())
}

fn list<T: fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// A transformer that can be built from a typed, schema-validated argument record.
pub trait TransformerVariant: Transformer + Sized + 'static {
    const KIND: &'static str;
    const DESCRIPTION: &'static str;

    type Args: DeserializeOwned + JsonSchema;

    /// # Errors
    ///
    /// Returns `ConfigError` if the arguments are semantically invalid or a
    /// nested step cannot be built.
    fn build(args: Self::Args, registry: &TypeRegistry) -> Result<Self, ConfigError>;
}

impl Variant<Transformers> {
    /// Registry entry for `T`: schema from `T::Args`, parse through serde.
    ///
    /// Unknown or missing required argument fields fail with
    /// `ConfigError::Validation`.
    #[must_use]
    pub fn transformer<T: TransformerVariant>() -> Self {
        Variant::new(
            T::KIND,
            T::DESCRIPTION,
            schemars::schema_for!(T::Args),
            |payload, registry| {
                let args: T::Args = serde_json::from_value(payload)
                    .map_err(|e| ConfigError::validation(Transformers::NAME, T::KIND, e))?;
                let transformer: Box<dyn Transformer> = Box::new(T::build(args, registry)?);
                Ok(transformer)
            },
        )
    }
}
