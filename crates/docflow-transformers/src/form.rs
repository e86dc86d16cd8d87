use docflow_core::{ConfigError, Expect, Input, TransformError, Transformer, TransformerVariant, TypeRegistry};
use docflow_document::{Document, DocumentKind, FormDocument};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::arguments;
use crate::text::file_name;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReadFormArgs {}

/// Reads a JSON object artifact as a key/value form.
#[derive(Debug)]
pub struct ReadForm {
    args: ReadFormArgs,
}

impl Transformer for ReadForm {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        &[Expect::Artifact(&["json"])]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Form
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let Some(artifact) = inputs[0].artifact() else {
            return Err(TransformError::execution(Self::KIND, "no artifact supplied"));
        };
        let content =
            std::fs::read_to_string(&artifact.path).map_err(|e| TransformError::io(Self::KIND, e))?;
        let serde_json::Value::Object(fields) = serde_json::from_str::<serde_json::Value>(&content)
            .map_err(|e| TransformError::execution(Self::KIND, e.to_string()))?
        else {
            return Err(TransformError::execution(
                Self::KIND,
                "expected a JSON object at the top level",
            ));
        };
        let mut form = FormDocument::new(fields.into_iter().collect());
        form.title = file_name(&artifact.path);
        Ok(Document::new_from(None, self.record(), form))
    }
}

impl TransformerVariant for ReadForm {
    const KIND: &'static str = "read_form";
    const DESCRIPTION: &'static str = "Read a JSON object source as a form";
    type Args = ReadFormArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}
