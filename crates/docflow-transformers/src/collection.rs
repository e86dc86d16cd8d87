use docflow_core::{
    ConfigError, Expect, Input, StepConfig, TransformError, Transformer, TransformerVariant,
    TypeRegistry,
};
use docflow_document::{CollectionDocument, Document, DocumentKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::arguments;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EmptyCollectionArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Seeds an accumulator pipe with an empty collection.
#[derive(Debug)]
pub struct EmptyCollection {
    args: EmptyCollectionArgs,
}

impl Transformer for EmptyCollection {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        &[Expect::Nothing]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Collection
    }

    fn apply(&self, _inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let mut collection = CollectionDocument::new(Vec::new());
        collection.title.clone_from(&self.args.title);
        Ok(Document::new_from(None, self.record(), collection))
    }
}

impl TransformerVariant for EmptyCollection {
    const KIND: &'static str = "empty_collection";
    const DESCRIPTION: &'static str = "Produce an empty collection";
    type Args = EmptyCollectionArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AppendToCollectionArgs {}

/// Appends its second input to the collection given as its first.
#[derive(Debug)]
pub struct AppendToCollection {
    args: AppendToCollectionArgs,
}

impl Transformer for AppendToCollection {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        &[
            Expect::Document(DocumentKind::Collection),
            Expect::AnyDocument,
        ]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Collection
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let (Some(collection), Some(item)) = (inputs[0].document(), inputs[1].document()) else {
            return Err(TransformError::execution(Self::KIND, "missing input document"));
        };
        let mut items = collection.as_collection().unwrap_or_default().to_vec();
        items.push(item.clone());
        let mut appended = CollectionDocument::new(items);
        appended.title = collection.title().map(str::to_owned);
        Ok(Document::new_from(Some(collection), self.record(), appended))
    }
}

impl TransformerVariant for AppendToCollection {
    const KIND: &'static str = "append_to_collection";
    const DESCRIPTION: &'static str = "Append a document to a collection";
    type Args = AppendToCollectionArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ForEachArgs {
    /// Transformer applied to every item; it must take a single document.
    pub step: StepConfig,
}

/// Maps a nested transformer over the items of a collection.
#[derive(Debug)]
pub struct ForEach {
    step: Box<dyn Transformer>,
}

impl Transformer for ForEach {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&ForEachArgs {
            step: StepConfig::from_transformer(self.step.as_ref()),
        })
    }

    fn inputs(&self) -> &[Expect] {
        &[Expect::Document(DocumentKind::Collection)]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Collection
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let Some(collection) = inputs[0].document() else {
            return Err(TransformError::execution(Self::KIND, "missing input document"));
        };
        let items = collection
            .as_collection()
            .unwrap_or_default()
            .iter()
            .map(|item| self.step.transform(&[Input::Document(item)]))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(items = items.len(), step = self.step.kind(), "mapped collection");
        let mut mapped = CollectionDocument::new(items);
        mapped.title = collection.title().map(str::to_owned);
        Ok(Document::new_from(Some(collection), self.record(), mapped))
    }
}

impl TransformerVariant for ForEach {
    const KIND: &'static str = "for_each";
    const DESCRIPTION: &'static str = "Apply a nested transformer to every item of a collection";
    type Args = ForEachArgs;

    fn build(args: Self::Args, registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let step = args.step.build(registry)?;
        let single_document = matches!(
            step.inputs(),
            [Expect::Document(_) | Expect::AnyDocument]
        );
        if !single_document {
            return Err(ConfigError::Validation {
                capability: "transformer",
                tag: Self::KIND.into(),
                message: format!("nested step `{}` must take exactly one document", step.kind()),
            });
        }
        Ok(Self { step })
    }
}
