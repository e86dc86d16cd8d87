use std::path::{Component, Path, PathBuf};

use docflow_core::{ConfigError, Expect, Input, TransformError, Transformer, TransformerVariant, TypeRegistry};
use docflow_document::{Document, DocumentKind, ResourceDocument};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::arguments;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WriteTextArgs {
    /// Directory the file is written to, usually bound to the entry's output directory.
    pub directory: PathBuf,
    /// Plain file name, no path separators.
    pub filename: String,
}

/// Writes a text document to disk and returns the file as a resource.
#[derive(Debug)]
pub struct WriteText {
    args: WriteTextArgs,
}

impl WriteText {
    fn target(&self) -> PathBuf {
        self.args.directory.join(&self.args.filename)
    }
}

impl Transformer for WriteText {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        &[Expect::Document(DocumentKind::Text)]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Resource
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let previous = inputs[0].document();
        let content = previous.and_then(Document::as_text).unwrap_or_default();
        std::fs::create_dir_all(&self.args.directory)
            .map_err(|e| TransformError::io(Self::KIND, e))?;
        let target = self.target();
        std::fs::write(&target, content).map_err(|e| TransformError::io(Self::KIND, e))?;
        tracing::debug!(path = %target.display(), bytes = content.len(), "wrote text resource");

        let mut resource = ResourceDocument::new(target, Some("text/plain".into()));
        resource.title = previous.and_then(Document::title).map(str::to_owned);
        Ok(Document::new_from(previous, self.record(), resource))
    }
}

impl TransformerVariant for WriteText {
    const KIND: &'static str = "write_text";
    const DESCRIPTION: &'static str = "Write a text document to a file";
    type Args = WriteTextArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let mut components = Path::new(&args.filename).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            return Err(ConfigError::Validation {
                capability: "transformer",
                tag: Self::KIND.into(),
                message: format!("filename `{}` must be a plain file name", args.filename),
            });
        }
        Ok(Self { args })
    }
}

#[cfg(test)]
mod tests {
    use docflow_core::Transformers;
    use docflow_document::TextDocument;
    use serde_json::json;

    use super::*;

    fn build(args: serde_json::Value) -> Result<Box<dyn Transformer>, ConfigError> {
        crate::registry().parse::<Transformers>("write_text", args)
    }

    #[test]
    fn writes_file_and_keeps_lineage() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let write = build(json!({"directory": out, "filename": "hello.txt"})).unwrap();

        let mut text = TextDocument::new("hello world");
        text.title = Some("greeting".into());
        let input: Document = text.into();
        let doc = write.transform(&[Input::Document(&input)]).unwrap();

        let Document::Resource(resource) = &doc else {
            panic!("expected resource, got {}", doc.kind());
        };
        assert_eq!(resource.content, out.join("hello.txt"));
        assert_eq!(resource.media_type.as_deref(), Some("text/plain"));
        assert_eq!(resource.title.as_deref(), Some("greeting"));
        assert_eq!(std::fs::read_to_string(&resource.content).unwrap(), "hello world");
        assert_eq!(doc.context().len(), 1);
    }

    #[test]
    fn filename_with_separator_is_rejected() {
        for name in ["../escape.txt", "a/b.txt", "", "/abs.txt"] {
            let err = build(json!({"directory": "/tmp", "filename": name})).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { .. }), "{name}: {err}");
        }
    }

    #[test]
    fn missing_directory_argument_is_rejected() {
        let err = build(json!({"filename": "x.txt"})).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
