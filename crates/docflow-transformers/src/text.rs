use std::path::Path;

use docflow_core::{ConfigError, Expect, Input, TransformError, Transformer, TransformerVariant, TypeRegistry};
use docflow_document::{
    CollectionDocument, Document, DocumentKind, PassageDocument, TextDocument,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::arguments;

/// Artifact kinds `read_text` accepts.
pub const TEXT_ARTIFACTS: &[&str] = &["text", "markdown", "html", "xml"];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EchoTextArgs {
    /// Text content of the produced document.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Emits a fixed text document.
#[derive(Debug)]
pub struct EchoText {
    args: EchoTextArgs,
}

impl Transformer for EchoText {
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
        DocumentKind::Text
    }

    fn apply(&self, _inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let mut text = TextDocument::new(self.args.content.clone());
        text.title.clone_from(&self.args.title);
        Ok(Document::new_from(None, self.record(), text))
    }
}

impl TransformerVariant for EchoText {
    const KIND: &'static str = "echo_text";
    const DESCRIPTION: &'static str = "Produce a text document with fixed content";
    type Args = EchoTextArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AppendTextArgs {
    /// Text appended to the input document's content.
    pub suffix: String,
}

#[derive(Debug)]
pub struct AppendText {
    args: AppendTextArgs,
}

impl Transformer for AppendText {
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
        DocumentKind::Text
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let previous = inputs[0].document();
        let content = previous.and_then(Document::as_text).unwrap_or_default();
        let mut text = TextDocument::new(format!("{content}{}", self.args.suffix));
        text.title = previous.and_then(Document::title).map(str::to_owned);
        Ok(Document::new_from(previous, self.record(), text))
    }
}

impl TransformerVariant for AppendText {
    const KIND: &'static str = "append_text";
    const DESCRIPTION: &'static str = "Append a suffix to a text document";
    type Args = AppendTextArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReadTextArgs {
    /// Document title; the artifact's file name when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Reads a text-like artifact verbatim.
#[derive(Debug)]
pub struct ReadText {
    args: ReadTextArgs,
}

impl Transformer for ReadText {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        const INPUTS: &[Expect] = &[Expect::Artifact(TEXT_ARTIFACTS)];
        INPUTS
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Text
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let Some(artifact) = inputs[0].artifact() else {
            return Err(TransformError::execution(Self::KIND, "no artifact supplied"));
        };
        let content = std::fs::read_to_string(&artifact.path)
            .map_err(|e| TransformError::io(Self::KIND, e))?;
        let title = self
            .args
            .title
            .clone()
            .or_else(|| file_name(&artifact.path));
        tracing::debug!(path = %artifact.path.display(), bytes = content.len(), "read text artifact");
        let mut text = TextDocument::new(content);
        text.title = title;
        Ok(Document::new_from(None, self.record(), text))
    }
}

impl TransformerVariant for ReadText {
    const KIND: &'static str = "read_text";
    const DESCRIPTION: &'static str = "Read a text, markdown, html, or xml source as text";
    type Args = ReadTextArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        Ok(Self { args })
    }
}

pub(crate) fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
}

fn default_separator() -> String {
    "\n\n".into()
}

fn default_trim() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SplitPassagesArgs {
    /// Boundary between passages. Defaults to a blank line.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Strip surrounding whitespace from each passage.
    #[serde(default = "default_trim")]
    pub trim: bool,
}

/// Splits a text document into a collection of indexed passages.
///
/// Empty passages are dropped; indices count the passages that remain.
#[derive(Debug)]
pub struct SplitPassages {
    args: SplitPassagesArgs,
}

impl Transformer for SplitPassages {
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
        DocumentKind::Collection
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let previous = inputs[0].document();
        let content = previous.and_then(Document::as_text).unwrap_or_default();
        let passages: Vec<Document> = content
            .split(self.args.separator.as_str())
            .map(|p| if self.args.trim { p.trim() } else { p })
            .filter(|p| !p.is_empty())
            .enumerate()
            .map(|(index, p)| PassageDocument::new(p, Some(index)).into())
            .collect();
        tracing::debug!(passages = passages.len(), "split text");
        let mut collection = CollectionDocument::new(passages);
        collection.title = previous.and_then(Document::title).map(str::to_owned);
        Ok(Document::new_from(previous, self.record(), collection))
    }
}

impl TransformerVariant for SplitPassages {
    const KIND: &'static str = "split_passages";
    const DESCRIPTION: &'static str = "Split text into a collection of passages";
    type Args = SplitPassagesArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        if args.separator.is_empty() {
            return Err(ConfigError::Validation {
                capability: "transformer",
                tag: Self::KIND.into(),
                message: "separator must not be empty".into(),
            });
        }
        Ok(Self { args })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use docflow_core::{Artifact, Transformers};
    use serde_json::json;

    use super::*;

    fn build(kind: &str, args: serde_json::Value) -> Box<dyn Transformer> {
        crate::registry().parse::<Transformers>(kind, args).unwrap()
    }

    fn text(content: &str) -> Document {
        TextDocument::new(content).into()
    }

    #[test]
    fn echo_then_append() {
        let echo = build("echo_text", json!({"content": "hello", "title": "greeting"}));
        let first = echo.transform(&[]).unwrap();
        let append = build("append_text", json!({"suffix": " world"}));
        let second = append.transform(&[Input::Document(&first)]).unwrap();

        assert_eq!(second.as_text(), Some("hello world"));
        assert_eq!(second.title(), Some("greeting"));
        let names: Vec<_> = second.context().transformers().collect();
        assert_eq!(names, vec!["echo_text", "append_text"]);
    }

    #[test]
    fn echo_accepts_explicit_nothing() {
        let echo = build("echo_text", json!({"content": "x"}));
        assert!(echo.transform(&[Input::Nothing]).is_ok());
    }

    #[test]
    fn append_rejects_collection() {
        let append = build("append_text", json!({"suffix": "!"}));
        let input: Document = CollectionDocument::new(Vec::new()).into();
        let err = append.transform(&[Input::Document(&input)]).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn read_text_uses_file_name_as_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes").unwrap();
        let artifact = Artifact {
            kind: "markdown".into(),
            path,
            source_id: "n".into(),
            fingerprint: None,
        };
        let doc = build("read_text", json!({}))
            .transform(&[Input::Artifact(&artifact)])
            .unwrap();
        assert_eq!(doc.as_text(), Some("# Notes"));
        assert_eq!(doc.title(), Some("notes.md"));
        assert_eq!(doc.context().len(), 1);
    }

    #[test]
    fn read_text_rejects_pdf() {
        let artifact = Artifact {
            kind: "pdf".into(),
            path: PathBuf::from("/nowhere/a.pdf"),
            source_id: "a".into(),
            fingerprint: None,
        };
        let err = build("read_text", json!({}))
            .transform(&[Input::Artifact(&artifact)])
            .unwrap_err();
        assert!(err.to_string().contains("text|markdown|html|xml artifact"));
    }

    #[test]
    fn read_text_missing_file_is_io_error() {
        let artifact = Artifact {
            kind: "text".into(),
            path: PathBuf::from("/nowhere/a.txt"),
            source_id: "a".into(),
            fingerprint: None,
        };
        let err = build("read_text", json!({}))
            .transform(&[Input::Artifact(&artifact)])
            .unwrap_err();
        assert!(matches!(err, TransformError::Io { .. }));
    }

    #[test]
    fn split_passages_indexes_non_empty_parts() {
        let split = build("split_passages", json!({}));
        let doc = split
            .transform(&[Input::Document(&text("one\n\n  two  \n\n\n\nthree"))])
            .unwrap();
        let items = doc.as_collection().unwrap();
        let contents: Vec<_> = items.iter().filter_map(Document::as_text).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert!(items.iter().all(|d| d.kind() == DocumentKind::Passage));
        assert_eq!(
            doc.context().last().unwrap().arguments,
            json!({"separator": "\n\n", "trim": true})
        );
    }

    #[test]
    fn split_passages_custom_separator_without_trim() {
        let split = build("split_passages", json!({"separator": "|", "trim": false}));
        let doc = split.transform(&[Input::Document(&text("a| b|"))]).unwrap();
        let contents: Vec<_> = doc
            .as_collection()
            .unwrap()
            .iter()
            .filter_map(Document::as_text)
            .collect();
        assert_eq!(contents, vec!["a", " b"]);
    }

    #[test]
    fn empty_separator_is_rejected() {
        let err = crate::registry()
            .parse::<Transformers>("split_passages", json!({"separator": ""}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
