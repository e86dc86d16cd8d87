use std::collections::BTreeMap;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Context, ContextEntry, DocumentError, DocumentKind};

/// Generates a match over all `Document` variants, binding the inner record
/// and evaluating the given expression for each arm.
macro_rules! delegate_document {
    ($self:expr, |$d:ident| $expr:expr) => {
        match $self {
            Document::Text($d) => $expr,
            Document::Xml($d) => $expr,
            Document::Html($d) => $expr,
            Document::Tabular($d) => $expr,
            Document::Passage($d) => $expr,
            Document::Collection($d) => $expr,
            Document::Resource($d) => $expr,
            Document::Form($d) => $expr,
        }
    };
}

/// A content-bearing result flowing between pipeline stages.
///
/// Serialized with an internal `"type"` discriminator, e.g.
/// `{"type": "text", "content": "hello", "context": []}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    Text(TextDocument),
    Xml(XmlDocument),
    Html(HtmlDocument),
    Tabular(TabularDocument),
    Passage(PassageDocument),
    Collection(CollectionDocument),
    Resource(ResourceDocument),
    Form(FormDocument),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TextDocument {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct XmlDocument {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HtmlDocument {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

/// Rows of cells. `columns` holds the header row when the source had one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TabularDocument {
    pub content: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PassageDocument {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

/// Ordered sequence of child documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CollectionDocument {
    pub content: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

/// A file written by a transformer, usually inside the run's output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ResourceDocument {
    pub content: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FormDocument {
    pub content: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Context,
}

impl TextDocument {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            context: Context::new(),
        }
    }
}

impl XmlDocument {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            context: Context::new(),
        }
    }
}

impl HtmlDocument {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            context: Context::new(),
        }
    }
}

impl TabularDocument {
    #[must_use]
    pub fn new(columns: Vec<String>, content: Vec<Vec<String>>) -> Self {
        Self {
            content,
            columns,
            title: None,
            context: Context::new(),
        }
    }
}

impl PassageDocument {
    #[must_use]
    pub fn new(content: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            content: content.into(),
            index,
            title: None,
            context: Context::new(),
        }
    }
}

impl CollectionDocument {
    #[must_use]
    pub fn new(content: Vec<Document>) -> Self {
        Self {
            content,
            title: None,
            context: Context::new(),
        }
    }
}

impl ResourceDocument {
    #[must_use]
    pub fn new(content: impl Into<PathBuf>, media_type: Option<String>) -> Self {
        Self {
            content: content.into(),
            media_type,
            title: None,
            context: Context::new(),
        }
    }
}

impl FormDocument {
    #[must_use]
    pub fn new(content: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            content,
            title: None,
            context: Context::new(),
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Document {
                fn from(d: $ty) -> Self {
                    Self::$variant(d)
                }
            }
        )*
    };
}

impl_from_variant!(
    Text(TextDocument),
    Xml(XmlDocument),
    Html(HtmlDocument),
    Tabular(TabularDocument),
    Passage(PassageDocument),
    Collection(CollectionDocument),
    Resource(ResourceDocument),
    Form(FormDocument),
);

impl Document {
    /// Build `document` as the successor of `predecessor`.
    ///
    /// The result's context is the predecessor's context (empty when there is
    /// none) followed by `entry`. The predecessor is only read.
    #[must_use]
    pub fn new_from(
        predecessor: Option<&Document>,
        entry: ContextEntry,
        document: impl Into<Document>,
    ) -> Self {
        let mut document = document.into();
        let context = match predecessor {
            Some(prev) => prev.context().appended(entry),
            None => Context::new().appended(entry),
        };
        *document.context_mut() = context;
        document
    }

    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Text(_) => DocumentKind::Text,
            Self::Xml(_) => DocumentKind::Xml,
            Self::Html(_) => DocumentKind::Html,
            Self::Tabular(_) => DocumentKind::Tabular,
            Self::Passage(_) => DocumentKind::Passage,
            Self::Collection(_) => DocumentKind::Collection,
            Self::Resource(_) => DocumentKind::Resource,
            Self::Form(_) => DocumentKind::Form,
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        delegate_document!(self, |d| d.title.as_deref())
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        delegate_document!(self, |d| &d.context)
    }

    fn context_mut(&mut self) -> &mut Context {
        delegate_document!(self, |d| &mut d.context)
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let slot = delegate_document!(&mut self, |d| &mut d.title);
        *slot = Some(title.into());
        self
    }

    /// String content of the text-like variants (text, xml, html, passage).
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(d) => Some(&d.content),
            Self::Xml(d) => Some(&d.content),
            Self::Html(d) => Some(&d.content),
            Self::Passage(d) => Some(&d.content),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_collection(&self) -> Option<&[Document]> {
        match self {
            Self::Collection(d) => Some(&d.content),
            _ => None,
        }
    }

    /// Structured dump with recursively sorted keys.
    ///
    /// # Errors
    ///
    /// Returns an error if a field fails to serialize.
    pub fn to_canonical_value(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(sort_keys(serde_json::to_value(self)?))
    }

    /// Pretty-printed canonical dump used for on-disk persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if a field fails to serialize.
    pub fn to_canonical_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.to_canonical_value()?)?)
    }

    /// # Errors
    ///
    /// Returns an error if `json` is not a valid document.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str) -> ContextEntry {
        ContextEntry::new(name, json!({"n": name}))
    }

    fn samples() -> Vec<Document> {
        let text = Document::new_from(None, entry("echo_text"), TextDocument::new("hello"));
        let mut form = BTreeMap::new();
        form.insert("name".to_owned(), json!("Ada"));
        form.insert("age".to_owned(), json!(36));
        vec![
            text.clone(),
            XmlDocument::new("<a/>").into(),
            HtmlDocument::new("<p>x</p>").into(),
            Document::from(TabularDocument::new(
                vec!["a".into(), "b".into()],
                vec![vec!["1".into(), "2".into()]],
            ))
            .with_title("table"),
            PassageDocument::new("para", Some(3)).into(),
            CollectionDocument::new(vec![text, PassageDocument::new("p", None).into()]).into(),
            ResourceDocument::new("/tmp/out.txt", Some("text/plain".into())).into(),
            FormDocument::new(form).into(),
        ]
    }

    #[test]
    fn every_variant_roundtrips() {
        for doc in samples() {
            let json = doc.to_canonical_json().unwrap();
            let parsed = Document::from_json(&json).unwrap();
            assert_eq!(parsed, doc, "roundtrip failed for {}", doc.kind());
        }
    }

    #[test]
    fn serialized_type_tag_matches_kind() {
        for doc in samples() {
            let value = doc.to_canonical_value().unwrap();
            assert_eq!(value["type"], doc.kind().as_str());
        }
    }

    #[test]
    fn new_from_without_predecessor_starts_context() {
        let doc = Document::new_from(None, entry("a"), TextDocument::new("x"));
        assert_eq!(doc.context().len(), 1);
        assert_eq!(doc.context().last().unwrap().transformer, "a");
    }

    #[test]
    fn new_from_extends_predecessor_context() {
        let first = Document::new_from(None, entry("a"), TextDocument::new("x"));
        let second = Document::new_from(Some(&first), entry("b"), TextDocument::new("y"));

        assert_eq!(first.context().len(), 1);
        assert_eq!(second.context().len(), 2);
        assert!(first.context().is_prefix_of(second.context()));
        assert_eq!(
            second.context().transformers().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn new_from_replaces_stray_context_on_successor() {
        let stray = Document::new_from(None, entry("stray"), TextDocument::new("z"));
        let doc = Document::new_from(None, entry("a"), stray);
        assert_eq!(doc.context().transformers().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let doc: Document = TextDocument::new("hi").into();
        let json = doc.to_canonical_json().unwrap();
        let content = json.find("\"content\"").unwrap();
        let context = json.find("\"context\"").unwrap();
        let ty = json.find("\"type\"").unwrap();
        assert!(content < context && context < ty, "{json}");
    }

    #[test]
    fn text_accessors() {
        let doc: Document = PassageDocument::new("body", Some(0)).into();
        assert_eq!(doc.as_text(), Some("body"));
        assert!(doc.as_collection().is_none());
        assert!(doc.title().is_none());
        assert_eq!(doc.with_title("t").title(), Some("t"));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let err = Document::from_json(r#"{"type": "text", "content": "x", "bogus": 1}"#);
        assert!(err.is_err());
        let nested = Document::from_json(
            r#"{"type": "collection", "content": [{"type": "passage", "content": "p", "page": 2}]}"#,
        );
        assert!(nested.is_err());
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = Document::from_json(r#"{"type": "spreadsheet", "content": ""}"#);
        assert!(err.is_err());
    }

    mod proptest_context {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn new_from_grows_context_by_one(
                names in proptest::collection::vec("[a-z_]{1,12}", 0..8),
                next in "[a-z_]{1,12}",
                content in ".{0,32}",
            ) {
                let mut doc: Document = TextDocument::new("seed").into();
                for name in &names {
                    doc = Document::new_from(Some(&doc), entry(name), TextDocument::new("step"));
                }
                let derived = Document::new_from(
                    Some(&doc),
                    entry(&next),
                    TextDocument::new(content.clone()),
                );

                prop_assert_eq!(derived.context().len(), doc.context().len() + 1);
                prop_assert!(doc.context().is_prefix_of(derived.context()));
                prop_assert_eq!(&derived.context().last().unwrap().transformer, &next);
                prop_assert_eq!(derived.as_text(), Some(content.as_str()));
            }
        }
    }
}
