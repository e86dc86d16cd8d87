//! Typed document tree with append-only lineage.

pub mod context;
pub mod document;
pub mod error;
pub mod kind;

pub use context::{Context, ContextEntry};
pub use document::{
    CollectionDocument, Document, FormDocument, HtmlDocument, PassageDocument, ResourceDocument,
    TabularDocument, TextDocument, XmlDocument,
};
pub use error::DocumentError;
pub use kind::DocumentKind;
