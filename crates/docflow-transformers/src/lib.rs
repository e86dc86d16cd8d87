//! Built-in transformers: text, tables, forms, collections, and file output.

pub mod collection;
pub mod form;
pub mod resource;
pub mod table;
pub mod text;

pub use collection::{AppendToCollection, EmptyCollection, ForEach};
pub use form::ReadForm;
pub use resource::WriteText;
pub use table::ReadTable;
pub use text::{AppendText, EchoText, ReadText, SplitPassages, TEXT_ARTIFACTS};

use docflow_core::{Transformers, TypeRegistry, Variant};
use serde::Serialize;

/// Serialize a transformer's argument record for its context entry.
pub(crate) fn arguments<T: Serialize>(args: &T) -> serde_json::Value {
    serde_json::to_value(args).unwrap_or_default()
}

/// Registry variants for every transformer in this crate.
#[must_use]
pub fn builtin() -> Vec<Variant<Transformers>> {
    vec![
        Variant::transformer::<EchoText>(),
        Variant::transformer::<AppendText>(),
        Variant::transformer::<ReadText>(),
        Variant::transformer::<SplitPassages>(),
        Variant::transformer::<ReadTable>(),
        Variant::transformer::<ReadForm>(),
        Variant::transformer::<EmptyCollection>(),
        Variant::transformer::<AppendToCollection>(),
        Variant::transformer::<ForEach>(),
        Variant::transformer::<WriteText>(),
    ]
}

/// Core registry with the built-in transformers added.
#[must_use]
pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::core();
    registry.register(builtin());
    registry
}
