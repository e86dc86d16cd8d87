//! Closed, tagged variant sets for every polymorphic capability.
//!
//! Serialized configuration only names a concrete type through its `type`
//! tag. The registry maps each tag to a parse function so that transformers,
//! sources, locations, and documents can be rebuilt from JSON without the
//! caller knowing the concrete types. Plugins add their variants with
//! [`TypeRegistry::register`] before the first parse.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Arc;

use docflow_document::{
    CollectionDocument, Document, DocumentKind, FormDocument, HtmlDocument, PassageDocument,
    ResourceDocument, TabularDocument, TextDocument, XmlDocument,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::error::ConfigError;
use crate::source::location::Location;
use crate::source::Source;
use crate::transformer::Transformer;

/// A family of interchangeable implementations resolved by `type` tag.
pub trait Capability: Sized + 'static {
    type Object: ?Sized;
    const NAME: &'static str;

    fn slot(registry: &TypeRegistry) -> Option<&VariantSet<Self>>;
    fn slot_mut(registry: &mut TypeRegistry) -> &mut Option<VariantSet<Self>>;
}

pub struct Transformers;
pub struct Sources;
pub struct Locations;
pub struct Documents;

macro_rules! capability {
    ($cap:ty, $object:ty, $name:literal, $field:ident) => {
        impl Capability for $cap {
            type Object = $object;
            const NAME: &'static str = $name;

            fn slot(registry: &TypeRegistry) -> Option<&VariantSet<Self>> {
                registry.$field.as_ref()
            }

            fn slot_mut(registry: &mut TypeRegistry) -> &mut Option<VariantSet<Self>> {
                &mut registry.$field
            }
        }
    };
}

capability!(Transformers, dyn Transformer, "transformer", transformers);
capability!(Sources, dyn Source, "source", sources);
capability!(Locations, dyn Location, "location", locations);
capability!(Documents, Document, "document", documents);

type ParseFn<C> = dyn Fn(serde_json::Value, &TypeRegistry) -> Result<Box<<C as Capability>::Object>, ConfigError>
    + Send
    + Sync;

/// One concrete implementation of a capability.
pub struct Variant<C: Capability> {
    tag: String,
    description: String,
    schema: schemars::Schema,
    parse: Arc<ParseFn<C>>,
}

impl<C: Capability> Variant<C> {
    pub fn new<F>(
        tag: impl Into<String>,
        description: impl Into<String>,
        schema: schemars::Schema,
        parse: F,
    ) -> Self
    where
        F: Fn(serde_json::Value, &TypeRegistry) -> Result<Box<C::Object>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            tag: tag.into(),
            description: description.into(),
            schema,
            parse: Arc::new(parse),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn schema(&self) -> &schemars::Schema {
        &self.schema
    }
}

impl<C: Capability> Clone for Variant<C> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            description: self.description.clone(),
            schema: self.schema.clone(),
            parse: Arc::clone(&self.parse),
        }
    }
}

impl<C: Capability> fmt::Debug for Variant<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("capability", &C::NAME)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// The variants currently loadable for one capability, keyed by tag.
pub struct VariantSet<C: Capability> {
    variants: BTreeMap<String, Variant<C>>,
}

impl<C: Capability> fmt::Debug for VariantSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantSet")
            .field("capability", &C::NAME)
            .field("variants", &self.variants)
            .finish()
    }
}

impl<C: Capability> Default for VariantSet<C> {
    fn default() -> Self {
        Self {
            variants: BTreeMap::new(),
        }
    }
}

impl<C: Capability> VariantSet<C> {
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&Variant<C>> {
        self.variants.get(tag)
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.variants.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant<C>> {
        self.variants.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[derive(Default)]
pub struct TypeRegistry {
    transformers: Option<VariantSet<Transformers>>,
    sources: Option<VariantSet<Sources>>,
    locations: Option<VariantSet<Locations>>,
    documents: Option<VariantSet<Documents>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn tags<C: Capability>(set: Option<&VariantSet<C>>) -> Option<Vec<&str>> {
            set.map(|s| s.tags().collect())
        }
        f.debug_struct("TypeRegistry")
            .field("transformers", &tags(self.transformers.as_ref()))
            .field("sources", &tags(self.sources.as_ref()))
            .field("locations", &tags(self.locations.as_ref()))
            .field("documents", &tags(self.documents.as_ref()))
            .finish()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the document variants and the built-in sources and
    /// locations. Transformers are added by the caller.
    #[must_use]
    pub fn core() -> Self {
        let mut registry = Self::new();
        registry.register(document_variants());
        registry.register(crate::source::builtin());
        registry.register(crate::source::location::builtin());
        registry
    }

    /// Add a module's variants to capability `C`.
    ///
    /// Registering marks the capability as known even when `variants` is
    /// empty. Tags that are already present are skipped, so repeated
    /// registration of the same module is a no-op. Returns the number of
    /// variants actually added.
    pub fn register<C: Capability>(&mut self, variants: impl IntoIterator<Item = Variant<C>>) -> usize {
        let set = C::slot_mut(self).get_or_insert_with(VariantSet::default);
        let mut added = 0;
        for variant in variants {
            if set.contains(&variant.tag) {
                tracing::debug!(capability = C::NAME, tag = %variant.tag, "variant already registered");
                continue;
            }
            set.variants.insert(variant.tag.clone(), variant);
            added += 1;
        }
        tracing::debug!(capability = C::NAME, added, total = set.len(), "registered variants");
        added
    }

    /// # Errors
    ///
    /// Returns `ConfigError::UnregisteredCapability` if nothing was ever
    /// registered for `C`.
    pub fn resolve<C: Capability>(&self) -> Result<&VariantSet<C>, ConfigError> {
        C::slot(self).ok_or(ConfigError::UnregisteredCapability(C::NAME))
    }

    #[must_use]
    pub fn is_registered<C: Capability>(&self) -> bool {
        C::slot(self).is_some()
    }

    /// Build the variant named `tag` from its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability or tag is unknown, or the payload
    /// does not satisfy the variant's schema.
    pub fn parse<C: Capability>(
        &self,
        tag: &str,
        payload: serde_json::Value,
    ) -> Result<Box<C::Object>, ConfigError> {
        let set = self.resolve::<C>()?;
        let variant = set.get(tag).ok_or_else(|| ConfigError::UnknownType {
            capability: C::NAME,
            tag: tag.to_owned(),
            known: set.tags().collect::<Vec<_>>().join(", "),
        })?;
        (variant.parse)(payload, self)
    }

    /// Parse a flat object whose `type` field selects the variant.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingTag` when `value` has no string `type`
    /// field, otherwise the errors of [`TypeRegistry::parse`].
    pub fn parse_tagged<C: Capability>(
        &self,
        value: serde_json::Value,
    ) -> Result<Box<C::Object>, ConfigError> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(ConfigError::MissingTag {
                capability: C::NAME,
            });
        };
        let Some(serde_json::Value::String(tag)) = map.remove("type") else {
            return Err(ConfigError::MissingTag {
                capability: C::NAME,
            });
        };
        self.parse::<C>(&tag, serde_json::Value::Object(map))
    }

    /// Human-readable listing of every registered variant and its parameters.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_set(&mut out, self.transformers.as_ref());
        describe_set(&mut out, self.sources.as_ref());
        describe_set(&mut out, self.locations.as_ref());
        describe_set(&mut out, self.documents.as_ref());
        out
    }
}

fn describe_set<C: Capability>(out: &mut String, set: Option<&VariantSet<C>>) {
    let Some(set) = set else {
        return;
    };
    let _ = writeln!(out, "# {}s", C::NAME);
    for variant in set.iter() {
        let _ = writeln!(out, "## {}", variant.tag);
        if !variant.description.is_empty() {
            let _ = writeln!(out, "{}", variant.description);
        }
        format_schema_params(out, &variant.schema);
        out.push('\n');
    }
}

type SchemaObject = serde_json::Map<String, serde_json::Value>;

/// Nested `$defs` are expanded this many levels below the variant's own arguments.
const MAX_NESTING: usize = 1;

fn format_schema_params(out: &mut String, schema: &schemars::Schema) {
    let Some(root) = schema.as_object() else {
        return;
    };
    if has_properties(root) {
        let _ = writeln!(out, "Parameters:");
        write_params(out, root, root, 0);
    }
}

fn has_properties(schema: &SchemaObject) -> bool {
    schema
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

/// One line per property of `schema`, followed by the properties of any
/// object definition it refers to.
fn write_params(out: &mut String, root: &SchemaObject, schema: &SchemaObject, depth: usize) {
    let Some(props) = schema.get("properties").and_then(serde_json::Value::as_object) else {
        return;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(serde_json::Value::as_array)
        .map(|names| names.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();
    let indent = "    ".repeat(depth);

    for (name, prop) in props {
        let Some(prop) = prop.as_object() else {
            continue;
        };
        let mut line = format!("{indent}  - {name} ({}", type_name(prop));
        line.push_str(if required.contains(&name.as_str()) {
            ", required"
        } else {
            ", optional"
        });
        if let Some(default) = prop.get("default") {
            let _ = write!(line, ", default {default}");
        }
        line.push(')');
        if let Some(description) = prop.get("description").and_then(serde_json::Value::as_str) {
            let _ = write!(line, ": {description}");
        }
        let _ = writeln!(out, "{line}");

        if depth < MAX_NESTING
            && let Some(nested) = referenced(root, prop).filter(|d| has_properties(d))
        {
            write_params(out, root, nested, depth + 1);
        }
    }
}

/// Definition a property points at through `$ref`, directly or as the
/// non-null member of a nullable union.
fn referenced<'a>(root: &'a SchemaObject, prop: &SchemaObject) -> Option<&'a SchemaObject> {
    let reference = prop.get("$ref").and_then(serde_json::Value::as_str).or_else(|| {
        union_members(prop)
            .find_map(|member| member.get("$ref").and_then(serde_json::Value::as_str))
    })?;
    let name = reference.strip_prefix("#/$defs/")?;
    root.get("$defs")?.get(name)?.as_object()
}

fn union_members(prop: &SchemaObject) -> impl Iterator<Item = &SchemaObject> {
    ["anyOf", "oneOf"]
        .into_iter()
        .filter_map(move |key| prop.get(key).and_then(serde_json::Value::as_array))
        .flatten()
        .filter_map(serde_json::Value::as_object)
}

/// Readable type of one property. References read as their definition name,
/// nullable types as their non-null member, arrays as `array of <item>`.
fn type_name(prop: &SchemaObject) -> String {
    if let Some(reference) = prop.get("$ref").and_then(serde_json::Value::as_str) {
        return reference.rsplit('/').next().unwrap_or(reference).to_owned();
    }
    match prop.get("type") {
        Some(serde_json::Value::String(ty)) if ty == "array" => {
            let item = prop
                .get("items")
                .and_then(serde_json::Value::as_object)
                .map_or_else(|| "any".to_owned(), type_name);
            format!("array of {item}")
        }
        Some(serde_json::Value::String(ty)) => ty.clone(),
        Some(serde_json::Value::Array(types)) => types
            .iter()
            .filter_map(serde_json::Value::as_str)
            .filter(|t| *t != "null")
            .collect::<Vec<_>>()
            .join("|"),
        _ => union_members(prop)
            .map(type_name)
            .find(|t| t != "null")
            .unwrap_or_else(|| "any".to_owned()),
    }
}

fn document_variant<T>(kind: DocumentKind, description: &str) -> Variant<Documents>
where
    T: DeserializeOwned + JsonSchema + Into<Document> + 'static,
{
    Variant::new(
        kind.as_str(),
        description,
        schemars::schema_for!(T),
        move |payload, _| {
            let variant: T = serde_json::from_value(payload)
                .map_err(|e| ConfigError::validation(Documents::NAME, kind.as_str(), e))?;
            let document: Document = variant.into();
            Ok(Box::new(document))
        },
    )
}

/// Variants for every [`DocumentKind`].
#[must_use]
pub fn document_variants() -> Vec<Variant<Documents>> {
    vec![
        document_variant::<TextDocument>(DocumentKind::Text, "Plain text"),
        document_variant::<XmlDocument>(DocumentKind::Xml, "XML markup"),
        document_variant::<HtmlDocument>(DocumentKind::Html, "HTML markup"),
        document_variant::<TabularDocument>(DocumentKind::Tabular, "Rows of string cells"),
        document_variant::<PassageDocument>(DocumentKind::Passage, "A passage of a larger text"),
        document_variant::<CollectionDocument>(
            DocumentKind::Collection,
            "Ordered sequence of documents",
        ),
        document_variant::<ResourceDocument>(DocumentKind::Resource, "A file on disk"),
        document_variant::<FormDocument>(DocumentKind::Form, "Key/value record"),
    ]
}
