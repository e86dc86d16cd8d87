use docflow_core::{ConfigError, Expect, Input, TransformError, Transformer, TransformerVariant, TypeRegistry};
use docflow_document::{Document, DocumentKind, TabularDocument};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::arguments;
use crate::text::file_name;

fn default_delimiter() -> char {
    ','
}

fn default_has_headers() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReadTableArgs {
    /// Single ASCII field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Treat the first record as column names.
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
}

/// Parses a CSV artifact into a tabular document.
#[derive(Debug)]
pub struct ReadTable {
    args: ReadTableArgs,
    delimiter: u8,
}

impl Transformer for ReadTable {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn arguments(&self) -> serde_json::Value {
        arguments(&self.args)
    }

    fn inputs(&self) -> &[Expect] {
        &[Expect::Artifact(&["csv"])]
    }

    fn output(&self) -> DocumentKind {
        DocumentKind::Tabular
    }

    fn apply(&self, inputs: &[Input<'_>]) -> Result<Document, TransformError> {
        let Some(artifact) = inputs[0].artifact() else {
            return Err(TransformError::execution(Self::KIND, "no artifact supplied"));
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.args.has_headers)
            .flexible(true)
            .from_path(&artifact.path)
            .map_err(|e| TransformError::execution(Self::KIND, e.to_string()))?;

        let columns = if self.args.has_headers {
            reader
                .headers()
                .map_err(|e| TransformError::execution(Self::KIND, e.to_string()))?
                .iter()
                .map(str::to_owned)
                .collect()
        } else {
            Vec::new()
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| TransformError::execution(Self::KIND, e.to_string()))?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        tracing::debug!(rows = rows.len(), columns = columns.len(), "parsed table");

        let mut table = TabularDocument::new(columns, rows);
        table.title = file_name(&artifact.path);
        Ok(Document::new_from(None, self.record(), table))
    }
}

impl TransformerVariant for ReadTable {
    const KIND: &'static str = "read_table";
    const DESCRIPTION: &'static str = "Parse a CSV source into rows of cells";
    type Args = ReadTableArgs;

    fn build(args: Self::Args, _registry: &TypeRegistry) -> Result<Self, ConfigError> {
        let delimiter = u8::try_from(args.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ConfigError::Validation {
                capability: "transformer",
                tag: Self::KIND.into(),
                message: format!("delimiter {:?} is not a single ASCII character", args.delimiter),
            })?;
        Ok(Self { args, delimiter })
    }
}
