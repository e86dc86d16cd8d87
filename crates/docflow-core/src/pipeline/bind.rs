//! Per-entry substitution of `bind` entries into step arguments.

use std::collections::BTreeMap;
use std::mem;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::definition::{Binding, PipelineDefinition, StepConfig};
use crate::error::ConfigError;
use crate::source::Source;

/// Values a manifest entry offers to bindings.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    fields: Map<String, Value>,
    working_dir: PathBuf,
    output_dir: PathBuf,
}

impl BindingContext {
    #[must_use]
    pub fn new(
        fields: Map<String, Value>,
        working_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fields,
            working_dir: working_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn for_source(
        source: &dyn Source,
        working_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(source.fields(), working_dir, output_dir)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Binding` if a source path does not name a field.
    pub fn resolve(&self, argument: &str, binding: &Binding) -> Result<Value, ConfigError> {
        match binding {
            Binding::OutputDirectory => Ok(path_value(&self.output_dir)),
            Binding::WorkingDirectory => Ok(path_value(&self.working_dir)),
            Binding::Source(path) => self.lookup(path).cloned().ok_or_else(|| ConfigError::Binding {
                argument: argument.to_owned(),
                message: format!("source has no field `{path}`"),
            }),
        }
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn path_value(path: &std::path::Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

impl PipelineDefinition {
    /// A copy of this definition with every binding, including those of
    /// nested step configurations, replaced by its value for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Binding` if a binding cannot be resolved.
    pub fn bind(&self, ctx: &BindingContext) -> Result<Self, ConfigError> {
        let mut bound = self.clone();
        for step in bound.pipes.iter_mut().flat_map(|pipe| pipe.steps.iter_mut()) {
            step.bind_in_place(ctx)?;
        }
        Ok(bound)
    }
}

impl StepConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Binding` if a binding cannot be resolved.
    pub fn bind(&self, ctx: &BindingContext) -> Result<Self, ConfigError> {
        let mut bound = self.clone();
        bound.bind_in_place(ctx)?;
        Ok(bound)
    }

    fn bind_in_place(&mut self, ctx: &BindingContext) -> Result<(), ConfigError> {
        for value in self.arguments.values_mut() {
            bind_nested(value, ctx)?;
        }
        apply(mem::take(&mut self.bind), &mut self.arguments, ctx)
    }
}

fn apply(
    bind: BTreeMap<String, Binding>,
    arguments: &mut Map<String, Value>,
    ctx: &BindingContext,
) -> Result<(), ConfigError> {
    for (argument, binding) in bind {
        let value = ctx.resolve(&argument, &binding)?;
        tracing::debug!(%argument, ?binding, "bound argument");
        arguments.insert(argument, value);
    }
    Ok(())
}

/// A nested step configuration is an object with a string `type`, a `bind`
/// map, and at most an `arguments` object besides.
fn is_step_config(map: &Map<String, Value>) -> bool {
    map.get("type").is_some_and(Value::is_string)
        && map.contains_key("bind")
        && map
            .keys()
            .all(|k| matches!(k.as_str(), "type" | "arguments" | "bind"))
}

fn bind_nested(value: &mut Value, ctx: &BindingContext) -> Result<(), ConfigError> {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                bind_nested(child, ctx)?;
            }
            if is_step_config(map) {
                let bind = map.remove("bind").unwrap_or_default();
                let bind: BTreeMap<String, Binding> =
                    serde_json::from_value(bind).map_err(|e| ConfigError::Binding {
                        argument: "bind".into(),
                        message: e.to_string(),
                    })?;
                let arguments = map
                    .entry("arguments")
                    .or_insert_with(|| Value::Object(Map::new()));
                let Value::Object(arguments) = arguments else {
                    return Err(ConfigError::Binding {
                        argument: "arguments".into(),
                        message: "nested step arguments must be an object".into(),
                    });
                };
                apply(bind, arguments, ctx)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                bind_nested(item, ctx)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::definition::{PipeDefinition, PipeSource};

    fn ctx() -> BindingContext {
        let fields = json!({
            "id": "report",
            "type": "pdf",
            "metadata": {"author": "kim", "tags": ["a", "b"]}
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };
        BindingContext::new(fields, "/ws/0000-report/work", "/ws/0000-report/output")
    }

    fn definition(step: StepConfig) -> PipelineDefinition {
        PipelineDefinition {
            name: "p".into(),
            pipes: vec![PipeDefinition {
                name: "a".into(),
                sources: vec![PipeSource::Manifest],
                steps: vec![step],
            }],
        }
    }

    #[test]
    fn resolves_directories_and_fields() {
        let ctx = ctx();
        assert_eq!(
            ctx.resolve("d", &Binding::OutputDirectory).unwrap(),
            "/ws/0000-report/output"
        );
        assert_eq!(
            ctx.resolve("d", &Binding::WorkingDirectory).unwrap(),
            "/ws/0000-report/work"
        );
        assert_eq!(ctx.resolve("a", &Binding::Source("metadata.author".into())).unwrap(), "kim");
        assert_eq!(ctx.resolve("t", &Binding::Source("metadata.tags.1".into())).unwrap(), "b");
    }

    #[test]
    fn unknown_field_is_binding_error() {
        let err = ctx()
            .resolve("title", &Binding::Source("metadata.title".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Binding { ref argument, .. } if argument == "title"));
    }

    #[test]
    fn bind_fills_arguments_and_clears_bind() {
        let def = definition(
            StepConfig::new("write_text", json!({"filename": "out.txt"}))
                .with_binding("directory", Binding::OutputDirectory),
        );
        let bound = def.bind(&ctx()).unwrap();
        let step = &bound.pipes[0].steps[0];
        assert!(step.bind.is_empty());
        assert_eq!(step.arguments["directory"], "/ws/0000-report/output");
        assert_eq!(step.arguments["filename"], "out.txt");
        // original untouched
        assert_eq!(def.pipes[0].steps[0].bind.len(), 1);
    }

    #[test]
    fn bind_recurses_into_nested_steps() {
        let def = definition(StepConfig::new(
            "for_each",
            json!({
                "step": {
                    "type": "write_text",
                    "arguments": {"filename": "p.txt"},
                    "bind": {"directory": "output_directory", "title": {"source": "id"}}
                }
            }),
        ));
        let bound = def.bind(&ctx()).unwrap();
        let nested = &bound.pipes[0].steps[0].arguments["step"];
        assert!(nested.get("bind").is_none());
        assert_eq!(nested["arguments"]["directory"], "/ws/0000-report/output");
        assert_eq!(nested["arguments"]["title"], "report");
        assert_eq!(nested["arguments"]["filename"], "p.txt");
    }

    #[test]
    fn nested_step_without_arguments_gets_them() {
        let def = definition(StepConfig::new(
            "for_each",
            json!({"step": {"type": "echo_text", "bind": {"content": {"source": "id"}}}}),
        ));
        let bound = def.bind(&ctx()).unwrap();
        assert_eq!(
            bound.pipes[0].steps[0].arguments["step"],
            json!({"type": "echo_text", "arguments": {"content": "report"}})
        );
    }

    #[test]
    fn plain_objects_are_left_alone() {
        let args = json!({"mapping": {"type": "x", "bind": "not a step", "other": 1}});
        let def = definition(StepConfig::new("custom", args.clone()));
        let bound = def.bind(&ctx()).unwrap();
        assert_eq!(Value::Object(bound.pipes[0].steps[0].arguments.clone()), args);
    }

    #[test]
    fn entries_do_not_share_bindings() {
        let def = definition(
            StepConfig::new("write_text", json!({"filename": "out.txt"}))
                .with_binding("directory", Binding::OutputDirectory),
        );
        let a = def
            .bind(&BindingContext::new(Map::new(), "/w/a", "/o/a"))
            .unwrap();
        let b = def
            .bind(&BindingContext::new(Map::new(), "/w/b", "/o/b"))
            .unwrap();
        assert_eq!(a.pipes[0].steps[0].arguments["directory"], "/o/a");
        assert_eq!(b.pipes[0].steps[0].arguments["directory"], "/o/b");
    }
}
