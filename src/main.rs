use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use docflow_core::{Config, Engine, Manifest, PipelineDefinition, load_document};

const USAGE: &str = "usage: docflow [--config <path>] --manifest <path> [--pipeline <path>]...
       docflow --describe
       docflow --inspect <document.json>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let args: Vec<String> = std::env::args().collect();
    let registry = docflow_transformers::registry();

    if args.iter().any(|a| a == "--describe") {
        print!("{}", registry.describe());
        return Ok(());
    }

    if let Some(path) = flag_value(&args, "--inspect") {
        let document = load_document(Path::new(path), &registry)
            .with_context(|| format!("failed to load document {path}"))?;
        println!("{}", document.to_canonical_json()?);
        return Ok(());
    }

    let Some(manifest_path) = flag_value(&args, "--manifest") else {
        bail!("missing --manifest\n{USAGE}");
    };

    let config_path = resolve_config_path(&args);
    let config = Config::load(&config_path)?;
    config.validate()?;

    let pipelines = flag_values(&args, "--pipeline")
        .into_iter()
        .map(|path| {
            PipelineDefinition::load(Path::new(path))
                .with_context(|| format!("failed to load pipeline {path}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let manifest = Manifest::load(Path::new(manifest_path), &registry)
        .with_context(|| format!("failed to load manifest {manifest_path}"))?;
    tracing::info!(
        config = %config_path.display(),
        entries = manifest.len(),
        pipelines = pipelines.len(),
        "starting run"
    );

    let engine = Engine::new(registry, config.engine).with_pipelines(pipelines);
    let reports = engine.run(&manifest).await;
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports.iter().filter(|r| !r.is_completed()).count();
    if failed > 0 {
        bail!("{failed} of {} entries failed", reports.len());
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect()
}

fn resolve_config_path(args: &[String]) -> PathBuf {
    if let Some(path) = flag_value(args, "--config") {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("DOCFLOW_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
