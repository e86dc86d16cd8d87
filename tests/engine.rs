use std::path::Path;

use docflow_core::{
    Engine, EngineConfig, FailureKind, Manifest, Outcome, PipelineDefinition, load_document,
};
use docflow_document::Document;

const NOTES_PIPELINE: &str = r#"{
    "name": "notes",
    "pipes": [{
        "name": "note",
        "sources": [{"type": "manifest"}],
        "steps": [
            {"type": "read_text"},
            {"type": "append_text", "bind": {"suffix": {"source": "metadata.signature"}}},
            {"type": "write_text", "bind": {
                "directory": "output_directory",
                "filename": {"source": "metadata.file"}
            }}
        ]
    }]
}"#;

fn engine(root: &Path) -> Engine {
    let config = EngineConfig {
        archive: false,
        ..EngineConfig::rooted_at(root)
    };
    Engine::new(docflow_transformers::registry(), config)
        .with_pipelines(vec![PipelineDefinition::from_json(NOTES_PIPELINE).unwrap()])
}

fn manifest(engine: &Engine, json: &str) -> Manifest {
    Manifest::parse(json, engine.registry()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn entries_do_not_share_bindings_or_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine_config = EngineConfig::rooted_at(dir.path());
    engine_config.archive = false;
    engine_config.parallelism = 2;
    let engine = Engine::new(docflow_transformers::registry(), engine_config)
        .with_pipelines(vec![PipelineDefinition::from_json(NOTES_PIPELINE).unwrap()]);

    let manifest = manifest(
        &engine,
        r#"[
            {"type": "text", "id": "first", "pipeline": "notes",
             "location": {"type": "inline", "filename": "a.txt", "content": "alpha"},
             "metadata": {"signature": " -- ann", "file": "note.txt"}},
            {"type": "markdown", "id": "second", "pipeline": "notes",
             "location": {"type": "inline", "filename": "b.md", "content": "beta"},
             "metadata": {"signature": " -- bob", "file": "note.txt"}}
        ]"#,
    );
    let reports = engine.run(&manifest).await;
    assert_eq!(reports.len(), 2);

    let mut outputs = Vec::new();
    for (report, expected) in reports.iter().zip(["alpha -- ann", "beta -- bob"]) {
        let Outcome::Completed {
            document,
            output_dir,
            ..
        } = &report.outcome
        else {
            panic!("{} failed: {:?}", report.id, report.failure());
        };
        let Document::Resource(resource) = document else {
            panic!("expected resource, got {}", document.kind());
        };
        assert_eq!(resource.content, output_dir.join("note.txt"));
        assert_eq!(std::fs::read_to_string(&resource.content).unwrap(), expected);
        assert_eq!(document.context().len(), 3);
        outputs.push(output_dir.clone());
    }
    assert_ne!(outputs[0], outputs[1]);
    assert!(outputs[0].join("document.json").is_file());
    assert!(outputs[1].join("document.json").is_file());
}

#[test]
fn persisted_document_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let manifest = manifest(
        &engine,
        r#"[{"type": "text", "id": "only", "pipeline": "notes",
             "location": {"type": "inline", "filename": "a.txt", "content": "x"},
             "metadata": {"signature": "!", "file": "out.txt"}}]"#,
    );

    let report = engine.run_entry(0, manifest.sources()[0].as_ref());
    let Outcome::Completed { document, output_dir, artifact } = &report.outcome else {
        panic!("entry failed: {:?}", report.failure());
    };
    assert!(artifact.is_none());
    let reloaded = load_document(&output_dir.join("document.json"), engine.registry()).unwrap();
    assert_eq!(&reloaded, document);
}

#[test]
fn missing_binding_field_is_configuration_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let manifest = manifest(
        &engine,
        r#"[{"type": "text", "id": "bare", "pipeline": "notes",
             "location": {"type": "inline", "filename": "a.txt", "content": "x"}}]"#,
    );

    let report = engine.run_entry(0, manifest.sources()[0].as_ref());
    let failure = report.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Configuration);
    assert!(failure.message.contains("metadata.signature"), "{}", failure.message);
}

#[test]
fn csv_through_notes_pipeline_is_type_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let manifest = manifest(
        &engine,
        r#"[{"type": "csv", "id": "rows", "pipeline": "notes",
             "location": {"type": "inline", "filename": "a.csv", "content": "a,b"},
             "metadata": {"signature": "!", "file": "out.txt"}}]"#,
    );

    let report = engine.run_entry(0, manifest.sources()[0].as_ref());
    let failure = report.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::TypeMismatch);
    assert_eq!(failure.stage, "note");
    assert_eq!(failure.step, Some(0));
}

#[test]
fn unwritable_output_is_transformer_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let pipeline = PipelineDefinition::from_json(&format!(
        r#"{{"name": "blocked", "pipes": [{{"name": "out", "sources": [{{"type": "nothing"}}], "steps": [
            {{"type": "echo_text", "arguments": {{"content": "x"}}}},
            {{"type": "write_text", "arguments": {{"directory": {}, "filename": "x.txt"}}}}
        ]}}]}}"#,
        serde_json::json!(blocker.join("nested"))
    ))
    .unwrap();
    let config = EngineConfig {
        archive: false,
        ..EngineConfig::rooted_at(dir.path())
    };
    let engine = Engine::new(docflow_transformers::registry(), config).with_pipelines(vec![pipeline]);
    let manifest = manifest(
        &engine,
        r#"[{"type": "text", "id": "w", "pipeline": "blocked",
             "location": {"type": "inline", "filename": "a.txt", "content": ""}}]"#,
    );

    let report = engine.run_entry(0, manifest.sources()[0].as_ref());
    let failure = report.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::TransformerExecution);
    assert_eq!(failure.stage, "out");
    assert_eq!(failure.step, Some(1));
}

#[test]
fn repeated_local_source_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("shared.txt");
    std::fs::write(&input, "shared").unwrap();
    let engine = engine(dir.path());
    let entry = |id: &str| {
        serde_json::json!({"type": "text", "id": id, "pipeline": "notes",
            "location": {"type": "local", "path": input},
            "metadata": {"signature": "!", "file": "out.txt"}})
    };
    let manifest = manifest(
        &engine,
        &serde_json::json!([entry("before"), entry("after")]).to_string(),
    );

    let first = engine.run_entry(0, manifest.sources()[0].as_ref());
    assert!(first.is_completed(), "{:?}", first.failure());
    std::fs::remove_file(&input).unwrap();
    let second = engine.run_entry(1, manifest.sources()[1].as_ref());

    let Outcome::Completed { document, .. } = &second.outcome else {
        panic!("entry failed: {:?}", second.failure());
    };
    let Document::Resource(resource) = document else {
        panic!("expected resource, got {}", document.kind());
    };
    assert_eq!(std::fs::read_to_string(&resource.content).unwrap(), "shared!");
}

#[tokio::test]
async fn sample_pipelines_run_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let samples = Path::new(env!("CARGO_MANIFEST_DIR"));
    let config = EngineConfig {
        pipelines_dir: samples.join("pipelines"),
        ..EngineConfig::rooted_at(dir.path())
    };
    let engine = Engine::new(docflow_transformers::registry(), config);
    let notes = samples.join("demos/notes.md");
    let manifest = Manifest::parse(
        &serde_json::json!([
            {"type": "text", "id": "hello", "pipeline": "hello_world",
             "location": {"type": "inline", "filename": "empty.txt", "content": ""}},
            {"type": "markdown", "id": "notes", "pipeline": "passages",
             "location": {"type": "local", "path": notes}}
        ])
        .to_string(),
        engine.registry(),
    )
    .unwrap();

    let reports = engine.run(&manifest).await;
    assert!(reports.iter().all(|r| r.is_completed()), "{reports:?}");

    let Outcome::Completed { document, artifact, .. } = &reports[0].outcome else {
        unreachable!();
    };
    let names: Vec<_> = document.context().transformers().collect();
    assert_eq!(names, vec!["echo_text", "append_text", "write_text"]);
    assert!(artifact.as_ref().is_some_and(|a| a.path.is_file()));

    let passages = reports[1].document().and_then(Document::as_collection).unwrap();
    assert_eq!(passages.len(), 3);
}
