//! Integration test: compile the repository's `schemas/` directory and
//! validate builder-made events against the resulting registry.

use std::path::PathBuf;
use std::sync::Arc;

use cdev_core::{Event, EventType, FixedClock, SequentialIdGenerator, Timestamp};
use cdev_schema::{
    compile_schemas, write_artifacts, Catalog, EventValidator, FieldKind, JsonRenderer,
    NamingOverrides, SchemaRegistry, BUILTIN_SCHEMAS,
};

/// Find the repository root.
fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn schema_dir() -> PathBuf {
    repo_root().join("schemas")
}

#[test]
fn compiles_every_top_level_schema() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    // schemas/custom/ is a subdirectory and is not walked.
    assert_eq!(index.len(), BUILTIN_SCHEMAS.len());
    assert!(index
        .events()
        .iter()
        .all(|e| e.descriptor.custom.is_none()));
}

#[test]
fn compile_is_deterministic() {
    let first = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    let second = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    assert_eq!(first, second);

    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();
    let written_a = write_artifacts(&first, &JsonRenderer, out_a.path()).unwrap();
    write_artifacts(&second, &JsonRenderer, out_b.path()).unwrap();

    for path in written_a {
        let name = path.file_name().unwrap();
        let a = std::fs::read(&path).unwrap();
        let b = std::fs::read(out_b.path().join(name)).unwrap();
        assert_eq!(a, b, "{} differs between runs", name.to_string_lossy());
    }
}

#[test]
fn id_source_objects_collapse_to_reference() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    let taskrun = &index
        .get("dev.cdevents.taskrun.finished.0.2.0")
        .unwrap()
        .descriptor;

    assert_eq!(taskrun.subject_name, "TaskRun");
    assert_eq!(taskrun.predicate_name, "Finished");
    let names: Vec<&str> = taskrun
        .content_fields
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, ["Errors", "Outcome", "PipelineRun", "TaskName", "Url"]);
    assert_eq!(taskrun.content_fields[2].kind, FieldKind::Reference);
    assert!(taskrun.content_types.is_empty());
}

#[test]
fn other_objects_mint_namespaced_types() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    let testcase = &index
        .get("dev.cdevents.testcaserun.started.0.2.0")
        .unwrap()
        .descriptor;

    let kinds: Vec<(&str, &FieldKind, bool)> = testcase
        .content_fields
        .iter()
        .map(|f| (f.name.as_str(), &f.kind, f.required))
        .collect();
    assert_eq!(kinds.len(), 3);
    assert_eq!(kinds[0], ("Environment", &FieldKind::Reference, true));
    assert_eq!(kinds[1].0, "TestCase");
    assert_eq!(
        kinds[1].1.nested_type_name(),
        Some("TestCaseRunStartedSubjectContentTestCase")
    );
    assert_eq!(kinds[2], ("TestSuiteRun", &FieldKind::Reference, false));

    assert_eq!(testcase.content_types.len(), 1);
    let minted: Vec<&str> = testcase.content_types[0]
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(minted, ["Id", "Name", "Type", "Uri", "Version"]);
}

#[test]
fn empty_content_compiles_to_no_fields() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    let build = &index.get("dev.cdevents.build.queued.0.2.0").unwrap().descriptor;
    assert!(build.content_fields.is_empty());
    assert_eq!(build.subject_type_tag, "build");
}

#[test]
fn without_overrides_compound_subjects_are_not_split() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::new()).unwrap();
    let run = &index
        .get("dev.cdevents.pipelinerun.queued.0.2.0")
        .unwrap()
        .descriptor;
    assert_eq!(run.subject_name, "Pipelinerun");
}

#[test]
fn compiled_directory_backs_a_validator() {
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    let catalog = Catalog::from_compiled(index.events().iter().cloned());
    let registry = Arc::new(SchemaRegistry::new());
    catalog.load_into(&registry).unwrap();
    let validator = EventValidator::new(registry, catalog);

    let ids = SequentialIdGenerator::new("evt");
    let clock = FixedClock(Timestamp::parse("2024-03-01T12:00:00.250+02:00").unwrap());

    let deployed = Event::builder(EventType::parse("dev.cdevents.service.deployed.0.2.0").unwrap())
        .source("/cd/argo")
        .subject_id("svc/checkout")
        .subject_type("service")
        .content_field(
            "environment",
            serde_json::json!({"id": "prod", "source": "/envs"}),
        )
        .content_field("artifactId", "pkg:oci/checkout@sha256:0a1b")
        .build(&ids, &clock)
        .unwrap();
    assert_eq!(deployed.context.id, "evt-1");
    assert_eq!(
        deployed.context.timestamp.to_rfc3339(),
        "2024-03-01T10:00:00.250Z"
    );
    validator.validate(&deployed).unwrap();

    let ticket = Event::builder(EventType::parse("dev.cdevents.ticket.created.0.1.0").unwrap())
        .source("/tracker")
        .subject_id("T-1")
        .subject_type("ticket")
        .content_field("summary", "flaky test")
        .content_field("creator", "bob")
        .build(&ids, &clock)
        .unwrap();
    // `uri` is required.
    assert!(validator.validate(&ticket).is_err());
}

#[test]
fn builtin_validator_matches_compiled_catalog() {
    let validator = EventValidator::with_builtin_schemas().unwrap();
    let index = compile_schemas(&schema_dir(), &NamingOverrides::builtin()).unwrap();
    for event in index.events() {
        let event_type = event.descriptor.event_type().unwrap();
        let catalogued = validator.catalog().lookup(&event_type).unwrap();
        assert_eq!(catalogued.schema_id, event.schema_id);
        assert_eq!(catalogued.compact_schema, event.compact_schema);
    }
}
