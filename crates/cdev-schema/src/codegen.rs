//! # Event Compiler
//!
//! Batch orchestration over a directory of event schemas:
//!
//! 1. List the directory, keep regular files with the `.json` extension,
//!    and sort them by file name.
//! 2. Index every `.json` file in the directory tree, subdirectories
//!    included, by its `$id`, so that event schemas can `$ref` shared
//!    definitions such as `links/embeddedlinksarray.json`.
//! 3. Parse each event file into a [`SchemaDocument`], infer its
//!    [`EventTypeDescriptor`], and pair the descriptor with the schema's
//!    `$id` and compact text as a [`CompiledEvent`].
//! 4. Collect everything into an [`EventIndex`].
//!
//! The first failing schema aborts the batch. Nothing is written until
//! every schema compiled.
//!
//! Rendering goes through the [`Renderer`] trait. [`JsonRenderer`] emits
//! one descriptor document per event plus an `index.json`; source-code
//! templates can plug in at the same seam.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::SchemaDocument;
use crate::error::CodegenError;
use crate::infer::{infer, EventTypeDescriptor};
use crate::naming::NamingOverrides;
use crate::registry::{LocalSchemaRetriever, RegistryError, SchemaRegistry};

/// Extension (without the dot) of files picked up by [`compile_schemas`].
pub const SCHEMA_FILE_EXTENSION: &str = "json";

/// File name of the aggregate artifact written by [`JsonRenderer`].
pub const INDEX_FILE_NAME: &str = "index.json";

/// One compiled schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledEvent {
    /// Inferred type descriptor.
    pub descriptor: EventTypeDescriptor,
    /// Source file name, or the label passed to [`compile_schema_str`].
    pub file_name: String,
    /// The schema's `$id`.
    pub schema_id: String,
    /// Whitespace-free schema text with sorted keys, embedded by generated
    /// code so events can register their own schema.
    pub compact_schema: String,
}

impl CompiledEvent {
    /// Base name of the per-event artifact: `<subject>_<predicate>`, with a
    /// `<custom>-` prefix for custom types.
    pub fn artifact_stem(&self) -> String {
        let d = &self.descriptor;
        match &d.custom {
            Some(custom) => format!("{custom}-{}_{}", d.subject, d.predicate),
            None => format!("{}_{}", d.subject, d.predicate),
        }
    }

    /// Register the embedded schema under its `$id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidSchema`] if the registry rejects it.
    pub fn register_into(&self, registry: &SchemaRegistry) -> Result<(), RegistryError> {
        registry.register(self.schema_id.clone(), self.compact_schema.as_bytes())
    }
}

/// Compile one already-parsed schema.
///
/// # Errors
///
/// Any [`CodegenError`] from inference, or
/// [`CodegenError::MissingProperty`] when the schema has no `$id`.
pub fn compile_document(
    document: &SchemaDocument,
    overrides: &NamingOverrides,
) -> Result<CompiledEvent, CodegenError> {
    let descriptor = infer(document, overrides)?;
    let schema_id = document
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CodegenError::MissingProperty {
            location: document.location().to_string(),
            pointer: "/$id".to_string(),
        })?
        .to_string();

    Ok(CompiledEvent {
        descriptor,
        file_name: document.location().to_string(),
        schema_id,
        compact_schema: document.compact(),
    })
}

/// Compile schema text. `location` labels errors.
///
/// # Errors
///
/// See [`SchemaDocument::parse`] and [`compile_document`].
pub fn compile_schema_str(
    location: &str,
    text: &str,
    overrides: &NamingOverrides,
) -> Result<CompiledEvent, CodegenError> {
    let document = SchemaDocument::parse(location, text)?;
    compile_document(&document, overrides)
}

fn read_schema_text(path: &Path) -> Result<String, CodegenError> {
    std::fs::read_to_string(path).map_err(|source| CodegenError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and compile one schema file. The file name labels errors.
///
/// # Errors
///
/// [`CodegenError::Io`] if the file cannot be read, otherwise as
/// [`compile_schema_str`].
pub fn compile_schema_file(
    path: &Path,
    overrides: &NamingOverrides,
) -> Result<CompiledEvent, CodegenError> {
    let text = read_schema_text(path)?;
    compile_schema_str(&file_label(path), &text, overrides)
}

/// Compile every schema file directly inside `dir`.
///
/// Subdirectories and files without the [`SCHEMA_FILE_EXTENSION`] are
/// not compiled as events, but every `.json` file in the tree is
/// available as a `$ref` target by its `$id`. Files are compiled in
/// file-name order.
///
/// # Errors
///
/// The first [`CodegenError`] encountered, including a file in the tree
/// that is not JSON. No partial index is returned.
pub fn compile_schemas(
    dir: &Path,
    overrides: &NamingOverrides,
) -> Result<EventIndex, CodegenError> {
    let io_err = |source| CodegenError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() || !has_schema_extension(&path) {
            tracing::debug!(path = %path.display(), "skipping non-schema entry");
            continue;
        }
        paths.push(path);
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut refs = LocalSchemaRetriever::default();
    index_schema_tree(dir, &mut refs)?;
    tracing::debug!(dir = %dir.display(), uris = refs.len(), "indexed schema tree");

    let mut index = EventIndex::default();
    for path in &paths {
        let text = read_schema_text(path)?;
        let document = SchemaDocument::parse_with(file_label(path), &text, refs.clone())?;
        let compiled = compile_document(&document, overrides)?;
        tracing::debug!(
            path = %path.display(),
            event_type = %compiled.descriptor.type_string,
            fields = compiled.descriptor.content_fields.len(),
            "compiled event schema"
        );
        index.push(compiled)?;
    }

    tracing::info!(
        dir = %dir.display(),
        events = index.len(),
        "compiled event schemas"
    );
    Ok(index)
}

/// Add every `.json` file under `dir` that declares a `$id` to `refs`.
fn index_schema_tree(dir: &Path, refs: &mut LocalSchemaRetriever) -> Result<(), CodegenError> {
    let io_err = |source| CodegenError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            index_schema_tree(&path, refs)?;
            continue;
        }
        if !path.is_file() || !has_schema_extension(&path) {
            continue;
        }
        let text = read_schema_text(&path)?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| CodegenError::InvalidJson {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if let Some(id) = value.get("$id").and_then(serde_json::Value::as_str) {
            refs.insert(id.to_string(), &value);
        }
    }
    Ok(())
}

fn has_schema_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SCHEMA_FILE_EXTENSION)
}

/// The ordered output of one batch compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIndex {
    events: Vec<CompiledEvent>,
    by_artifact: BTreeMap<String, usize>,
}

impl EventIndex {
    /// Append a compiled event.
    ///
    /// # Errors
    ///
    /// [`CodegenError::DuplicateArtifact`] if an event with the same
    /// artifact name is already present.
    pub fn push(&mut self, event: CompiledEvent) -> Result<(), CodegenError> {
        let stem = event.artifact_stem();
        if let Some(&existing) = self.by_artifact.get(&stem) {
            return Err(CodegenError::DuplicateArtifact {
                location: event.file_name,
                artifact: format!("{stem}.json"),
                first: self.events[existing].file_name.clone(),
            });
        }
        self.by_artifact.insert(stem, self.events.len());
        self.events.push(event);
        Ok(())
    }

    /// Compiled events in compile order.
    pub fn events(&self) -> &[CompiledEvent] {
        &self.events
    }

    /// Number of compiled events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event with the given full type string.
    pub fn get(&self, type_string: &str) -> Option<&CompiledEvent> {
        self.events
            .iter()
            .find(|e| e.descriptor.type_string == type_string)
    }

    /// One summary row per event, in compile order.
    pub fn entries(&self) -> Vec<IndexEntry<'_>> {
        self.events
            .iter()
            .map(|e| IndexEntry {
                event_type: &e.descriptor.type_string,
                subject_name: &e.descriptor.subject_name,
                predicate_name: &e.descriptor.predicate_name,
                schema_id: &e.schema_id,
                source_file: &e.file_name,
                artifact: format!("{}.json", e.artifact_stem()),
            })
            .collect()
    }
}

/// A row of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry<'a> {
    /// Full type string.
    #[serde(rename = "type")]
    pub event_type: &'a str,
    /// Resolved subject name.
    pub subject_name: &'a str,
    /// Resolved predicate name.
    pub predicate_name: &'a str,
    /// Schema `$id`.
    pub schema_id: &'a str,
    /// Schema file the event was compiled from.
    pub source_file: &'a str,
    /// Per-event artifact file name.
    pub artifact: String,
}

/// A rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name relative to the output directory.
    pub file_name: String,
    /// File contents.
    pub contents: String,
}

/// Turns compiled events into output artifacts.
pub trait Renderer {
    /// Render the artifact for one event.
    fn render_event(&self, event: &CompiledEvent) -> Result<Artifact, CodegenError>;

    /// Render the aggregate artifact for the whole batch.
    fn render_index(&self, index: &EventIndex) -> Result<Artifact, CodegenError>;
}

/// Writes descriptors as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    fn to_json<T: Serialize>(value: &T, artifact: &str) -> Result<String, CodegenError> {
        let mut text = serde_json::to_string_pretty(value).map_err(|e| CodegenError::Render {
            artifact: artifact.to_string(),
            reason: e.to_string(),
        })?;
        text.push('\n');
        Ok(text)
    }
}

impl Renderer for JsonRenderer {
    fn render_event(&self, event: &CompiledEvent) -> Result<Artifact, CodegenError> {
        let file_name = format!("{}.json", event.artifact_stem());
        let contents = Self::to_json(event, &file_name)?;
        Ok(Artifact {
            file_name,
            contents,
        })
    }

    fn render_index(&self, index: &EventIndex) -> Result<Artifact, CodegenError> {
        #[derive(Serialize)]
        struct IndexDocument<'a> {
            events: Vec<IndexEntry<'a>>,
        }

        let contents = Self::to_json(
            &IndexDocument {
                events: index.entries(),
            },
            INDEX_FILE_NAME,
        )?;
        Ok(Artifact {
            file_name: INDEX_FILE_NAME.to_string(),
            contents,
        })
    }
}

/// Render every event and the index, then write them under `output_dir`.
///
/// All artifacts are rendered before the first write, so a render failure
/// leaves the output directory untouched.
///
/// # Errors
///
/// [`CodegenError::Render`] or [`CodegenError::Io`].
pub fn write_artifacts(
    index: &EventIndex,
    renderer: &dyn Renderer,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, CodegenError> {
    let mut artifacts = index
        .events()
        .iter()
        .map(|event| renderer.render_event(event))
        .collect::<Result<Vec<_>, _>>()?;
    artifacts.push(renderer.render_index(index)?);

    std::fs::create_dir_all(output_dir).map_err(|source| CodegenError::Io {
        path: output_dir.display().to_string(),
        source,
    })?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = output_dir.join(&artifact.file_name);
        std::fs::write(&path, artifact.contents).map_err(|source| CodegenError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        written.push(path);
    }

    tracing::info!(
        output_dir = %output_dir.display(),
        artifacts = written.len(),
        "wrote compile artifacts"
    );
    Ok(written)
}
