//! # Generator Module
//!
//! Turns validated [`ServiceSpec`]s into Rust source and writes it next to
//! the annotated trait.
//!
//! ## Architecture
//!
//! ```text
//! source scan → ServiceBuilder → processors → regeneration policy → FileSink
//!                                                  ↘ document aggregator
//! ```
//!
//! Each [`Processor`] owns one artifact kind and renders its files with
//! Askama templates from `templates/`. Processors never touch the file
//! system: they return [`GeneratedFile`]s and the [`Generator`] run decides,
//! through [`regen`], which of them may be written.
//!
//! ## Generated Structure
//!
//! For `trait ItemService` declared in `src/items.rs`:
//!
//! ```text
//! src/items/item_service/
//! ├── mod.rs
//! ├── httpserver/     mod.rs, server.rs, transport.rs
//! ├── httpclient/     mod.rs, client.rs, transport.rs
//! ├── httperrors/     mod.rs, ui.rs, client.rs
//! ├── logging.rs
//! ├── instrumenting.rs
//! └── mock.rs
//! ```
//!
//! Only the kinds selected on the trait are emitted. Every file starts with
//! [`GENERATED_MARKER`]; files without it are never overwritten.

mod client;
mod decorators;
mod errors;
mod mock;
mod pipeline;
pub mod regen;
mod server;
mod templates;
mod views;
#[cfg(test)]
mod tests;

pub use client::ClientProcessor;
pub use decorators::{InstrumentingProcessor, LoggingProcessor};
pub use errors::ErrorsProcessor;
pub use mock::MockProcessor;
pub use pipeline::*;
pub use regen::{
    apply, classify, decide, DiskSink, FileSink, FileState, MemorySink, WriteAction,
    GENERATED_MARKER,
};
pub use server::ServerProcessor;
pub use templates::*;
pub use views::{method_views, MethodView, ParamView};

use std::path::{Path, PathBuf};

use askama::Template;

use crate::error::GenError;
use crate::model::{ProcessorKind, ServiceSpec};

/// One rendered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path segments below the service output directory
    pub relative_path: Vec<String>,
    pub content: Vec<u8>,
    /// Whether `content` starts with [`GENERATED_MARKER`]
    pub generated_marker: bool,
}

impl GeneratedFile {
    pub fn new(relative_path: &[&str], content: String) -> Self {
        let content = content.into_bytes();
        GeneratedFile {
            relative_path: relative_path.iter().map(|s| s.to_string()).collect(),
            generated_marker: regen::has_marker(&content),
            content,
        }
    }

    /// Absolute path below `dir`
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        self.relative_path
            .iter()
            .fold(dir.to_path_buf(), |path, segment| path.join(segment))
    }

    /// `httpserver/server.rs`
    pub fn display_path(&self) -> String {
        self.relative_path.join("/")
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.content).unwrap_or_default()
    }
}

/// `use` paths of one generated module, deduplicated in insertion order
///
/// Shared by every file of the module so they agree on the names in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    paths: Vec<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn extend<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            self.add(path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Renders the files of one artifact kind
pub trait Processor {
    fn kind(&self) -> ProcessorKind;

    fn process(&self, spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError>;
}

/// Marks a service for the API document; renders nothing
pub struct DocumentProcessor;

impl Processor for DocumentProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Swagger
    }

    fn process(&self, _spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
        Ok(Vec::new())
    }
}

/// The processor for one kind
pub fn processor_for(kind: ProcessorKind) -> Box<dyn Processor> {
    match kind {
        ProcessorKind::HttpServer => Box::new(ServerProcessor),
        ProcessorKind::HttpClient => Box::new(ClientProcessor { secure: false }),
        ProcessorKind::HttpsClient => Box::new(ClientProcessor { secure: true }),
        ProcessorKind::HttpErrors => Box::new(ErrorsProcessor),
        ProcessorKind::Metrics => Box::new(InstrumentingProcessor),
        ProcessorKind::Log => Box::new(LoggingProcessor),
        ProcessorKind::Mock => Box::new(MockProcessor),
        ProcessorKind::Swagger => Box::new(DocumentProcessor),
    }
}

/// Render every file for the kinds the service selected, plus its `mod.rs`
pub fn render_service(spec: &ServiceSpec) -> Result<Vec<GeneratedFile>, GenError> {
    let mut files = Vec::new();
    let mut modules = Vec::new();
    for kind in spec.processors.iter().copied() {
        let rendered = processor_for(kind).process(spec)?;
        for file in &rendered {
            let module = file
                .relative_path
                .first()
                .map(|s| s.trim_end_matches(".rs").to_string())
                .unwrap_or_default();
            if !module.is_empty() && !modules.iter().any(|m: &ModDecl| m.name == module) {
                modules.push(ModDecl {
                    name: module,
                    public: true,
                });
            }
        }
        files.extend(rendered);
    }
    if files.is_empty() {
        return Ok(files);
    }
    modules.sort_by(|a, b| a.name.cmp(&b.name));
    let doc = format!("Transport code generated for `{}`", spec.interface_name);
    files.push(mod_rs(spec, &["mod.rs"], &doc, modules, Vec::new())?);
    Ok(files)
}

/// Render a template, attributing failures to `path`
pub(crate) fn render<T: Template>(template: &T, path: &str) -> Result<String, GenError> {
    template.render().map_err(|e| GenError::Render {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Assemble a complete source file: header, module doc, imports and body
pub(crate) fn assemble(spec: &ServiceSpec, doc: &str, imports: &ImportSet, body: &str) -> String {
    let mut out = String::new();
    out.push_str(GENERATED_MARKER);
    out.push('\n');
    out.push_str(&format!("// source: {}\n", spec.import_path));
    out.push_str("// DO NOT EDIT.\n\n");
    out.push_str(
        "#![allow(unused_imports, unused_mut, unused_variables, dead_code, unreachable_patterns, clippy::all)]\n",
    );
    if !doc.is_empty() {
        out.push_str(&format!("//! {doc}\n"));
    }
    if !imports.is_empty() {
        out.push('\n');
        for path in imports.iter() {
            out.push_str(&format!("use {path};\n"));
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    out
}

/// A `mod.rs` declaring `modules` and re-exporting `reexports`
pub(crate) fn mod_rs(
    spec: &ServiceSpec,
    relative_path: &[&str],
    doc: &str,
    modules: Vec<ModDecl>,
    reexports: Vec<String>,
) -> Result<GeneratedFile, GenError> {
    let display = relative_path.join("/");
    let body = render(&ModRsTemplateData { modules, reexports }, &display)?;
    Ok(GeneratedFile::new(
        relative_path,
        assemble(spec, doc, &ImportSet::new(), &body),
    ))
}

/// `ImportSet` seeded with the service trait and every type it names
pub(crate) fn service_imports(spec: &ServiceSpec) -> ImportSet {
    let mut imports = ImportSet::new();
    imports.extend(spec.imports.iter().cloned());
    imports
}

/// Error type of the service, empty when no method returns `Result`
pub(crate) fn error_type(spec: &ServiceSpec) -> String {
    spec.error_type.clone().unwrap_or_default()
}
