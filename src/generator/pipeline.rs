use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::regen::{self, FileSink, WriteAction};
use super::render_service;
use crate::directive::MARKER;
use crate::document::{aggregate_with_types, serialize, DocFormat, DocumentInfo};
use crate::error::GenError;
use crate::model::{ProcessorKind, ServiceBuilder, ServiceSpec};
use crate::source::{discover_sources, parse_source, resolve_module_path, InterfaceDecl, TypeIndex};

/// Settings of one generator run
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Directory scanned for annotated traits
    pub input: PathBuf,
    /// Directory receiving the API document, the input directory when unset
    pub document_dir: Option<PathBuf>,
    pub format: DocFormat,
    pub document: DocumentInfo,
    /// Directive marker, `@gtg` unless overridden
    pub marker: String,
}

impl GeneratorOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        GeneratorOptions {
            input: input.into(),
            document_dir: None,
            format: DocFormat::default(),
            document: DocumentInfo::default(),
            marker: MARKER.to_string(),
        }
    }

    /// Full path of the API document
    pub fn document_path(&self) -> PathBuf {
        self.document_dir
            .as_deref()
            .unwrap_or(&self.input)
            .join(self.format.file_name())
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub action: WriteAction,
}

/// A hand-written file that generation would have replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipNotice {
    pub service: String,
    pub path: PathBuf,
}

/// Services and failures found by scanning, before anything is rendered
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub services: Vec<ServiceSpec>,
    pub failures: Vec<GenError>,
    pub types: TypeIndex,
    /// Source files that failed to parse and were skipped
    pub unparsed: Vec<PathBuf>,
}

/// Outcome of a generator run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Services generated, by trait name
    pub services: Vec<String>,
    pub files: Vec<FileOutcome>,
    pub skipped: Vec<SkipNotice>,
    pub failures: Vec<GenError>,
    /// API document path, when one was produced
    pub document: Option<FileOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Files that ended with `action`
    pub fn count(&self, action: WriteAction) -> usize {
        self.files.iter().filter(|f| f.action == action).count()
    }
}

/// Scans a source tree and generates transport code for every annotated trait
///
/// A service whose directives are invalid is reported and skipped; its
/// siblings are generated regardless. Failing to read the source tree or to
/// read or write an artifact aborts the run at once.
pub struct Generator {
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Self {
        Generator { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Discover, parse and build every service below the input directory
    pub fn scan(&self) -> anyhow::Result<Scan> {
        let root = &self.options.input;
        let files = discover_sources(root)
            .with_context(|| format!("Failed to scan {}", root.display()))?;
        tracing::info!(root = %root.display(), files = files.len(), "scanning sources");

        let mut scan = Scan::default();
        let mut interfaces: Vec<InterfaceDecl> = Vec::new();
        for path in files {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if regen::has_marker(text.as_bytes()) {
                tracing::debug!(path = %path.display(), "skipping generated file");
                continue;
            }
            let module_path = resolve_module_path(&path, root);
            match parse_source(&path, &text, &module_path) {
                Ok(parsed) => {
                    scan.types.extend(parsed.types);
                    interfaces.extend(parsed.interfaces);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unparsable file");
                    scan.unparsed.push(path);
                }
            }
        }

        let builder = ServiceBuilder::new(&scan.types).with_marker(self.options.marker.clone());
        for decl in &interfaces {
            match builder.build(decl) {
                Ok(Some(spec)) => scan.services.push(spec),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(service = %decl.name, error = %e, "invalid service");
                    scan.failures.push(e);
                }
            }
        }
        tracing::info!(
            services = scan.services.len(),
            failures = scan.failures.len(),
            "scan finished"
        );
        Ok(scan)
    }

    /// Generate every service and the API document through `sink`
    pub fn run(&self, sink: &mut dyn FileSink) -> anyhow::Result<RunReport> {
        let scan = self.scan()?;
        let mut report = RunReport {
            failures: scan.failures,
            ..RunReport::default()
        };

        for spec in &scan.services {
            match write_service(spec, sink, &mut report) {
                Ok(()) => report.services.push(spec.interface_name.clone()),
                Err(e @ GenError::Io { .. }) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to write {}", spec.interface_name)));
                }
                Err(e) => {
                    tracing::error!(service = %spec.interface_name, error = %e, "generation failed");
                    report.failures.push(e);
                }
            }
        }

        let documented: Vec<&ServiceSpec> = scan
            .services
            .iter()
            .filter(|s| s.has(ProcessorKind::Swagger))
            .filter(|s| report.services.contains(&s.interface_name))
            .collect();
        if !documented.is_empty() {
            match self.write_document(&documented, &scan.types, sink) {
                Ok(outcome) => report.document = Some(outcome),
                Err(e @ GenError::Io { .. }) => {
                    return Err(anyhow::Error::new(e).context("Failed to write the API document"));
                }
                Err(e) => {
                    tracing::error!(error = %e, "API document not written");
                    report.failures.push(e);
                }
            }
        }

        tracing::info!(
            services = report.services.len(),
            written = report.count(WriteAction::Create) + report.count(WriteAction::Overwrite),
            unchanged = report.count(WriteAction::Unchanged),
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "generation finished"
        );
        Ok(report)
    }

    fn write_document(
        &self,
        services: &[&ServiceSpec],
        types: &TypeIndex,
        sink: &mut dyn FileSink,
    ) -> Result<FileOutcome, GenError> {
        let doc = aggregate_with_types(services, &self.options.document, types)?;
        let bytes = serialize(&doc, self.options.format)?;
        let path = self.options.document_path();
        let action = match sink.read(&path)? {
            Some(existing) if existing == bytes => WriteAction::Unchanged,
            existing => {
                sink.write(&path, &bytes)?;
                if existing.is_some() {
                    WriteAction::Overwrite
                } else {
                    WriteAction::Create
                }
            }
        };
        tracing::info!(
            path = %path.display(),
            operations = doc.operation_count(),
            action = action.as_str(),
            "API document"
        );
        Ok(FileOutcome { path, action })
    }
}

/// Render every file of one service, then write the ones the policy allows
///
/// Rendering completes before the first write so a template failure leaves
/// the service's files as they were.
fn write_service(
    spec: &ServiceSpec,
    sink: &mut dyn FileSink,
    report: &mut RunReport,
) -> Result<(), GenError> {
    let files = render_service(spec)?;
    let dir = spec.output_dir();
    for file in files {
        let path = file.path_in(&dir);
        let action = regen::apply(sink, &path, &file.content)?;
        if action == WriteAction::Skip {
            report.skipped.push(SkipNotice {
                service: spec.interface_name.clone(),
                path: path.clone(),
            });
        }
        report.files.push(FileOutcome { path, action });
    }
    Ok(())
}

/// Services found below `input`, for listing
pub fn inspect(input: &Path) -> anyhow::Result<Scan> {
    Generator::new(GeneratorOptions::new(input)).scan()
}
