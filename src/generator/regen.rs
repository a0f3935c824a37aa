//! Decides, file by file, whether generated output may be written
//!
//! A file is only ever replaced when its first line carries
//! [`GENERATED_MARKER`]; anything else on disk is treated as hand-written and
//! left alone with a notice.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::GenError;

/// First line of every generated source file
pub const GENERATED_MARKER: &str = "// CODE GENERATED AUTOMATICALLY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Absent,
    PresentGenerated,
    PresentHandwritten,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Overwrite,
    /// Generated file whose bytes already match
    Unchanged,
    /// Hand-written file, left untouched
    Skip,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Create => "create",
            WriteAction::Overwrite => "overwrite",
            WriteAction::Unchanged => "unchanged",
            WriteAction::Skip => "skip",
        }
    }

    /// Whether the action puts bytes on disk
    pub fn writes(&self) -> bool {
        matches!(self, WriteAction::Create | WriteAction::Overwrite)
    }
}

/// Classify existing content by its first line
pub fn classify(existing: Option<&[u8]>) -> FileState {
    let Some(bytes) = existing else {
        return FileState::Absent;
    };
    if has_marker(bytes) {
        FileState::PresentGenerated
    } else {
        FileState::PresentHandwritten
    }
}

/// Whether the first line of `bytes` is the generated marker
pub fn has_marker(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let first = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    String::from_utf8_lossy(first).trim().starts_with(GENERATED_MARKER)
}

pub fn decide(state: FileState, existing: Option<&[u8]>, new: &[u8]) -> WriteAction {
    match state {
        FileState::Absent => WriteAction::Create,
        FileState::PresentHandwritten => WriteAction::Skip,
        FileState::PresentGenerated if existing == Some(new) => WriteAction::Unchanged,
        FileState::PresentGenerated => WriteAction::Overwrite,
    }
}

/// Where generated bytes go
pub trait FileSink {
    /// Current content, `None` when the file does not exist
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, GenError>;

    /// Replace the whole file
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), GenError>;
}

/// The file system
///
/// Each write lands in a temporary sibling first and is renamed over the
/// target, so readers never observe a half-written file. With `dry_run` set
/// nothing is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSink {
    pub dry_run: bool,
}

impl DiskSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run() -> Self {
        DiskSink { dry_run: true }
    }
}

fn io_error(path: &Path, err: std::io::Error) -> GenError {
    GenError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

impl FileSink for DiskSink {
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, GenError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), GenError> {
        if self.dry_run {
            tracing::debug!(path = %path.display(), "dry run, not writing");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{name}.gtg-tmp"));
        fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| {
            fs::remove_file(&tmp).ok();
            io_error(path, e)
        })
    }
}

/// In-memory sink for tests and previews
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: BTreeMap<PathBuf, Vec<u8>>,
    writes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file as if it already existed
    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Number of writes performed since creation
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl FileSink for MemorySink {
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, GenError> {
        Ok(self.files.get(path).cloned())
    }

    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), GenError> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        self.writes += 1;
        Ok(())
    }
}

/// Classify `path`, decide and write when allowed
pub fn apply(sink: &mut dyn FileSink, path: &Path, new: &[u8]) -> Result<WriteAction, GenError> {
    let existing = sink.read(path)?;
    let action = decide(classify(existing.as_deref()), existing.as_deref(), new);
    match action {
        WriteAction::Create | WriteAction::Overwrite => {
            sink.write(path, new)?;
            tracing::info!(path = %path.display(), action = action.as_str(), "wrote generated file");
        }
        WriteAction::Unchanged => {
            tracing::debug!(path = %path.display(), "generated file is up to date");
        }
        WriteAction::Skip => {
            tracing::warn!(
                path = %path.display(),
                "not overwriting hand-written file; remove it or add the generated marker to regenerate"
            );
        }
    }
    Ok(action)
}
