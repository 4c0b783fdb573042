//! The build tasks.
//!
//! Every [`Task`] maps to one function here taking the shared
//! [`BuildContext`]. Tasks return a [`TaskSummary`] listing what they wrote
//! plus the diagnostics they logged along the way (Sass, bundler and
//! template errors are reported, never propagated). A returned
//! [`TaskError`] means the task itself could not do its job; the runner
//! decides whether that ends the run.

pub mod assemble;
pub mod assets;
pub mod clean;
pub mod deploy;
pub mod sass_data;
pub mod scripts;
pub mod styles;
pub mod svgs;

use crate::graph::Task;
use crate::runner::BuildContext;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Template assembly failed: {0}")]
    Assemble(#[from] crate::assemble::AssembleError),
    #[error("Transfer failed: {0}")]
    Transfer(#[from] deploy::TransferError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: &Path) -> impl FnOnce(io::Error) -> TaskError + '_ {
    move |source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem reported by a compiler the task wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// File or entry the problem belongs to.
    pub origin: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn warning(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            origin: origin.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)
    }
}

/// What a task did.
#[derive(Debug, Clone, Default)]
pub struct TaskSummary {
    pub written: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// Free-form detail for the report (bundle hash, cache stats, ...).
    pub notes: Vec<String>,
}

impl TaskSummary {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Log and record a compiler error.
    pub(crate) fn error(&mut self, task: Task, diagnostic: Diagnostic) {
        tracing::error!(task = %task, origin = %diagnostic.origin, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    /// Log and record a compiler warning.
    pub(crate) fn warning(&mut self, task: Task, diagnostic: Diagnostic) {
        tracing::warn!(task = %task, origin = %diagnostic.origin, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn merge(&mut self, other: TaskSummary) {
        self.written.extend(other.written);
        self.diagnostics.extend(other.diagnostics);
        self.notes.extend(other.notes);
    }
}

/// Run a single task.
pub fn run(task: Task, ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    match task {
        Task::Clean => clean::run(ctx),
        Task::StylesFabricator => styles::run(ctx, styles::Theme::Fabricator),
        Task::StylesToolkit => styles::run(ctx, styles::Theme::Toolkit),
        Task::Scripts => scripts::run(ctx),
        Task::Images => assets::images(ctx),
        Task::Svgs => svgs::run(ctx),
        Task::Fonts => assets::fonts(ctx),
        Task::SassData => sass_data::run(ctx),
        Task::Assemble => assemble::run(ctx),
        Task::Sftp => deploy::sftp(ctx),
        Task::Sync => deploy::sync(ctx),
    }
}

// ============================================================================
// File helpers shared by the tasks
// ============================================================================

/// Write `content` unless the file already holds exactly that.
///
/// Returns whether the file was written. Generated files inside the watched
/// source tree would otherwise re-trigger the watcher on every build.
pub(crate) fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool, TaskError> {
    if let Ok(existing) = fs::read(path)
        && existing == content
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, content).map_err(io_err(path))?;
    Ok(true)
}

/// Every file under `dir`, sorted. A missing directory yields nothing.
pub(crate) fn files_under(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Source directory missing, nothing to do");
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

pub(crate) fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Path of `path` relative to `base`, with forward slashes.
pub(crate) fn rel_display(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
