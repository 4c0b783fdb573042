//! Shared test fixtures.
//!
//! [`TestProject`] is a throwaway project root on disk. Files are written
//! with project-relative paths, and contexts are built from whatever
//! `patternforge.toml` the test wrote, exactly as `main` would.
//!
//! ```ignore
//! let p = TestProject::new();
//! p.write("src/views/index.html", "home");
//! tasks::assemble::run(&p.context()).unwrap();
//! assert_eq!(p.read("dist/index.html"), "home");
//! ```

use crate::config::{BuildConfig, CONFIG_FILENAME, DEFAULT_USER, Mode};
use crate::reload::{RecordingReloader, ReloadKind};
use crate::runner::BuildContext;
use crate::tasks::deploy::{RecordingTransport, Transport};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestProject {
    tmp: TempDir,
    reloader: Arc<RecordingReloader>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            reloader: Arc::new(RecordingReloader::new()),
        }
    }

    /// Absolute path of a project-relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn write_config(&self, toml: &str) {
        self.write(CONFIG_FILENAME, toml);
    }

    /// Read a file. Panics with the path if it is missing.
    pub fn read(&self, rel: &str) -> String {
        let path = self.path(rel);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
    }

    /// Prod context with a recording transport.
    pub fn context(&self) -> BuildContext {
        self.context_for(Mode::Prod)
    }

    pub fn context_for(&self, mode: Mode) -> BuildContext {
        let config = BuildConfig::load(self.tmp.path(), mode, DEFAULT_USER).unwrap();
        BuildContext::new(config)
            .with_reloader(self.reloader.clone())
            .with_transport(Arc::new(RecordingTransport::new()))
    }

    pub fn context_with_transport(&self, transport: Arc<dyn Transport>) -> BuildContext {
        self.context().with_transport(transport)
    }

    /// Reload notifications sent through any context of this project.
    pub fn reloads(&self) -> Vec<ReloadKind> {
        self.reloader.events()
    }
}
