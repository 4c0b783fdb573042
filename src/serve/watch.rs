//! Watch rules and the debounced filesystem watcher.
//!
//! Every rule binds a set of project-relative globs to one task and one
//! reload kind:
//!
//! | Globs | Task | Reload |
//! |---|---|---|
//! | `<watch root>/**/*.{html,md,json,yml}` | assemble | full |
//! | `<fabricator styles>/**/*.{scss,sass}` | styles:fabricator | from the task |
//! | `<toolkit styles>/**/*.{scss,sass}` | styles:toolkit | from the task |
//! | `<fonts>/**/*` | fonts | none |
//! | `<script dirs>/**/*.js` | scripts | full |
//! | `<svg root>/**/*.svg` | svgs | full |
//! | `<images>/**/*` | images | full |
//! | `<variables>/**/*.{sass,scss}` | sass-data | none |
//!
//! The scripts rule also evicts the changed module from the bundler cache.

use super::ServeError;
use crate::config::BuildConfig;
use crate::graph::Task;
use crate::reload::ReloadKind;
use glob::{MatchOptions, Pattern};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct WatchRule {
    pub patterns: Vec<Pattern>,
    pub task: Task,
    pub reload: Option<ReloadKind>,
    /// Evict the changed file from the bundler cache before running.
    pub invalidate_scripts: bool,
}

impl WatchRule {
    fn new(globs: &[String], task: Task, reload: Option<ReloadKind>) -> Result<Self, glob::PatternError> {
        let mut patterns = Vec::new();
        for glob in globs {
            for expanded in expand_braces(glob) {
                patterns.push(Pattern::new(&expanded)?);
            }
        }
        Ok(Self {
            patterns,
            task,
            reload,
            invalidate_scripts: false,
        })
    }

    /// Does the project-relative path `rel` (forward slashes) match?
    pub fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_with(rel, MATCH))
    }
}

/// Expand `{a,b}` alternatives; `glob` has no brace support.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(len) = pattern[open..].find('}') else {
        return vec![pattern.to_string()];
    };
    let close = open + len;
    let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}

fn under(dir: &str, pattern: &str) -> String {
    format!("{}/{pattern}", dir.trim_end_matches('/'))
}

fn parent_dir(file: &str) -> String {
    Path::new(file)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

/// The rule table for a project.
pub fn rules(config: &BuildConfig) -> Result<Vec<WatchRule>, glob::PatternError> {
    let p = &config.project;
    let mut script_dirs = vec![parent_dir(&p.scripts.fabricator), parent_dir(&p.scripts.toolkit)];
    script_dirs.dedup();
    let script_globs: Vec<String> = script_dirs.iter().map(|d| under(d, "**/*.js")).collect();

    let mut scripts = WatchRule::new(&script_globs, Task::Scripts, Some(ReloadKind::Full))?;
    scripts.invalidate_scripts = true;

    Ok(vec![
        WatchRule::new(
            &[under(&p.serve.watch_root, "**/*.{html,md,json,yml}")],
            Task::Assemble,
            Some(ReloadKind::Full),
        )?,
        WatchRule::new(
            &[under(&p.styles.fabricator.watch, "**/*.{scss,sass}")],
            Task::StylesFabricator,
            None,
        )?,
        WatchRule::new(
            &[under(&p.styles.toolkit.watch, "**/*.{scss,sass}")],
            Task::StylesToolkit,
            None,
        )?,
        WatchRule::new(&[under(&p.fonts.src, "**/*")], Task::Fonts, None)?,
        scripts,
        WatchRule::new(&[under(&p.svgs.src, "**/*.svg")], Task::Svgs, Some(ReloadKind::Full))?,
        WatchRule::new(&[under(&p.images.src, "**/*")], Task::Images, Some(ReloadKind::Full))?,
        WatchRule::new(
            &[under(&p.variables.src, "**/*.{sass,scss}")],
            Task::SassData,
            None,
        )?,
    ])
}

/// What one batch of changes asks for, per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchAction {
    pub task: Task,
    pub reload: Option<ReloadKind>,
    /// Project-relative paths to evict from the bundler cache.
    pub invalidate: Vec<String>,
}

/// Project-relative form of an absolute event path.
pub fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        // The watcher may report canonical paths for a symlinked root.
        Err(_) => path.strip_prefix(root.canonicalize().ok()?).ok()?.to_path_buf(),
    };
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Map changed paths to one action per task, in task order.
pub fn actions(rules: &[WatchRule], root: &Path, changed: &[PathBuf]) -> Vec<WatchAction> {
    let mut by_task: BTreeMap<Task, WatchAction> = BTreeMap::new();
    for path in changed {
        let Some(rel) = relative(root, path) else {
            continue;
        };
        for rule in rules.iter().filter(|r| r.matches(&rel)) {
            debug!(path = %rel, task = %rule.task, "Change matched");
            let action = by_task.entry(rule.task).or_insert_with(|| WatchAction {
                task: rule.task,
                reload: rule.reload,
                invalidate: Vec::new(),
            });
            if rule.invalidate_scripts && !action.invalidate.contains(&rel) {
                action.invalidate.push(rel.clone());
            }
        }
    }
    by_task.into_values().collect()
}

/// Debounced recursive watcher delivering batches of changed paths.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<Vec<PathBuf>>,
}

impl FileWatcher {
    pub fn new(dir: &Path, debounce_ms: u64) -> Result<Self, ServeError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(debounce_ms),
            move |res: Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    if event_tx.send(paths).is_err() {
                        debug!("Event receiver dropped, stopping watcher");
                    }
                }
                Err(e) => warn!(error = %e, "Filesystem watch error"),
            },
        )
        .map_err(|e| ServeError::Watch(format!("failed to create filesystem watcher: {e}")))?;

        debouncer
            .watcher()
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| ServeError::Watch(format!("failed to watch {}: {e}", dir.display())))?;

        info!(path = %dir.display(), debounce_ms, "Watching for changes");
        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Next batch of changed paths; `None` once the watcher stopped.
    pub async fn recv(&mut self) -> Option<Vec<PathBuf>> {
        self.event_rx.recv().await
    }
}
