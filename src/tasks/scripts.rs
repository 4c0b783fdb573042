//! `scripts`: bundle the fabricator and toolkit entry points.

use super::{Diagnostic, TaskError, TaskSummary, write_if_changed};
use crate::bundler::BundleEntry;
use crate::graph::Task;
use crate::runner::BuildContext;
use crate::viewport;
use std::path::PathBuf;

pub fn run(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let scripts = &config.project.scripts;
    let mut summary = TaskSummary::default();

    let entries: Vec<BundleEntry> = [
        (&scripts.fabricator, &scripts.fabricator_out),
        (&scripts.toolkit, &scripts.toolkit_out),
    ]
    .into_iter()
    .filter_map(|(src, out)| {
        let source = config.path(src);
        if source.is_file() {
            Some(BundleEntry {
                source,
                output: PathBuf::from(out),
            })
        } else {
            tracing::debug!(entry = %src, "Script entry missing, skipped");
            None
        }
    })
    .collect();

    let result = ctx.bundler.run(&entries, &config.dest());
    for error in &result.errors {
        summary.error(Task::Scripts, Diagnostic::error("bundle", error.to_string()));
    }
    for message in &result.warnings {
        summary.warning(Task::Scripts, Diagnostic::warning("bundle", message.clone()));
    }
    summary
        .written
        .extend(result.outputs.iter().map(|o| o.path.clone()));
    if !result.outputs.is_empty() {
        summary.notes.push(format!("hash {}", &result.hash[..12.min(result.hash.len())]));
        summary.notes.push(format!("modules {}", result.cache));
    }

    // The viewport runtime ships next to the fabricator bundle.
    let runtime = config
        .dest_path(&scripts.fabricator_out)
        .with_file_name(viewport::RUNTIME_FILENAME);
    write_if_changed(&runtime, viewport::runtime_script().as_bytes())?;
    summary.written.push(runtime);

    Ok(summary)
}
