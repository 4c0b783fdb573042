//! `fonts` and `images`: static assets copied into the output.
//!
//! Fonts are copied byte for byte. Images are copied too, except SVGs,
//! which go through the sprite optimizer first; an SVG that fails to parse
//! is copied unchanged with a warning. The `images` task also places the
//! favicon at the output root.

use super::{
    Diagnostic, TaskError, TaskSummary, files_under, has_extension, io_err, rel_display,
    write_if_changed,
};
use crate::graph::Task;
use crate::runner::BuildContext;
use crate::sprite;
use std::fs;
use std::path::Path;

pub fn fonts(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let fonts = &config.project.fonts;
    copy_tree(
        Task::Fonts,
        &config.path(&fonts.src),
        &config.dest_path(&fonts.dest),
        &|_| None,
    )
}

pub fn images(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let images = &config.project.images;
    let src = config.path(&images.src);

    let optimize_svg = |path: &Path| {
        if !has_extension(path, &["svg"]) {
            return None;
        }
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e.to_string())),
        };
        Some(
            sprite::optimize(&raw)
                .map(|svg| svg.markup().into_bytes())
                .map_err(|e| e.to_string()),
        )
    };
    let mut summary = copy_tree(
        Task::Images,
        &src,
        &config.dest_path(&images.dest),
        &optimize_svg,
    )?;

    let favicon = config.path(&images.favicon);
    if favicon.is_file()
        && let Some(name) = favicon.file_name()
    {
        let out = config.dest().join(name);
        let bytes = fs::read(&favicon).map_err(io_err(&favicon))?;
        write_if_changed(&out, &bytes)?;
        summary.written.push(out);
    }
    Ok(summary)
}

/// A per-file transform: `None` copies verbatim, `Some(Err)` falls back to a
/// verbatim copy with a warning.
type Transform<'a> = dyn Fn(&Path) -> Option<Result<Vec<u8>, String>> + 'a;

fn copy_tree(
    task: Task,
    src: &Path,
    dest: &Path,
    transform: &Transform<'_>,
) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::default();
    for file in files_under(src) {
        let rel = rel_display(src, &file);
        let out = dest.join(&rel);
        let bytes = match transform(&file) {
            Some(Ok(bytes)) => bytes,
            Some(Err(message)) => {
                summary.warning(task, Diagnostic::warning(&rel, message));
                fs::read(&file).map_err(io_err(&file))?
            }
            None => fs::read(&file).map_err(io_err(&file))?,
        };
        write_if_changed(&out, &bytes)?;
        summary.written.push(out);
    }
    Ok(summary)
}
