//! `clean`: remove the output root.

use super::{TaskSummary, io_err};
use crate::runner::BuildContext;
use std::fs;
use std::io;

pub fn run(ctx: &BuildContext) -> Result<TaskSummary, super::TaskError> {
    let dest = ctx.config.dest();
    match fs::remove_dir_all(&dest) {
        Ok(()) => tracing::debug!(dest = %dest.display(), "Removed output root"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&dest)(e)),
    }
    Ok(TaskSummary::default())
}
