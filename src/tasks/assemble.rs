//! `assemble`: render the HTML site.

use super::{Diagnostic, TaskError, TaskSummary};
use crate::assemble::{self, AssembleError, Sources};
use crate::graph::Task;
use crate::runner::BuildContext;

fn origin(error: &AssembleError) -> String {
    match error {
        AssembleError::Read { path, .. }
        | AssembleError::FrontMatter { path, .. }
        | AssembleError::Data { path, .. }
        | AssembleError::Write { path, .. } => path.display().to_string(),
        AssembleError::Template { name, .. } => name.clone(),
        AssembleError::Render { page, .. } => page.clone(),
    }
}

/// Dev builds keep going past template errors; prod builds stop at the first.
pub fn run(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let sources = Sources::from_config(config);
    let outcome = assemble::assemble(&sources, &config.dest(), config.is_dev(), config.is_dev())?;

    let mut summary = TaskSummary::default();
    for error in outcome.errors {
        // Already logged by the assembler.
        summary
            .diagnostics
            .push(Diagnostic::error(origin(&error), error.to_string()));
    }
    for warning in outcome.warnings {
        summary.diagnostics.push(Diagnostic::warning("materials", warning));
    }
    summary.notes.push(format!("{} pages", outcome.pages.len()));
    summary.written = outcome.pages;
    tracing::debug!(task = %Task::Assemble, pages = summary.written.len(), "Assembled");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::test_helpers::TestProject;

    fn layout(p: &TestProject) {
        p.write("src/views/layouts/default.html", "<main>{{> body}}</main>");
    }

    #[test]
    fn writes_pages_under_output_root() {
        let p = TestProject::new();
        layout(&p);
        p.write("src/views/index.html", "home");
        p.write("src/views/pages/colors.html", "colors");

        let summary = run(&p.context()).unwrap();
        assert_eq!(summary.written.len(), 2);
        assert_eq!(p.read("dist/index.html"), "<main>home</main>");
        assert_eq!(p.read("dist/pages/colors.html"), "<main>colors</main>");
        assert_eq!(summary.notes, vec!["2 pages"]);
    }

    #[test]
    fn sass_data_visible_to_pages() {
        let p = TestProject::new();
        layout(&p);
        p.write(
            "src/data/sass.json",
            r##"{"files":[{"name":"colors","path":"colors.scss","variables":[{"name":"$red","value":"#f00"}]}]}"##,
        );
        p.write(
            "src/views/index.html",
            "{{#each sass.files}}{{#each variables}}{{name}}={{value}}{{/each}}{{/each}}",
        );
        run(&p.context()).unwrap();
        assert_eq!(p.read("dist/index.html"), "<main>$red=#f00</main>");
    }

    #[test]
    fn prod_render_error_fails_task() {
        let p = TestProject::new();
        layout(&p);
        p.write("src/views/index.html", "{{> nowhere}}");
        assert!(matches!(
            run(&p.context()),
            Err(TaskError::Assemble(AssembleError::Render { .. }))
        ));
    }

    #[test]
    fn dev_render_error_is_diagnostic() {
        let p = TestProject::new();
        layout(&p);
        p.write("src/views/a.html", "{{> nowhere}}");
        p.write("src/views/b.html", "ok");

        let summary = run(&p.context_for(Mode::Dev)).unwrap();
        assert_eq!(summary.errors().count(), 1);
        assert_eq!(summary.errors().next().unwrap().origin, "a.html");
        assert_eq!(p.read("dist/b.html"), "<main>ok</main>");
    }
}
