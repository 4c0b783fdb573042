//! `svgs`: one sprite per category, fanned out to four destinations.
//!
//! Categories are independent and build in parallel. Within a category the
//! SVG files are sorted, so sprite content never depends on directory
//! listing order. A category whose glob matches nothing writes nothing.

use super::{Diagnostic, TaskError, TaskSummary, write_if_changed};
use crate::config::{BuildConfig, SvgCategory};
use crate::graph::Task;
use crate::runner::BuildContext;
use crate::sprite::{self, Sprite, SpriteDirs, Symbol};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let dirs = sprite_dirs(config);
    let svg_root = config.path(&config.project.svgs.src);

    let results: Vec<Result<TaskSummary, TaskError>> = config
        .svg_categories()
        .into_par_iter()
        .map(|category| build_category(&category, &svg_root, &dirs))
        .collect();

    let mut summary = TaskSummary::default();
    for result in results {
        summary.merge(result?);
    }
    Ok(summary)
}

pub fn sprite_dirs(config: &BuildConfig) -> SpriteDirs {
    let svgs = &config.project.svgs;
    SpriteDirs {
        includes: config.path(&svgs.includes_dir),
        previews: config.path(&svgs.preview_dir),
        variables: config.path(&svgs.variables_dir),
        images: config.dest_path(&svgs.dest),
    }
}

fn category_dir(category: &SvgCategory, svg_root: &Path) -> PathBuf {
    if category.name.is_empty() {
        svg_root.to_path_buf()
    } else {
        svg_root.join(&category.name)
    }
}

fn build_category(
    category: &SvgCategory,
    svg_root: &Path,
    dirs: &SpriteDirs,
) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::default();
    let mut files: Vec<PathBuf> = glob::glob(&category.source_glob)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    if files.is_empty() {
        tracing::debug!(category = category.stem(), "No SVGs, sprite skipped");
        return Ok(summary);
    }

    let dir = category_dir(category, svg_root);
    let mut seen = HashSet::new();
    let mut symbols = Vec::with_capacity(files.len());
    for file in &files {
        let origin = file.display().to_string();
        let raw = match fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(e) => {
                summary.error(Task::Svgs, Diagnostic::error(origin, e.to_string()));
                continue;
            }
        };
        let svg = match sprite::optimize(&raw) {
            Ok(svg) => svg,
            Err(e) => {
                summary.error(Task::Svgs, Diagnostic::error(origin, e.to_string()));
                continue;
            }
        };
        let id = sprite::symbol_id(&dir, file);
        if !seen.insert(id.clone()) {
            summary.warning(
                Task::Svgs,
                Diagnostic::warning(origin, format!("duplicate symbol id '{id}', keeping the first")),
            );
            continue;
        }
        symbols.push(Symbol::new(id, svg));
    }
    if symbols.is_empty() {
        return Ok(summary);
    }

    let sprite = Sprite {
        category: category.clone(),
        symbols,
    };
    for (kind, content) in sprite.artifacts() {
        let path = kind.route(category, dirs);
        write_if_changed(&path, content.as_bytes())?;
        summary.written.push(path);
    }
    tracing::debug!(
        category = category.stem(),
        symbols = sprite.symbols.len(),
        "Sprite written"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestProject;

    const ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 8 8"><path d="M0 0h8v8z"/></svg>"#;

    fn project(categories: &str) -> TestProject {
        let p = TestProject::new();
        p.write_config(&format!("[svgs]\ncategories = {categories}\n"));
        p
    }

    #[test]
    fn demo_category_routes_four_artifacts() {
        let p = project(r#"["demo"]"#);
        p.write("src/assets/toolkit/svgs/demo/arrow.svg", ICON);

        let summary = run(&p.context()).unwrap();
        assert_eq!(summary.written.len(), 4);
        assert!(p.path("src/views/layouts/includes/symbols-demo.html").exists());
        assert!(
            p.read("src/materials/symbols/demo.html")
                .starts_with("{{>symbols-demo}}")
        );
        assert!(
            p.read("src/assets/toolkit/styles/variables/_symbols-demo.sass")
                .contains("$symbols-demo: arrow")
        );
        assert!(p.path("dist/assets/toolkit/images/demo.svg").exists());
    }

    #[test]
    fn categories_build_independently() {
        let p = project(r#"["a", "b", "empty"]"#);
        p.write("src/assets/toolkit/svgs/a/one.svg", ICON);
        p.write("src/assets/toolkit/svgs/b/two.svg", ICON);

        let summary = run(&p.context()).unwrap();
        assert_eq!(summary.written.len(), 8);
        assert!(p.read("dist/assets/toolkit/images/a.svg").contains("id=\"one\""));
        assert!(!p.read("dist/assets/toolkit/images/a.svg").contains("id=\"two\""));
        assert!(!p.path("dist/assets/toolkit/images/empty.svg").exists());
    }

    #[test]
    fn unnamed_category_uses_legacy_names() {
        let p = project("[]");
        p.write("src/assets/toolkit/svgs/loose.svg", ICON);
        p.write("src/assets/toolkit/svgs/nested/deep.svg", ICON);

        run(&p.context()).unwrap();
        let include = p.read("src/views/layouts/includes/symbols.html");
        assert!(include.contains("id=\"loose\""));
        assert!(include.contains("id=\"nested-deep\""));
        assert!(p.read("src/materials/symbols/symbols.html").starts_with("{{>symbols}}"));
        assert!(p.path("src/assets/toolkit/styles/variables/_symbols.sass").exists());
        assert!(p.path("dist/assets/toolkit/images/symbols.svg").exists());
    }

    #[test]
    fn broken_svg_reported_rest_still_built() {
        let p = project(r#"["demo"]"#);
        p.write("src/assets/toolkit/svgs/demo/bad.svg", "<svg><g></svg>");
        p.write("src/assets/toolkit/svgs/demo/good.svg", ICON);

        let summary = run(&p.context()).unwrap();
        assert_eq!(summary.errors().count(), 1);
        let sprite = p.read("dist/assets/toolkit/images/demo.svg");
        assert!(sprite.contains("id=\"good\""));
        assert!(!sprite.contains("id=\"bad\""));
    }

    #[test]
    fn symbols_sorted_by_path() {
        let p = project(r#"["demo"]"#);
        p.write("src/assets/toolkit/svgs/demo/zeta.svg", ICON);
        p.write("src/assets/toolkit/svgs/demo/alpha.svg", ICON);
        run(&p.context()).unwrap();
        assert!(
            p.read("src/assets/toolkit/styles/variables/_symbols-demo.sass")
                .ends_with("$symbols-demo: alpha, zeta\n")
        );
    }
}
