//! `styles:fabricator` / `styles:toolkit`: Sass → prefixed CSS.
//!
//! Each theme entry is compiled on its own with grass, vendor-prefixed for
//! the theme's browser target and written to the theme's destination. Dev
//! builds keep the expanded output and append an inline source map; prod
//! builds are compressed. A compile error is logged against its entry and
//! the remaining entries still build.
//!
//! In dev mode a run that wrote anything ends with exactly one
//! [`ReloadKind::Styles`] notification, so open pages swap stylesheets
//! without a full reload.

use super::{Diagnostic, TaskError, TaskSummary, rel_display, write_if_changed};
use crate::config::{ProjectConfig, ThemeConfig};
use crate::graph::Task;
use crate::prefix::{self, BrowserTargets};
use crate::reload::ReloadKind;
use crate::runner::BuildContext;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use grass::{Options, OutputStyle};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Fabricator,
    Toolkit,
}

impl Theme {
    pub fn task(self) -> Task {
        match self {
            Theme::Fabricator => Task::StylesFabricator,
            Theme::Toolkit => Task::StylesToolkit,
        }
    }

    pub fn config(self, project: &ProjectConfig) -> &ThemeConfig {
        match self {
            Theme::Fabricator => &project.styles.fabricator,
            Theme::Toolkit => &project.styles.toolkit,
        }
    }
}

pub fn run(ctx: &BuildContext, theme: Theme) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let settings = theme.config(&config.project);
    let task = theme.task();
    let mut summary = TaskSummary::default();

    let targets = match BrowserTargets::parse(&settings.browsers) {
        Ok(t) => t,
        Err(e) => {
            summary.warning(task, Diagnostic::warning(&settings.browsers, e.to_string()));
            BrowserTargets { last_versions: 1 }
        }
    };
    let out_dir = config.dest_path(&settings.dest);

    for entry in &settings.entries {
        let source = config.path(entry);
        if !source.is_file() {
            tracing::debug!(entry = %entry, "Style entry missing, skipped");
            continue;
        }
        let css = match compile(&source, config.is_dev()) {
            Ok(css) => prefix::apply(&css, targets),
            Err(message) => {
                summary.error(task, Diagnostic::error(entry, message));
                continue;
            }
        };

        let file_name = match &settings.rename {
            Some(name) => name.clone(),
            None => format!(
                "{}.css",
                source.file_stem().and_then(|s| s.to_str()).unwrap_or("styles")
            ),
        };
        let out = out_dir.join(&file_name);
        let body = if config.is_dev() {
            let original = fs::read_to_string(&source).unwrap_or_default();
            let sources = rel_display(&config.root, &source);
            with_source_map(&css, &file_name, &sources, &original)
        } else {
            css
        };
        write_if_changed(&out, body.as_bytes())?;
        summary.written.push(out);
    }

    if config.is_dev() && !summary.written.is_empty() {
        ctx.reloader.notify(ReloadKind::Styles);
    }
    Ok(summary)
}

/// Compile one entry. Imports resolve relative to the entry's directory.
pub fn compile(source: &Path, dev: bool) -> Result<String, String> {
    let style = if dev {
        OutputStyle::Expanded
    } else {
        OutputStyle::Compressed
    };
    let mut options = Options::default().style(style);
    if let Some(dir) = source.parent() {
        options = options.load_path(dir);
    }
    grass::from_path(source, &options).map_err(|e| e.to_string())
}

/// Append an inline source map that embeds the entry source.
///
/// Mappings are line-level: every output line that opens a rule or holds a
/// declaration points at the first matching line of the entry. Rules pulled
/// in from imports have no match and stay unmapped.
pub fn with_source_map(css: &str, file: &str, source: &str, content: &str) -> String {
    let map = serde_json::json!({
        "version": 3,
        "file": file,
        "sources": [source],
        "sourcesContent": [content],
        "names": [],
        "mappings": mappings(&line_origins(css, content)),
    });
    format!(
        "{}\n/*# sourceMappingURL=data:application/json;base64,{} */\n",
        css.trim_end(),
        STANDARD.encode(map.to_string())
    )
}

/// Source `(line, column)` for each output line, where one is found.
fn line_origins(css: &str, source: &str) -> Vec<Option<(u32, u32)>> {
    let lines: Vec<&str> = source.lines().collect();
    let find = |needle: &str, from: usize| {
        lines
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, l)| l.find(needle).map(|col| (i as u32, col as u32)))
    };
    let mut rule_line = 0;
    css.lines()
        .map(|line| {
            let line = line.trim();
            if let Some(selector) = line.strip_suffix('{') {
                let last = selector
                    .rsplit([' ', '>', '+', '~', ','])
                    .find(|s| !s.is_empty())?;
                let hit = find(last, 0)?;
                rule_line = hit.0 as usize;
                Some(hit)
            } else if let Some((property, _)) = line.split_once(':')
                && !property.is_empty()
                && !property.contains(['{', '}'])
            {
                find(&format!("{}:", unprefixed(property.trim())), rule_line)
            } else {
                None
            }
        })
        .collect()
}

fn unprefixed(property: &str) -> &str {
    match property.strip_prefix('-').and_then(|p| p.split_once('-')) {
        Some((_, bare)) => bare,
        None => property,
    }
}

/// Encode one segment per mapped line: output column 0, source 0.
fn mappings(origins: &[Option<(u32, u32)>]) -> String {
    let mut out = String::new();
    let (mut prev_line, mut prev_col) = (0i64, 0i64);
    for (i, origin) in origins.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        if let Some((line, col)) = origin {
            let (line, col) = (i64::from(*line), i64::from(*col));
            for field in [0, 0, line - prev_line, col - prev_col] {
                vlq(field, &mut out);
            }
            (prev_line, prev_col) = (line, col);
        }
    }
    out
}

const VLQ_DIGITS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq(value: i64, out: &mut String) {
    let mut rest = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        value.unsigned_abs() << 1
    };
    loop {
        let mut digit = (rest & 31) as usize;
        rest >>= 5;
        if rest > 0 {
            digit |= 32;
        }
        out.push(VLQ_DIGITS[digit] as char);
        if rest == 0 {
            break;
        }
    }
}
