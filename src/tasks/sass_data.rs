//! `sass-data`: expose style variables to templates.
//!
//! Every `*.sass`/`*.scss` file under the variables directory is scanned for
//! single-line `$name: value` declarations. The result is written to
//! `<data_dir>/sass.json`, where assembly picks it up as the `sass` data
//! key:
//!
//! ```json
//! { "files": [
//!   { "name": "colors", "path": "_colors.scss",
//!     "variables": [ { "name": "brand", "value": "#c00", "comment": "primary" } ] }
//! ] }
//! ```

use super::{TaskError, TaskSummary, files_under, has_extension, rel_display, write_if_changed};
use crate::runner::BuildContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::LazyLock;

pub const OUTPUT_FILENAME: &str = "sass.json";

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\$([A-Za-z_][\w-]*)\s*:\s*(.*)$").expect("declaration pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SassVariable {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SassFile {
    pub name: String,
    pub path: String,
    pub variables: Vec<SassVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SassData {
    pub files: Vec<SassFile>,
}

pub fn run(ctx: &BuildContext) -> Result<TaskSummary, TaskError> {
    let config = &ctx.config;
    let src = config.path(&config.project.variables.src);
    let mut data = SassData::default();

    for file in files_under(&src) {
        if !has_extension(&file, &["sass", "scss"]) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&file) else {
            tracing::warn!(file = %file.display(), "Unreadable variables file, skipped");
            continue;
        };
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        data.files.push(SassFile {
            name: stem.trim_start_matches('_').to_string(),
            path: rel_display(&src, &file),
            variables: extract(&content),
        });
    }

    let out = config.path(&config.project.data_dir).join(OUTPUT_FILENAME);
    let mut json = serde_json::to_string_pretty(&data)?;
    json.push('\n');
    write_if_changed(&out, json.as_bytes())?;
    Ok(TaskSummary {
        written: vec![out],
        ..TaskSummary::default()
    })
}

/// Extract single-line variable declarations in source order.
pub fn extract(source: &str) -> Vec<SassVariable> {
    source
        .lines()
        .filter_map(|line| {
            let caps = DECLARATION.captures(line)?;
            let (rest, comment) = split_comment(&caps[2]);
            let value = rest
                .trim()
                .trim_end_matches(';')
                .trim_end()
                .trim_end_matches("!default")
                .trim_end_matches("!global")
                .trim_end();
            if value.is_empty() || value.matches('(').count() != value.matches(')').count() {
                return None;
            }
            Some(SassVariable {
                name: caps[1].to_string(),
                value: value.to_string(),
                comment,
            })
        })
        .collect()
}

/// Split a trailing `//` comment off, ignoring `//` inside quotes or URLs.
fn split_comment(text: &str) -> (&str, Option<String>) {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    for i in 0..bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'/' && bytes.get(i + 1) == Some(&b'/') && (i == 0 || bytes[i - 1] != b':') => {
                let comment = text[i + 2..].trim();
                let comment = (!comment.is_empty()).then(|| comment.to_string());
                return (&text[..i], comment);
            }
            None => {}
        }
    }
    (text, None)
}
