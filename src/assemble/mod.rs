//! HTML assembly from layouts, materials, docs, views and data.
//!
//! ```text
//! src/
//! ├── data/                   *.json, *.yml → {{key.…}} by file stem
//! ├── docs/                   *.md → {{#each docs}}
//! ├── materials/
//! │   ├── 01-components/      collection "components"
//! │   │   └── 02-button.html  partial {{> button}}
//! │   └── symbols/            generated sprite previews
//! └── views/
//!     ├── layouts/
//!     │   ├── default.html    layout; the page is {{> body}}
//!     │   └── includes/       partials by file stem
//!     └── index.html          → dist/index.html
//! ```
//!
//! Every page is rendered with the same base context plus its own `page`
//! entry:
//!
//! | Key | Content |
//! |---|---|
//! | `<data stem>` | parsed data file (`sass` holds the extracted variables) |
//! | `materials` | `[{key, name, items: [{key, name, notes, data, content}]}]` |
//! | `docs` | `[{key, name, content}]` with content rendered to HTML |
//! | `page` | the view's front matter plus `key`, `name`, `path` |
//! | `dev` | build mode flag |
//!
//! A view picks its layout with the `layout` front-matter key (default from
//! config); `layout: false` renders the view on its own.

pub mod front_matter;
pub mod helpers;

use crate::config::BuildConfig;
use crate::naming::{self, ParsedName};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("{path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("{path}: invalid front matter: {message}")]
    FrontMatter { path: PathBuf, message: String },
    #[error("{path}: invalid data file: {message}")]
    Data { path: PathBuf, message: String },
    #[error("template '{name}': {message}")]
    Template { name: String, message: String },
    #[error("page {page}: {message}")]
    Render { page: String, message: String },
    #[error("{path}: {message}")]
    Write { path: PathBuf, message: String },
}

fn read(path: &Path) -> Result<String, AssembleError> {
    fs::read_to_string(path).map_err(|e| AssembleError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Source directories, resolved against the project root.
#[derive(Debug, Clone)]
pub struct Sources {
    pub data: PathBuf,
    pub layouts: PathBuf,
    pub includes: PathBuf,
    pub materials: PathBuf,
    pub docs: PathBuf,
    pub views: PathBuf,
    pub default_layout: String,
}

impl Sources {
    pub fn from_config(config: &BuildConfig) -> Self {
        let a = &config.project.assemble;
        Self {
            data: config.path(&config.project.data_dir),
            layouts: config.path(&a.layouts),
            includes: config.path(&a.layout_includes),
            materials: config.path(&a.materials),
            docs: config.path(&a.docs),
            views: config.path(&a.views),
            default_layout: a.default_layout.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub key: String,
    pub name: String,
    pub notes: Option<String>,
    /// Remaining front matter.
    pub data: Map<String, Value>,
    pub content: String,
    #[serde(skip)]
    order: (u32, String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub key: String,
    pub name: String,
    pub items: Vec<Material>,
    #[serde(skip)]
    order: (u32, String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Doc {
    pub key: String,
    pub name: String,
    pub content: String,
}

/// A view waiting to be rendered.
#[derive(Debug, Clone)]
pub struct View {
    /// Path relative to the views dir; also the output path.
    pub rel: PathBuf,
    pub meta: Map<String, Value>,
    pub body: String,
}

/// Pages written plus the errors tolerated along the way.
#[derive(Debug, Default)]
pub struct AssembleOutcome {
    pub pages: Vec<PathBuf>,
    pub errors: Vec<AssembleError>,
    /// Material partials skipped because an earlier collection used the key.
    pub warnings: Vec<String>,
}

/// Collects errors in dev mode; fails on the first one otherwise.
struct ErrorPolicy {
    tolerate: bool,
    errors: Vec<AssembleError>,
}

impl ErrorPolicy {
    fn handle(&mut self, error: AssembleError) -> Result<(), AssembleError> {
        if self.tolerate {
            tracing::error!("{error}");
            self.errors.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// Assemble every view into `dest`.
///
/// With `tolerate_errors` a failing template or page is logged and skipped;
/// otherwise the first error is returned.
pub fn assemble(
    sources: &Sources,
    dest: &Path,
    dev: bool,
    tolerate_errors: bool,
) -> Result<AssembleOutcome, AssembleError> {
    let mut policy = ErrorPolicy {
        tolerate: tolerate_errors,
        errors: Vec::new(),
    };

    let mut registry = Handlebars::new();
    helpers::register(&mut registry);

    let data = load_data(&sources.data, &mut policy)?;
    let collections = load_materials(&sources.materials, &mut policy)?;
    let docs = load_docs(&sources.docs)?;

    for (name, path) in html_files(&sources.includes, false) {
        let template = read(&path)?;
        if let Err(e) = registry.register_partial(&name, template) {
            policy.handle(AssembleError::Template {
                name,
                message: e.to_string(),
            })?;
        }
    }
    let mut warnings = Vec::new();
    let mut material_keys = HashSet::new();
    for collection in &collections {
        for item in &collection.items {
            if !material_keys.insert(item.key.as_str()) {
                let message = format!(
                    "duplicate material '{}' in '{}', keeping the first",
                    item.key, collection.key
                );
                tracing::warn!("{message}");
                warnings.push(message);
                continue;
            }
            if let Err(e) = registry.register_partial(&item.key, item.content.as_str()) {
                policy.handle(AssembleError::Template {
                    name: item.key.clone(),
                    message: e.to_string(),
                })?;
            }
        }
    }
    for (name, path) in html_files(&sources.layouts, false) {
        let template = read(&path)?;
        if let Err(e) = registry.register_template_string(&name, template) {
            policy.handle(AssembleError::Template {
                name,
                message: e.to_string(),
            })?;
        }
    }

    let mut base = data;
    base.insert("materials".into(), serde_json::to_value(&collections).unwrap_or_default());
    base.insert("docs".into(), serde_json::to_value(&docs).unwrap_or_default());
    base.insert("dev".into(), Value::Bool(dev));

    let mut outcome = AssembleOutcome {
        warnings,
        ..AssembleOutcome::default()
    };
    for view in load_views(&sources.views, &sources.layouts, &mut policy)? {
        let page = view.rel.to_string_lossy().replace('\\', "/");
        match render_view(&mut registry, &view, &base, &sources.default_layout) {
            Ok(html) => {
                let out = dest.join(&view.rel);
                write(&out, &html)?;
                outcome.pages.push(out);
            }
            Err(message) => policy.handle(AssembleError::Render { page, message })?,
        }
    }
    outcome.errors = policy.errors;
    Ok(outcome)
}

fn write(path: &Path, content: &str) -> Result<(), AssembleError> {
    let err = |e: std::io::Error| AssembleError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(err)?;
    }
    fs::write(path, content).map_err(err)
}

fn render_view(
    registry: &mut Handlebars<'_>,
    view: &View,
    base: &Map<String, Value>,
    default_layout: &str,
) -> Result<String, String> {
    let stem = view
        .rel
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let parsed = naming::parse_entry_name(stem);
    let mut page = view.meta.clone();
    page.entry("key").or_insert_with(|| json!(parsed.key));
    page.entry("name").or_insert_with(|| json!(parsed.title));
    page.insert("path".into(), json!(view.rel.to_string_lossy().replace('\\', "/")));

    let mut context = base.clone();
    context.insert("page".into(), Value::Object(page));
    let context = Value::Object(context);

    let layout = match view.meta.get("layout") {
        Some(Value::Bool(false)) => None,
        Some(Value::String(name)) => Some(name.as_str()),
        _ => Some(default_layout),
    };

    match layout {
        None => registry
            .render_template(&view.body, &context)
            .map_err(|e| e.to_string()),
        Some(name) => {
            if !registry.has_template(name) {
                return Err(format!("layout '{name}' not found"));
            }
            registry
                .register_partial("body", view.body.as_str())
                .map_err(|e| e.to_string())?;
            registry.render(name, &context).map_err(|e| e.to_string())
        }
    }
}

/// `(stem, path)` of every `.html` file in `dir`, sorted by path.
fn html_files(dir: &Path, recursive: bool) -> Vec<(String, PathBuf)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let walker = WalkDir::new(dir).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };
    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|x| x == "html"))
        .filter_map(|e| {
            let stem = e.path().file_stem()?.to_str()?.to_string();
            Some((stem, e.into_path()))
        })
        .collect()
}

/// Data files keyed by stem. JSON wins over YAML for the same stem.
fn load_data(dir: &Path, policy: &mut ErrorPolicy) -> Result<Map<String, Value>, AssembleError> {
    let mut data = Map::new();
    if !dir.is_dir() {
        return Ok(data);
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    // yml/yaml before json so json lands last and wins.
    files.sort_by_key(|p| {
        let ext = p.extension().and_then(|e| e.to_str()).unwrap_or_default();
        (ext == "json", p.clone())
    });

    for path in files {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let parsed: Result<Value, String> = match ext {
            "json" => serde_json::from_str(&read(&path)?).map_err(|e| e.to_string()),
            "yml" | "yaml" => serde_yaml::from_str::<serde_yaml::Value>(&read(&path)?)
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
            _ => continue,
        };
        match parsed {
            Ok(value) => {
                data.insert(stem, value);
            }
            Err(message) => policy.handle(AssembleError::Data { path, message })?,
        }
    }
    Ok(data)
}

/// Materials grouped by their first directory under `dir`.
///
/// Files directly in `dir` form a collection keyed by the directory name
/// itself.
fn load_materials(dir: &Path, policy: &mut ErrorPolicy) -> Result<Vec<Collection>, AssembleError> {
    let mut collections: Vec<Collection> = Vec::new();
    if !dir.is_dir() {
        return Ok(collections);
    }
    let root_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("materials")
        .to_string();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let is_md = path.extension().is_some_and(|x| x == "md");
        let is_html = path.extension().is_some_and(|x| x == "html");
        if !entry.file_type().is_file() || !(is_md || is_html) {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path);
        let group = if rel.components().count() > 1 {
            rel.components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            root_name.clone()
        };

        let source = read(path)?;
        let (mut meta, body) = match front_matter::split(&source) {
            Ok(split) => split,
            Err(message) => {
                policy.handle(AssembleError::FrontMatter {
                    path: path.to_path_buf(),
                    message,
                })?;
                continue;
            }
        };
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let parsed = naming::parse_entry_name(stem);
        let name = match meta.remove("name") {
            Some(Value::String(n)) => n,
            _ => parsed.title.clone(),
        };
        let notes = match meta.remove("notes") {
            Some(Value::String(n)) => Some(helpers::render_markdown(&n)),
            _ => None,
        };
        let content = if is_md {
            helpers::render_markdown(body)
        } else {
            body.to_string()
        };

        let group_name = naming::parse_entry_name(&group);
        let index = match collections.iter().position(|c| c.key == group_name.key) {
            Some(i) => i,
            None => {
                collections.push(collection(&group_name));
                collections.len() - 1
            }
        };
        collections[index].items.push(Material {
            key: parsed.key.clone(),
            name,
            notes,
            data: meta,
            content,
            order: naming::order_key(&parsed),
        });
    }

    collections.sort_by(|a, b| a.order.cmp(&b.order));
    for c in &mut collections {
        c.items.sort_by(|a, b| a.order.cmp(&b.order));
    }
    Ok(collections)
}

fn collection(name: &ParsedName) -> Collection {
    Collection {
        key: name.key.clone(),
        name: name.title.clone(),
        items: Vec::new(),
        order: naming::order_key(name),
    }
}

fn load_docs(dir: &Path) -> Result<Vec<Doc>, AssembleError> {
    let mut docs = Vec::new();
    if !dir.is_dir() {
        return Ok(docs);
    }
    let mut entries: Vec<(ParsedName, PathBuf)> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "md"))
        .filter_map(|e| {
            let stem = e.path().file_stem()?.to_str()?.to_string();
            Some((naming::parse_entry_name(&stem), e.into_path()))
        })
        .collect();
    entries.sort_by_key(|(parsed, _)| naming::order_key(parsed));
    for (parsed, path) in entries {
        docs.push(Doc {
            key: parsed.key,
            name: parsed.title,
            content: helpers::render_markdown(&read(&path)?),
        });
    }
    Ok(docs)
}

/// Every `.html` view outside the layouts dir.
fn load_views(
    dir: &Path,
    layouts: &Path,
    policy: &mut ErrorPolicy,
) -> Result<Vec<View>, AssembleError> {
    let mut views = Vec::new();
    if !dir.is_dir() {
        return Ok(views);
    }
    for (_, path) in html_files(dir, true) {
        if path.starts_with(layouts) {
            continue;
        }
        let source = read(&path)?;
        match front_matter::split(&source) {
            Ok((meta, body)) => views.push(View {
                rel: path.strip_prefix(dir).unwrap_or(&path).to_path_buf(),
                meta,
                body: body.to_string(),
            }),
            Err(message) => policy.handle(AssembleError::FrontMatter { path, message })?,
        }
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Site {
        tmp: TempDir,
    }

    impl Site {
        fn new() -> Self {
            let site = Self {
                tmp: TempDir::new().unwrap(),
            };
            site.write(
                "src/views/layouts/default.html",
                "<html><body class=\"{{#if dev}}dev{{/if}}\">{{> header}}{{> body}}</body></html>",
            );
            site.write("src/views/layouts/includes/header.html", "<h1>{{site.title}}</h1>");
            site.write("src/data/site.yml", "title: Library\n");
            site
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.tmp.path().join(rel)).unwrap()
        }

        fn sources(&self) -> Sources {
            let root = self.tmp.path();
            Sources {
                data: root.join("src/data"),
                layouts: root.join("src/views/layouts"),
                includes: root.join("src/views/layouts/includes"),
                materials: root.join("src/materials"),
                docs: root.join("src/docs"),
                views: root.join("src/views"),
                default_layout: "default".into(),
            }
        }

        fn build(&self, tolerate: bool) -> Result<AssembleOutcome, AssembleError> {
            assemble(&self.sources(), &self.tmp.path().join("dist"), false, tolerate)
        }
    }

    // =========================================================================
    // Layouts, includes and data
    // =========================================================================

    #[test]
    fn view_renders_inside_layout_with_data() {
        let site = Site::new();
        site.write("src/views/index.html", "<p>{{page.name}}</p>");
        let outcome = site.build(false).unwrap();
        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(
            site.read("dist/index.html"),
            "<html><body class=\"\"><h1>Library</h1><p>Index</p></body></html>"
        );
    }

    #[test]
    fn layout_false_renders_bare() {
        let site = Site::new();
        site.write("src/views/raw.html", "---\nlayout: false\n---\n{{site.title}}");
        site.build(false).unwrap();
        assert_eq!(site.read("dist/raw.html"), "Library");
    }

    #[test]
    fn nested_views_mirror_paths_and_skip_layouts() {
        let site = Site::new();
        site.write("src/views/pages/about.html", "---\nlayout: false\n---\nabout");
        let outcome = site.build(false).unwrap();
        assert_eq!(outcome.pages, vec![site.tmp.path().join("dist/pages/about.html")]);
        assert!(!site.tmp.path().join("dist/layouts").exists());
    }

    #[test]
    fn json_data_wins_over_yaml() {
        let site = Site::new();
        site.write("src/data/site.json", r#"{"title": "From JSON"}"#);
        site.write("src/views/index.html", "---\nlayout: false\n---\n{{site.title}}");
        site.build(false).unwrap();
        assert_eq!(site.read("dist/index.html"), "From JSON");
    }

    // =========================================================================
    // Materials and docs
    // =========================================================================

    #[test]
    fn materials_grouped_ordered_and_registered_as_partials() {
        let site = Site::new();
        site.write("src/materials/02-components/02-card.html", "<div class=card></div>");
        site.write(
            "src/materials/02-components/01-button.html",
            "---\nnotes: Use **sparingly**\n---\n<button></button>",
        );
        site.write("src/materials/01-elements/link.html", "<a></a>");
        site.write(
            "src/views/index.html",
            "---\nlayout: false\n---\n{{#each materials}}[{{key}}:{{#each items}}{{key}},{{/each}}]{{/each}}{{> button}}",
        );

        site.build(false).unwrap();
        assert_eq!(
            site.read("dist/index.html"),
            "[elements:link,][components:button,card,]<button></button>"
        );
    }

    #[test]
    fn duplicate_material_key_keeps_first_collection() {
        let site = Site::new();
        site.write("src/materials/01-elements/button.html", "<button>element</button>");
        site.write("src/materials/02-components/button.html", "<button>component</button>");
        site.write("src/views/index.html", "---\nlayout: false\n---\n{{> button}}");

        let outcome = site.build(false).unwrap();
        assert_eq!(
            outcome.warnings,
            vec!["duplicate material 'button' in 'components', keeping the first"]
        );
        assert_eq!(site.read("dist/index.html"), "<button>element</button>");
    }

    #[test]
    fn material_notes_render_markdown() {
        let site = Site::new();
        site.write(
            "src/materials/components/button.html",
            "---\nnotes: Use **sparingly**\n---\n<button></button>",
        );
        site.write(
            "src/views/index.html",
            "---\nlayout: false\n---\n{{#each materials}}{{#each items}}{{{notes}}}{{/each}}{{/each}}",
        );
        site.build(false).unwrap();
        assert_eq!(site.read("dist/index.html"), "<p>Use <strong>sparingly</strong></p>\n");
    }

    #[test]
    fn sprite_preview_material_pulls_in_include() {
        let site = Site::new();
        site.write("src/views/layouts/includes/symbols-demo.html", "<svg><symbol id=\"a\"/></svg>");
        site.write("src/materials/symbols/demo.html", "{{>symbols-demo}}\n<use href=\"#a\"/>");
        site.write("src/views/index.html", "---\nlayout: false\n---\n{{> demo}}");
        site.build(false).unwrap();
        assert!(site.read("dist/index.html").starts_with("<svg><symbol id=\"a\"/></svg>"));
    }

    #[test]
    fn docs_rendered_in_order() {
        let site = Site::new();
        site.write("src/docs/02-usage.md", "# Usage");
        site.write("src/docs/01-intro.md", "# Intro");
        site.write(
            "src/views/docs.html",
            "---\nlayout: false\n---\n{{#each docs}}{{name}}={{{content}}}{{/each}}",
        );
        site.build(false).unwrap();
        assert_eq!(
            site.read("dist/docs.html"),
            "Intro=<h1>Intro</h1>\nUsage=<h1>Usage</h1>\n"
        );
    }

    // =========================================================================
    // Error policy
    // =========================================================================

    #[test]
    fn missing_layout_fails_in_strict_mode() {
        let site = Site::new();
        site.write("src/views/index.html", "---\nlayout: nope\n---\nx");
        let err = site.build(false).unwrap_err();
        assert!(matches!(err, AssembleError::Render { .. }));
    }

    #[test]
    fn tolerant_mode_logs_and_keeps_rendering() {
        let site = Site::new();
        site.write("src/views/a.html", "---\nlayout: false\n---\n{{#if}}broken");
        site.write("src/views/b.html", "---\nlayout: false\n---\nfine");
        let outcome = site.build(true).unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(site.read("dist/b.html"), "fine");
        assert!(!site.tmp.path().join("dist/a.html").exists());
    }

    #[test]
    fn bad_front_matter_is_reported() {
        let site = Site::new();
        site.write("src/views/a.html", "---\ntitle: [unclosed\n---\nx");
        assert!(matches!(
            site.build(false),
            Err(AssembleError::FrontMatter { .. })
        ));
    }
}
