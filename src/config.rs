//! Build configuration.
//!
//! Everything a build needs to know is collected once, at startup, into a
//! [`BuildConfig`] that is passed by reference to every task. Nothing reads
//! the process environment after that point.
//!
//! ## Config File Location
//!
//! An optional `patternforge.toml` at the project root overrides the stock
//! defaults. The file is sparse: only the keys you want to change need to be
//! present. Unknown keys are rejected to catch typos early.
//!
//! ```text
//! project/
//! ├── patternforge.toml        # optional
//! ├── src/
//! │   ├── assets/              # fabricator + toolkit styles, scripts, svgs
//! │   ├── data/                # data files (sass.json is generated here)
//! │   ├── docs/
//! │   ├── materials/
//! │   └── views/
//! └── dist/                    # output root (removed by `clean`)
//! ```
//!
//! ## Mode and user
//!
//! The two per-invocation settings come from the CLI (or the
//! `PATTERNFORGE_DEV` / `PATTERNFORGE_USER` environment variables) rather
//! than the file: [`Mode`] selects dev (expanded CSS, source maps, live
//! reload, serve after build) or prod (compressed output), and the deploy
//! user names the account used for uploads.

use crate::prefix::BrowserTargets;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the optional project config file.
pub const CONFIG_FILENAME: &str = "patternforge.toml";

/// Deploy user when none is given on the command line or in the environment.
pub const DEFAULT_USER: &str = "deploy";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn from_flag(dev: bool) -> Self {
        if dev { Mode::Dev } else { Mode::Prod }
    }
}

/// Immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub mode: Mode,
    pub user: String,
    /// Project root; every relative path in [`ProjectConfig`] resolves here.
    pub root: PathBuf,
    pub project: ProjectConfig,
}

impl BuildConfig {
    pub fn new(root: impl Into<PathBuf>, mode: Mode, user: impl Into<String>, project: ProjectConfig) -> Self {
        Self {
            mode,
            user: user.into(),
            root: root.into(),
            project,
        }
    }

    /// Load `patternforge.toml` from `root` (if any) and build the run config.
    pub fn load(root: &Path, mode: Mode, user: &str) -> Result<Self, ConfigError> {
        let project = load_config(root)?;
        Ok(Self::new(root, mode, user, project))
    }

    pub fn is_dev(&self) -> bool {
        self.mode == Mode::Dev
    }

    /// Resolve a project-relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// The output root.
    pub fn dest(&self) -> PathBuf {
        self.root.join(&self.project.dest)
    }

    /// Resolve a path relative to the output root.
    pub fn dest_path(&self, rel: &str) -> PathBuf {
        self.dest().join(rel)
    }

    /// The SVG categories in declaration order.
    ///
    /// An empty category list selects the single unnamed category that
    /// covers every SVG under the SVG root.
    pub fn svg_categories(&self) -> Vec<SvgCategory> {
        let svg_root = self.path(&self.project.svgs.src);
        if self.project.svgs.categories.is_empty() {
            return vec![SvgCategory {
                name: String::new(),
                source_glob: glob_under(&svg_root, "**/*.svg"),
            }];
        }
        self.project
            .svgs
            .categories
            .iter()
            .map(|name| SvgCategory {
                name: name.clone(),
                source_glob: glob_under(&svg_root.join(name), "**/*.svg"),
            })
            .collect()
    }
}

/// `pattern` anchored at `dir`, with glob metacharacters in `dir` escaped.
fn glob_under(dir: &Path, pattern: &str) -> String {
    format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern)
}

/// A named group of SVGs that becomes one sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgCategory {
    /// Category name; empty for the legacy single category.
    pub name: String,
    pub source_glob: String,
}

impl SvgCategory {
    /// Partial name of the sprite include: `symbols-<name>`, or `symbols`.
    pub fn partial_name(&self) -> String {
        if self.name.is_empty() {
            "symbols".to_string()
        } else {
            format!("symbols-{}", self.name)
        }
    }

    /// Stem shared by the preview and image bundle: `<name>`, or `symbols`.
    pub fn stem(&self) -> &str {
        if self.name.is_empty() { "symbols" } else { &self.name }
    }
}

/// Project configuration loaded from `patternforge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Output root, relative to the project root.
    pub dest: String,
    /// Directory holding data files for assembly (also receives `sass.json`).
    pub data_dir: String,
    pub scripts: ScriptsConfig,
    pub styles: StylesConfig,
    pub fonts: FontsConfig,
    pub images: ImagesConfig,
    pub svgs: SvgsConfig,
    pub variables: VariablesConfig,
    pub assemble: AssembleConfig,
    pub serve: ServeConfig,
    pub remote: RemoteConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dest: "dist".to_string(),
            data_dir: "src/data".to_string(),
            scripts: ScriptsConfig::default(),
            styles: StylesConfig::default(),
            fonts: FontsConfig::default(),
            images: ImagesConfig::default(),
            svgs: SvgsConfig::default(),
            variables: VariablesConfig::default(),
            assemble: AssembleConfig::default(),
            serve: ServeConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Validate values that would make a build destructive or ambiguous.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dest(&self.dest)?;

        let mut seen = HashSet::new();
        for name in &self.svgs.categories {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "svgs.categories must not contain empty names".into(),
                ));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
            {
                return Err(ConfigError::Validation(format!(
                    "svgs.categories: '{name}' may only use a-z, 0-9, '-' and '_'"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "svgs.categories: '{name}' is listed twice"
                )));
            }
        }

        for (key, theme) in [
            ("styles.fabricator", &self.styles.fabricator),
            ("styles.toolkit", &self.styles.toolkit),
        ] {
            BrowserTargets::parse(&theme.browsers).map_err(|e| {
                ConfigError::Validation(format!("{key}.browsers: {e}"))
            })?;
            if theme.rename.is_some() && theme.entries.len() > 1 {
                return Err(ConfigError::Validation(format!(
                    "{key}.rename requires exactly one entry"
                )));
            }
        }

        if self.remote.port == 0 {
            return Err(ConfigError::Validation("remote.port must be non-zero".into()));
        }
        if self.serve.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "serve.debounce_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// `clean` removes the output root, so it must stay strictly inside the project.
fn validate_dest(dest: &str) -> Result<(), ConfigError> {
    let path = Path::new(dest);
    let inside = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)));
    if inside {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "dest '{dest}' must be a relative directory inside the project"
        )))
    }
}

/// Script bundle entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    pub fabricator: String,
    pub fabricator_out: String,
    pub toolkit: String,
    pub toolkit_out: String,
    /// Where bare module specifiers (`require("lib")`) are looked up.
    pub node_modules: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            fabricator: "src/assets/fabricator/scripts/fabricator.js".to_string(),
            fabricator_out: "assets/fabricator/scripts/f.js".to_string(),
            toolkit: "src/assets/toolkit/scripts/toolkit.js".to_string(),
            toolkit_out: "assets/toolkit/scripts/toolkit.js".to_string(),
            node_modules: "node_modules".to_string(),
        }
    }
}

/// Both style themes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    pub fabricator: ThemeConfig,
    pub toolkit: ThemeConfig,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            fabricator: ThemeConfig {
                entries: vec!["src/assets/fabricator/styles/fabricator.scss".to_string()],
                watch: "src/assets/fabricator/styles".to_string(),
                browsers: "last 1 version".to_string(),
                dest: "assets/fabricator/styles".to_string(),
                rename: Some("f.css".to_string()),
            },
            toolkit: ThemeConfig {
                entries: vec![
                    "src/assets/toolkit/styles/toolkit.scss".to_string(),
                    "src/assets/toolkit/styles/styles.scss".to_string(),
                ],
                watch: "src/assets/toolkit/styles".to_string(),
                browsers: "last 3 versions".to_string(),
                dest: "assets/toolkit/styles".to_string(),
                rename: None,
            },
        }
    }
}

/// One Sass theme: entry files, browser target and destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    pub entries: Vec<String>,
    /// Directory whose `*.scss`/`*.sass` changes re-run this theme.
    pub watch: String,
    /// Browser target, e.g. `"last 3 versions"`.
    pub browsers: String,
    /// Destination directory under the output root.
    pub dest: String,
    /// Fixed output filename (single-entry themes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub src: String,
    pub dest: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            src: "src/assets/toolkit/fonts".to_string(),
            dest: "assets/toolkit/fonts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub src: String,
    pub dest: String,
    /// Copied to the output root alongside the images.
    pub favicon: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            src: "src/assets/toolkit/images".to_string(),
            dest: "assets/toolkit/images".to_string(),
            favicon: "src/favicon.ico".to_string(),
        }
    }
}

/// SVG sprite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvgsConfig {
    /// Root of the SVG sources; each category is a subdirectory.
    pub src: String,
    /// Ordered category names. Empty = one unnamed category.
    pub categories: Vec<String>,
    /// Receives `symbols-<name>.html` (source tree).
    pub includes_dir: String,
    /// Receives `<name>.html` preview materials (source tree).
    pub preview_dir: String,
    /// Receives `_symbols-<name>.sass` (source tree).
    pub variables_dir: String,
    /// Receives `<name>.svg`, relative to the output root.
    pub dest: String,
}

impl Default for SvgsConfig {
    fn default() -> Self {
        Self {
            src: "src/assets/toolkit/svgs".to_string(),
            categories: ["resources", "clients", "publications", "global"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            includes_dir: "src/views/layouts/includes".to_string(),
            preview_dir: "src/materials/symbols".to_string(),
            variables_dir: "src/assets/toolkit/styles/variables".to_string(),
            dest: "assets/toolkit/images".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariablesConfig {
    /// Directory of `*.sass`/`*.scss` variable fragments.
    pub src: String,
}

impl Default for VariablesConfig {
    fn default() -> Self {
        Self {
            src: "src/assets/toolkit/styles/variables".to_string(),
        }
    }
}

/// Template assembly inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssembleConfig {
    pub layouts: String,
    pub layout_includes: String,
    pub views: String,
    pub materials: String,
    pub docs: String,
    pub default_layout: String,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            layouts: "src/views/layouts".to_string(),
            layout_includes: "src/views/layouts/includes".to_string(),
            views: "src/views".to_string(),
            materials: "src/materials".to_string(),
            docs: "src/docs".to_string(),
            default_layout: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub port: u16,
    /// Filesystem events closer together than this are batched.
    pub debounce_ms: u64,
    /// Directory watched for source changes.
    pub watch_root: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            debounce_ms: 200,
            watch_root: "src".to_string(),
        }
    }
}

/// Upload target for `sftp` and `sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    /// Remote directory receiving the whole output root (`sftp`).
    pub deploy_path: String,
    /// Remote directory receiving `sync_source` (`sync`).
    pub sync_path: String,
    /// Subdirectory of the output root uploaded by `sync`.
    pub sync_source: String,
    /// SFTP client executable.
    pub client: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "styleguide.example.com".to_string(),
            port: 22,
            deploy_path: "/var/www/styleguide".to_string(),
            sync_path: "/var/www/toolkit".to_string(),
            sync_source: "assets/toolkit".to_string(),
            client: "sftp".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `patternforge.toml` from `root` as a raw TOML value, if present.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge user values over the stock defaults, then deserialize and validate.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// A fully commented stock `patternforge.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# patternforge configuration
# ==========================
# Every setting is optional; the values below are the defaults.
# Paths are relative to the project root unless noted otherwise.
# Unknown keys are rejected.

# Output root. `clean` deletes it, so it must live inside the project.
dest = "dist"

# Data files (json/yml) made available to templates. The sass-data task
# writes sass.json here.
data_dir = "src/data"

# ---------------------------------------------------------------------------
# Scripts
# ---------------------------------------------------------------------------
[scripts]
fabricator = "src/assets/fabricator/scripts/fabricator.js"
fabricator_out = "assets/fabricator/scripts/f.js"   # relative to dest
toolkit = "src/assets/toolkit/scripts/toolkit.js"
toolkit_out = "assets/toolkit/scripts/toolkit.js"   # relative to dest
node_modules = "node_modules"

# ---------------------------------------------------------------------------
# Styles (SCSS). `browsers` drives vendor prefixing.
# ---------------------------------------------------------------------------
[styles.fabricator]
entries = ["src/assets/fabricator/styles/fabricator.scss"]
watch = "src/assets/fabricator/styles"
browsers = "last 1 version"
dest = "assets/fabricator/styles"
rename = "f.css"

[styles.toolkit]
# toolkit.css for the library, styles.css for production use
entries = ["src/assets/toolkit/styles/toolkit.scss", "src/assets/toolkit/styles/styles.scss"]
watch = "src/assets/toolkit/styles"
browsers = "last 3 versions"
dest = "assets/toolkit/styles"

# ---------------------------------------------------------------------------
# Static assets
# ---------------------------------------------------------------------------
[fonts]
src = "src/assets/toolkit/fonts"
dest = "assets/toolkit/fonts"

[images]
src = "src/assets/toolkit/images"
dest = "assets/toolkit/images"
favicon = "src/favicon.ico"

# ---------------------------------------------------------------------------
# SVG sprites. One sprite per category (subdirectory of `src`).
# An empty list builds a single sprite from every SVG under `src`.
# ---------------------------------------------------------------------------
[svgs]
src = "src/assets/toolkit/svgs"
categories = ["resources", "clients", "publications", "global"]
includes_dir = "src/views/layouts/includes"
preview_dir = "src/materials/symbols"
variables_dir = "src/assets/toolkit/styles/variables"
dest = "assets/toolkit/images"

# ---------------------------------------------------------------------------
# Variable extraction
# ---------------------------------------------------------------------------
[variables]
src = "src/assets/toolkit/styles/variables"

# ---------------------------------------------------------------------------
# Template assembly
# ---------------------------------------------------------------------------
[assemble]
layouts = "src/views/layouts"
layout_includes = "src/views/layouts/includes"
views = "src/views"
materials = "src/materials"
docs = "src/docs"
default_layout = "default"

# ---------------------------------------------------------------------------
# Dev server
# ---------------------------------------------------------------------------
[serve]
port = 3000
debounce_ms = 200
watch_root = "src"

# ---------------------------------------------------------------------------
# Remote upload (sftp / sync). The user comes from --user.
# ---------------------------------------------------------------------------
[remote]
host = "styleguide.example.com"
port = 22
deploy_path = "/var/www/styleguide"
sync_path = "/var/www/toolkit"
sync_source = "assets/toolkit"
client = "sftp"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_validates() {
        assert!(ProjectConfig::default().validate().is_ok());
    }

    #[test]
    fn default_categories_in_order() {
        let config = ProjectConfig::default();
        assert_eq!(
            config.svgs.categories,
            vec!["resources", "clients", "publications", "global"]
        );
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let toml = r#"
dest = "build"

[svgs]
categories = ["demo"]
"#;
        let merged = merge_toml(stock_defaults_value(), toml::from_str(toml).unwrap());
        let config: ProjectConfig = merged.try_into().unwrap();
        assert_eq!(config.dest, "build");
        assert_eq!(config.svgs.categories, vec!["demo"]);
        assert_eq!(config.svgs.src, "src/assets/toolkit/svgs");
        assert_eq!(config.styles.fabricator.rename.as_deref(), Some("f.css"));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_without_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.dest, "dist");
        assert_eq!(config.remote.port, 22);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[remote]
host = "docs.internal"
port = 2222
"#,
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.remote.host, "docs.internal");
        assert_eq!(config.remote.port, 2222);
        assert_eq!(config.remote.deploy_path, "/var/www/styleguide");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "dest = [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[svgs]
categorys = ["a"]
"#,
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn dest_outside_project_rejected() {
        for dest in ["", ".", "..", "../out", "/tmp/out", "a/../../b"] {
            let config = ProjectConfig {
                dest: dest.to_string(),
                ..ProjectConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "dest {dest:?} should be rejected"
            );
        }
    }

    #[test]
    fn nested_dest_accepted() {
        let config = ProjectConfig {
            dest: "build/site".to_string(),
            ..ProjectConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_category_rejected() {
        let mut config = ProjectConfig::default();
        config.svgs.categories = vec!["icons".into(), "icons".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn category_charset_enforced() {
        let mut config = ProjectConfig::default();
        config.svgs.categories = vec!["My Icons".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_browser_target_rejected() {
        let mut config = ProjectConfig::default();
        config.styles.toolkit.browsers = "> 1%".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("styles.toolkit.browsers"));
    }

    #[test]
    fn rename_with_several_entries_rejected() {
        let mut config = ProjectConfig::default();
        config.styles.fabricator.entries.push("src/other.scss".into());
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // SVG categories
    // =========================================================================

    #[test]
    fn named_categories_resolve_under_svg_root() {
        let mut project = ProjectConfig::default();
        project.svgs.categories = vec!["demo".into()];
        let config = BuildConfig::new("/proj", Mode::Prod, DEFAULT_USER, project);
        let cats = config.svg_categories();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].name, "demo");
        assert_eq!(cats[0].source_glob, "/proj/src/assets/toolkit/svgs/demo/**/*.svg");
        assert_eq!(cats[0].partial_name(), "symbols-demo");
        assert_eq!(cats[0].stem(), "demo");
    }

    #[test]
    fn empty_category_list_is_single_unnamed_category() {
        let mut project = ProjectConfig::default();
        project.svgs.categories.clear();
        let config = BuildConfig::new("/proj", Mode::Prod, DEFAULT_USER, project);
        let cats = config.svg_categories();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].partial_name(), "symbols");
        assert_eq!(cats[0].stem(), "symbols");
        assert_eq!(cats[0].source_glob, "/proj/src/assets/toolkit/svgs/**/*.svg");
    }

    #[test]
    fn category_glob_escapes_project_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("site [v2]*");
        let svg = root.join("src/assets/toolkit/svgs/demo/a.svg");
        std::fs::create_dir_all(svg.parent().unwrap()).unwrap();
        std::fs::write(&svg, "<svg/>").unwrap();

        let mut project = ProjectConfig::default();
        project.svgs.categories = vec!["demo".into()];
        let config = BuildConfig::new(&root, Mode::Prod, DEFAULT_USER, project);
        let found: Vec<PathBuf> = glob::glob(&config.svg_categories()[0].source_glob)
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(found, vec![svg]);
    }

    #[test]
    fn toolkit_builds_library_and_production_sheets() {
        let entries = ProjectConfig::default().styles.toolkit.entries;
        assert_eq!(
            entries,
            vec![
                "src/assets/toolkit/styles/toolkit.scss",
                "src/assets/toolkit/styles/styles.scss"
            ]
        );
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ProjectConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ProjectConfig::default();
        assert_eq!(config.dest, defaults.dest);
        assert_eq!(config.svgs.categories, defaults.svgs.categories);
        assert_eq!(config.styles.toolkit.browsers, defaults.styles.toolkit.browsers);
        assert_eq!(config.styles.toolkit.entries, defaults.styles.toolkit.entries);
        assert_eq!(config.styles.fabricator.rename, defaults.styles.fabricator.rename);
        assert_eq!(config.remote.sync_source, defaults.remote.sync_source);
        assert_eq!(config.serve.port, defaults.serve.port);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for key in [
            "scripts", "styles", "fonts", "images", "svgs", "variables", "assemble", "serve",
            "remote",
        ] {
            assert!(val.get(key).is_some(), "missing section {key}");
        }
    }
}
