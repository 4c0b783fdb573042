//! CommonJS script bundler.
//!
//! Each [`BundleEntry`] is walked from its entry module through static
//! `require("...")` calls; every reachable module is wrapped in a function
//! and the set is emitted as one self-contained file with a tiny loader.
//!
//! A run never fails as a whole. Problems are collected into the returned
//! [`BundleResult`]:
//!
//! - **errors**: missing entry, unresolvable request, unreadable module,
//!   unwritable output;
//! - **warnings**: `require(...)` with a non-literal argument (left in
//!   place, resolved at runtime only if the loader knows the name).
//!
//! Resolution follows the usual rules: requests starting with `./`, `../`
//! or `/` resolve against the requiring module's directory, anything else
//! against `node_modules`. Each candidate is tried as a file, then with a
//! `.js` suffix, then as a directory (`package.json` `main`, then
//! `index.js`).
//!
//! Modules are read through the shared [`ModuleCache`]; see [`cache`] for
//! its staleness rules.

pub mod cache;

pub use cache::{CacheStats, CachedModule, ModuleCache};

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

static STATIC_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*(?:'([^'\n]*)'|"([^"\n]*)")\s*\)"#)
        .expect("require pattern is valid")
});

static ANY_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brequire\s*\(").expect("require pattern is valid"));

const LOADER: &str = "(function (modules) {
  var cache = {};
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var module = (cache[id] = { exports: {} });
    var deps = modules[id][1];
    modules[id][0].call(module.exports, function (name) {
      if (!(name in deps)) throw new Error(\"Cannot find module '\" + name + \"'\");
      return load(deps[name]);
    }, module, module.exports);
    return module.exports;
  }
  load(0);
})({
";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("Entry module not found: Error: Can't resolve '{0}'")]
    MissingEntry(PathBuf),
    #[error("Module not found: Error: Can't resolve '{request}' in '{dir}'")]
    Unresolved { request: String, dir: PathBuf },
    #[error("Module build failed: {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Cannot write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// One bundle to produce.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub source: PathBuf,
    /// Output file, absolute or relative to the destination passed to [`Bundler::run`].
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutput {
    pub path: PathBuf,
    pub modules: usize,
    pub bytes: usize,
}

/// Everything a bundle run produced.
#[derive(Debug, Clone, Default)]
pub struct BundleResult {
    pub errors: Vec<BundleError>,
    pub warnings: Vec<String>,
    pub outputs: Vec<BundleOutput>,
    /// SHA-256 over every emitted bundle, in entry order.
    pub hash: String,
    pub cache: CacheStats,
}

impl BundleResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

struct ModuleRecord {
    path: PathBuf,
    module: CachedModule,
    deps: BTreeMap<String, usize>,
}

/// Bundler holding the module cache shared across runs.
#[derive(Debug, Clone)]
pub struct Bundler {
    cache: Arc<Mutex<ModuleCache>>,
    node_modules: PathBuf,
}

impl Bundler {
    pub fn new(node_modules: impl Into<PathBuf>) -> Self {
        Self {
            cache: Arc::new(Mutex::new(ModuleCache::new())),
            node_modules: node_modules.into(),
        }
    }

    fn cache(&self) -> MutexGuard<'_, ModuleCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Evict the cached module whose key contains `changed`.
    pub fn invalidate(&self, changed: &Path) -> Option<String> {
        let removed = self.cache().invalidate_matching(&changed.to_string_lossy());
        if let Some(key) = &removed {
            debug!(module = %key, "Evicted cached module");
        }
        removed
    }

    pub fn cached_modules(&self) -> usize {
        self.cache().len()
    }

    /// Bundle every entry and write the results under `dest`.
    pub fn run(&self, entries: &[BundleEntry], dest: &Path) -> BundleResult {
        let mut result = BundleResult::default();
        let mut hasher = Sha256::new();

        for entry in entries {
            let Some(modules) = self.collect(entry, &mut result) else {
                continue;
            };
            let code = render(&modules);
            let path = dest.join(&entry.output);
            let written = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&path, &code));
            match written {
                Ok(()) => {
                    hasher.update(code.as_bytes());
                    result.outputs.push(BundleOutput {
                        path,
                        modules: modules.len(),
                        bytes: code.len(),
                    });
                }
                Err(e) => result.errors.push(BundleError::Write {
                    path,
                    message: e.to_string(),
                }),
            }
        }

        result.hash = format!("{:x}", hasher.finalize());
        result.cache = self.cache().take_stats();
        result
    }

    /// Walk the module graph of `entry`. The entry module gets id 0.
    fn collect(&self, entry: &BundleEntry, result: &mut BundleResult) -> Option<Vec<ModuleRecord>> {
        let Ok(entry_path) = entry.source.canonicalize() else {
            result
                .errors
                .push(BundleError::MissingEntry(entry.source.clone()));
            return None;
        };
        let entry_module = match self.load(&entry_path) {
            Ok(m) => m,
            Err(e) => {
                result.errors.push(e);
                return None;
            }
        };

        let mut ids: HashMap<PathBuf, usize> = HashMap::from([(entry_path.clone(), 0)]);
        let mut modules = vec![ModuleRecord {
            path: entry_path,
            module: entry_module,
            deps: BTreeMap::new(),
        }];

        let mut i = 0;
        while i < modules.len() {
            let dir = modules[i]
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            if modules[i].module.dynamic_requires > 0 {
                result.warnings.push(format!(
                    "{}: Critical dependency: the request of a dependency is an expression",
                    modules[i].path.display()
                ));
            }
            for request in modules[i].module.requests.clone() {
                let Some(resolved) = self.resolve(&request, &dir) else {
                    result.errors.push(BundleError::Unresolved {
                        request: request.clone(),
                        dir: dir.clone(),
                    });
                    continue;
                };
                let id = match ids.get(&resolved) {
                    Some(id) => *id,
                    None => match self.load(&resolved) {
                        Ok(module) => {
                            let id = modules.len();
                            ids.insert(resolved.clone(), id);
                            modules.push(ModuleRecord {
                                path: resolved,
                                module,
                                deps: BTreeMap::new(),
                            });
                            id
                        }
                        Err(e) => {
                            result.errors.push(e);
                            continue;
                        }
                    },
                };
                modules[i].deps.insert(request, id);
            }
            i += 1;
        }
        Some(modules)
    }

    /// Read a module through the cache.
    fn load(&self, path: &Path) -> Result<CachedModule, BundleError> {
        if let Some(module) = self.cache().get(path) {
            return Ok(module);
        }
        let source = fs::read_to_string(path)
            .map_err(|e| BundleError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let module = scan(source);
        self.cache().insert(path, module.clone());
        Ok(module)
    }

    fn resolve(&self, request: &str, from_dir: &Path) -> Option<PathBuf> {
        let base = if request.starts_with("./") || request.starts_with("../") || request.starts_with('/') {
            from_dir.join(request)
        } else {
            self.node_modules.join(request)
        };
        resolve_file(&base)
            .or_else(|| resolve_file(&PathBuf::from(format!("{}.js", base.display()))))
            .or_else(|| resolve_dir(&base))
            .and_then(|p| p.canonicalize().ok())
    }
}

fn resolve_file(path: &Path) -> Option<PathBuf> {
    path.is_file().then(|| path.to_path_buf())
}

fn resolve_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let main = fs::read_to_string(dir.join("package.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .and_then(|v| v.get("main").and_then(|m| m.as_str()).map(str::to_string));
    if let Some(main) = main {
        let target = dir.join(main);
        if let Some(found) = resolve_file(&target)
            .or_else(|| resolve_file(&PathBuf::from(format!("{}.js", target.display()))))
        {
            return Some(found);
        }
    }
    resolve_file(&dir.join("index.js"))
}

/// Extract the `require` calls of a module.
pub fn scan(source: String) -> CachedModule {
    let requests: Vec<String> = STATIC_REQUIRE
        .captures_iter(&source)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()))
        .collect();
    let total = ANY_REQUIRE.find_iter(&source).count();
    let dynamic = total.saturating_sub(requests.len());
    CachedModule::new(source, requests, dynamic)
}

fn render(modules: &[ModuleRecord]) -> String {
    let mut out = String::from(LOADER);
    for (id, record) in modules.iter().enumerate() {
        let deps = serde_json::to_string(&record.deps).unwrap_or_else(|_| "{}".to_string());
        out.push_str(&format!(
            "{id}: [function (require, module, exports) {{\n{}\n}}, {deps}],\n",
            record.module.source.trim_end()
        ));
    }
    out.push_str("});\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn entry(source: PathBuf) -> BundleEntry {
        BundleEntry {
            source,
            output: PathBuf::from("out/app.js"),
        }
    }

    // =========================================================================
    // scan
    // =========================================================================

    #[test]
    fn scan_finds_static_requests_in_order() {
        let m = scan(r#"var a = require('./a'); var b = require("lib");"#.to_string());
        assert_eq!(m.requests, vec!["./a", "lib"]);
        assert_eq!(m.dynamic_requires, 0);
    }

    #[test]
    fn scan_counts_dynamic_requires() {
        let m = scan("var x = require(name); require('./y');".to_string());
        assert_eq!(m.requests, vec!["./y"]);
        assert_eq!(m.dynamic_requires, 1);
    }

    // =========================================================================
    // run
    // =========================================================================

    #[test]
    fn bundles_relative_and_package_modules() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "src/app.js", "var u = require('./util');\nvar l = require('lib');");
        write(tmp.path(), "src/util/index.js", "module.exports = 1;");
        write(tmp.path(), "node_modules/lib/package.json", r#"{"main": "dist/lib"}"#);
        write(tmp.path(), "node_modules/lib/dist/lib.js", "module.exports = 2;");

        let bundler = Bundler::new(tmp.path().join("node_modules"));
        let result = bundler.run(&[entry(src)], &tmp.path().join("dist"));

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].modules, 3);
        let code = fs::read_to_string(tmp.path().join("dist/out/app.js")).unwrap();
        assert!(code.contains(r#"{"./util":1,"lib":2}"#), "{code}");
        assert!(code.contains("module.exports = 2;"));
        assert_eq!(result.hash.len(), 64);
    }

    #[test]
    fn shared_dependency_bundled_once() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "a.js", "require('./b'); require('./c');");
        write(tmp.path(), "b.js", "require('./c');");
        write(tmp.path(), "c.js", "module.exports = 'c';");

        let result = Bundler::new(tmp.path().join("node_modules")).run(&[entry(src)], tmp.path());
        assert_eq!(result.outputs[0].modules, 3);
    }

    #[test]
    fn unresolved_request_is_error_but_bundle_still_written() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "app.js", "require('./missing');");

        let result = Bundler::new(tmp.path().join("node_modules")).run(&[entry(src)], tmp.path());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("Can't resolve './missing'"));
        assert_eq!(result.outputs.len(), 1);
    }

    #[test]
    fn missing_entry_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Bundler::new(tmp.path()).run(&[entry(tmp.path().join("nope.js"))], tmp.path());
        assert!(result.has_errors());
        assert!(matches!(result.errors[0], BundleError::MissingEntry(_)));
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn dynamic_require_is_warning() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "app.js", "require(path);");
        let result = Bundler::new(tmp.path()).run(&[entry(src)], tmp.path());
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Critical dependency"));
    }

    #[test]
    fn identical_runs_have_identical_hash() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "app.js", "module.exports = 1;");
        let first = Bundler::new(tmp.path()).run(&[entry(src.clone())], tmp.path());
        let second = Bundler::new(tmp.path()).run(&[entry(src)], tmp.path());
        assert_eq!(first.hash, second.hash);
    }

    // =========================================================================
    // Cache staleness
    // =========================================================================

    #[test]
    fn cached_module_served_stale_until_invalidated() {
        let tmp = TempDir::new().unwrap();
        let src = write(tmp.path(), "scripts/app.js", "var v = 'one';");
        let bundler = Bundler::new(tmp.path());
        let out = tmp.path().join("out/app.js");

        bundler.run(&[entry(src.clone())], tmp.path());
        fs::write(&src, "var v = 'two';").unwrap();

        let stale = bundler.run(&[entry(src.clone())], tmp.path());
        assert_eq!(stale.cache, CacheStats { hits: 1, misses: 0 });
        assert!(fs::read_to_string(&out).unwrap().contains("'one'"));

        assert!(bundler.invalidate(Path::new("scripts/app.js")).is_some());
        bundler.run(&[entry(src)], tmp.path());
        assert!(fs::read_to_string(&out).unwrap().contains("'two'"));
    }
}
