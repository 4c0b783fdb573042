//! In-memory module cache for incremental script bundling.
//!
//! Reading and scanning a module for `require` calls is the repeated work of
//! a bundle run. Modules are cached by their absolute path and reused by
//! every later run of the same [`Bundler`](super::Bundler), even when the
//! file on disk has changed: entries are **never** revalidated. The dev
//! server's watcher evicts entries explicitly through
//! [`ModuleCache::invalidate_matching`] when a script changes.
//!
//! ## Cache keys
//!
//! Keys are the canonical absolute path of the module as a string. The
//! watcher reports paths that may differ in form (relative to the watch
//! root, or with a different prefix), so invalidation is by substring: the
//! first key (in key order) that contains the changed path is removed.
//! Only one entry is removed per change.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A module after it has been read and scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModule {
    pub source: String,
    /// Static `require("...")` requests, in source order.
    pub requests: Vec<String>,
    /// Number of `require(...)` calls with a non-literal argument.
    pub dynamic_requires: usize,
}

impl CachedModule {
    pub fn new(source: String, requests: Vec<String>, dynamic_requires: usize) -> Self {
        Self {
            source,
            requests,
            dynamic_requires,
        }
    }
}

/// Modules keyed by absolute path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: BTreeMap<String, CachedModule>,
    stats: CacheStats,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a module path.
    pub fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// Look up a module, counting the hit or miss.
    pub fn get(&mut self, path: &Path) -> Option<CachedModule> {
        match self.entries.get(&Self::key(path)) {
            Some(module) => {
                self.stats.hit();
                Some(module.clone())
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    pub fn insert(&mut self, path: &Path, module: CachedModule) {
        self.entries.insert(Self::key(path), module);
    }

    /// Remove the first entry whose key contains `changed`.
    ///
    /// Returns the removed key, if any.
    pub fn invalidate_matching(&mut self, changed: &str) -> Option<String> {
        if changed.is_empty() {
            return None;
        }
        let key = self.entries.keys().find(|k| k.contains(changed)).cloned()?;
        self.entries.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss counts since the last call, then reset.
    pub fn take_stats(&mut self) -> CacheStats {
        std::mem::take(&mut self.stats)
    }
}

/// Summary of cache usage for one bundle run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.misses > 0 {
            write!(f, "{} cached, {} read", self.hits, self.misses)
        } else {
            write!(f, "{} cached", self.hits)
        }
    }
}
