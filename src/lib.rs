//! # Patternforge
//!
//! A build tool for static pattern libraries and styleguides. One run turns
//! a source tree of Sass, CommonJS scripts, SVG icons, fonts, images,
//! handlebars layouts and markdown docs into a browsable site, and in dev
//! mode keeps it fresh while you edit.
//!
//! # Architecture: Task Graph
//!
//! Work is split into named tasks. An explicit [`graph::TaskGraph`] orders
//! them into stages; tasks within a stage run in parallel:
//!
//! ```text
//! [clean] → [styles:fabricator, styles:toolkit, scripts, images, svgs, fonts]
//!         → [sass-data] → [assemble] → ([sftp] | [sync])
//! ```
//!
//! `svgs` writes Sass partials and template includes into the source tree,
//! `sass-data` extracts variables into `sass.json`, and `assemble` renders
//! pages that can show both.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `patternforge.toml` loading, merging and validation; [`config::BuildConfig`] |
//! | [`graph`] | Tasks, composite targets and stage planning |
//! | [`runner`] | Stage execution, failure policy and the [`runner::BuildContext`] |
//! | [`tasks`] | One module per task |
//! | [`prefix`] | Vendor prefixing for a `last N versions` target |
//! | [`sprite`] | SVG optimization, symbol sprites and artifact routing |
//! | [`bundler`] | CommonJS bundler with a shared module cache |
//! | [`assemble`] | Handlebars assembly of layouts, materials, docs and views |
//! | [`naming`] | `NN-name` ordering convention for materials and docs |
//! | [`reload`] | Live-reload notifications |
//! | [`serve`] | Dev server, watch rules and run coalescing |
//! | [`viewport`] | Viewport toggle model and its browser runtime |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Configuration Is Built Once
//!
//! Mode, deploy user and every path are resolved at startup into a
//! [`config::BuildConfig`] passed by reference. No task reads the process
//! environment.
//!
//! ## Compile Errors Are Not Task Failures
//!
//! A Sass error, an unresolvable `require` or a broken template is logged
//! and recorded in the task's summary; the rest of the build carries on.
//! Only `clean` and the uploads end a run.
//!
//! ## Generated Sources Are Written Only On Change
//!
//! Sprite includes, previews, Sass partials and `sass.json` live in the
//! watched source tree. Rewriting identical bytes would re-trigger the
//! watcher forever, so those writes compare first.

pub mod assemble;
pub mod bundler;
pub mod config;
pub mod graph;
pub mod naming;
pub mod output;
pub mod prefix;
pub mod reload;
pub mod runner;
pub mod serve;
pub mod sprite;
pub mod tasks;
pub mod viewport;

#[cfg(test)]
pub(crate) mod test_helpers;
