//! SVG sprite generation and artifact routing.
//!
//! One [`Sprite`] is built per [`SvgCategory`]. It fans out into four
//! artifacts, each tagged with its kind so routing never depends on file
//! names:
//!
//! | Artifact | Destination | File |
//! |---|---|---|
//! | [`SpriteArtifact::SpriteInclude`] | layout includes | `symbols-<name>.html` |
//! | [`SpriteArtifact::Preview`] | materials/symbols | `<name>.html` |
//! | [`SpriteArtifact::StylePartial`] | style variables | `_symbols-<name>.sass` |
//! | [`SpriteArtifact::ImageBundle`] | output images | `<name>.svg` |
//!
//! The preview is a library material. It begins with a partial reference to
//! the sprite include (`{{>symbols-<name>}}`) so the symbols it `<use>`s are
//! present on the page.

pub mod optimize;
mod render;

pub use optimize::{OptimizedSvg, SvgError, optimize};

use crate::config::SvgCategory;
use std::path::{Path, PathBuf};

/// One `<symbol>` inside a sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: String,
    pub view_box: Option<String>,
    pub inner: String,
}

impl Symbol {
    pub fn new(id: impl Into<String>, svg: OptimizedSvg) -> Self {
        Self {
            id: id.into(),
            view_box: svg.view_box,
            inner: svg.inner,
        }
    }
}

/// All symbols of one category.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub category: SvgCategory,
    pub symbols: Vec<Symbol>,
}

/// Kind of generated sprite output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteArtifact {
    SpriteInclude,
    Preview,
    StylePartial,
    ImageBundle,
}

impl SpriteArtifact {
    pub const ALL: [SpriteArtifact; 4] = [
        SpriteArtifact::SpriteInclude,
        SpriteArtifact::Preview,
        SpriteArtifact::StylePartial,
        SpriteArtifact::ImageBundle,
    ];

    /// Category-qualified file name of this artifact.
    pub fn file_name(self, category: &SvgCategory) -> String {
        match self {
            SpriteArtifact::SpriteInclude => format!("{}.html", category.partial_name()),
            SpriteArtifact::Preview => format!("{}.html", category.stem()),
            SpriteArtifact::StylePartial => format!("_{}.sass", category.partial_name()),
            SpriteArtifact::ImageBundle => format!("{}.svg", category.stem()),
        }
    }

    /// Destination path of this artifact for `category`.
    pub fn route(self, category: &SvgCategory, dirs: &SpriteDirs) -> PathBuf {
        let dir = match self {
            SpriteArtifact::SpriteInclude => &dirs.includes,
            SpriteArtifact::Preview => &dirs.previews,
            SpriteArtifact::StylePartial => &dirs.variables,
            SpriteArtifact::ImageBundle => &dirs.images,
        };
        dir.join(self.file_name(category))
    }
}

/// The four destination directories, resolved against the project.
#[derive(Debug, Clone)]
pub struct SpriteDirs {
    pub includes: PathBuf,
    pub previews: PathBuf,
    pub variables: PathBuf,
    pub images: PathBuf,
}

impl Sprite {
    /// Render every artifact with its content.
    pub fn artifacts(&self) -> Vec<(SpriteArtifact, String)> {
        SpriteArtifact::ALL
            .into_iter()
            .map(|kind| {
                let content = match kind {
                    SpriteArtifact::SpriteInclude => render::sprite_include(self),
                    SpriteArtifact::Preview => format!(
                        "{{{{>{}}}}}\n{}\n",
                        self.category.partial_name(),
                        render::preview(self)
                    ),
                    SpriteArtifact::StylePartial => render::style_partial(self),
                    SpriteArtifact::ImageBundle => render::image_bundle(self),
                };
                (kind, content)
            })
            .collect()
    }
}

/// Symbol id for an SVG at `path` inside `category_dir`.
///
/// Nested directories join with `-`; everything outside `[a-z0-9_-]` is
/// folded to `-`.
pub fn symbol_id(category_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(category_dir).unwrap_or(path);
    let raw = rel.with_extension("").to_string_lossy().to_lowercase();
    let mut id = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' };
        if c == '-' && id.ends_with('-') {
            continue;
        }
        id.push(c);
    }
    id.trim_matches('-').to_string()
}
