//! Markup for the four sprite artifacts.

use super::{Sprite, Symbol};
use maud::{Markup, PreEscaped, html};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

fn symbols(list: &[Symbol]) -> Markup {
    html! {
        @for symbol in list {
            symbol id=(symbol.id) viewBox=[symbol.view_box.as_deref()] {
                (PreEscaped(&symbol.inner))
            }
        }
    }
}

/// Hidden inline sprite, included once per page by the layout.
pub fn sprite_include(sprite: &Sprite) -> String {
    html! {
        svg xmlns=(SVG_NS) aria-hidden="true"
            style="position:absolute;width:0;height:0;overflow:hidden" {
            (symbols(&sprite.symbols))
        }
    }
    .into_string()
}

/// Library preview: every symbol rendered through `<use>` with its id.
pub fn preview(sprite: &Sprite) -> String {
    html! {
        div.symbols-preview data-category=(sprite.category.stem()) {
            @for symbol in &sprite.symbols {
                figure.symbols-preview__item {
                    svg.symbols-preview__icon {
                        use href=(format!("#{}", symbol.id)) {}
                    }
                    figcaption { code { (symbol.id) } }
                }
            }
        }
    }
    .into_string()
}

/// Sass partial listing the symbol ids (indented syntax).
pub fn style_partial(sprite: &Sprite) -> String {
    let ids: Vec<&str> = sprite.symbols.iter().map(|s| s.id.as_str()).collect();
    format!(
        "// Generated by patternforge from the {} sprite.\n${}: {}\n",
        sprite.category.stem(),
        sprite.category.partial_name(),
        ids.join(", ")
    )
}

/// Standalone sprite file, referenced as `<name>.svg#<id>`.
pub fn image_bundle(sprite: &Sprite) -> String {
    let body = html! {
        svg xmlns=(SVG_NS) {
            (symbols(&sprite.symbols))
        }
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{}\n",
        body.into_string()
    )
}
