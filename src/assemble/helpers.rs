//! Template helpers: `markdown`, `json`, `default`, `slug`.
//!
//! ```handlebars
//! {{{markdown notes}}}        {{!-- markdown → HTML --}}
//! <script>var d = {{{json sass}}};</script>
//! <h1>{{default page.title "Untitled"}}</h1>
//! <a id="{{slug name}}">
//! ```

use crate::naming;
use handlebars::{Handlebars, handlebars_helper};
use pulldown_cmark::{Options, Parser, html};
use serde_json::Value;

/// Render markdown to HTML.
pub fn render_markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

handlebars_helper!(markdown_helper: |text: Json| render_markdown(text.as_str().unwrap_or_default()));
handlebars_helper!(json_helper: |value: Json| serde_json::to_string(value).unwrap_or_default());
handlebars_helper!(default_helper: |value: Json, fallback: Json| {
    if is_blank(value) { fallback.clone() } else { value.clone() }
});
handlebars_helper!(slug_helper: |text: Json| match text {
    Value::String(s) => naming::slugify(s),
    Value::Null => String::new(),
    other => naming::slugify(&other.to_string()),
});

pub fn register(registry: &mut Handlebars<'_>) {
    registry.register_helper("markdown", Box::new(markdown_helper));
    registry.register_helper("json", Box::new(json_helper));
    registry.register_helper("default", Box::new(default_helper));
    registry.register_helper("slug", Box::new(slug_helper));
}
