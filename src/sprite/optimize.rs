//! SVG optimization.
//!
//! Streams the document through quick-xml and writes back only what a
//! browser needs: no XML declaration, comments, doctype, processing
//! instructions, `metadata`/`title`/`desc` elements, editor namespaces
//! (`sodipodi:`, `inkscape:`, `sketch:`) or whitespace-only text.
//!
//! The root `<svg>` is split off so callers can either re-emit the whole
//! document ([`OptimizedSvg::markup`]) or wrap the children in a
//! `<symbol>` ([`OptimizedSvg::inner`] + [`OptimizedSvg::view_box`]).

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvgError {
    #[error("Malformed SVG: {0}")]
    Parse(String),
    #[error("No <svg> root element")]
    MissingRoot,
    #[error("SVG write failed: {0}")]
    Write(String),
}

fn parse_err(e: impl Display) -> SvgError {
    SvgError::Parse(e.to_string())
}

fn write_err(e: impl Display) -> SvgError {
    SvgError::Write(e.to_string())
}

const DROPPED_ELEMENTS: &[&str] = &["metadata", "title", "desc"];
const EDITOR_PREFIXES: &[&str] = &["sodipodi:", "inkscape:", "sketch:"];

/// An SVG with its root split from its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedSvg {
    /// `viewBox` of the root, or `0 0 <width> <height>` when only sizes are set.
    pub view_box: Option<String>,
    /// Root attributes kept after optimization, in source order.
    pub root_attributes: Vec<(String, String)>,
    /// Serialized children of the root.
    pub inner: String,
}

impl OptimizedSvg {
    /// The full optimized document.
    pub fn markup(&self) -> String {
        let mut out = String::from("<svg");
        for (key, value) in &self.root_attributes {
            out.push_str(&format!(" {key}=\"{value}\""));
        }
        if self.inner.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.inner);
            out.push_str("</svg>");
        }
        out
    }
}

fn is_editor_name(name: &str) -> bool {
    EDITOR_PREFIXES.iter().any(|p| name.starts_with(p))
        || EDITOR_PREFIXES
            .iter()
            .any(|p| name == format!("xmlns:{}", p.trim_end_matches(':')))
}

fn element_name(e: &BytesStart<'_>) -> Result<String, SvgError> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(parse_err)
}

fn drops_element(name: &str) -> bool {
    DROPPED_ELEMENTS.contains(&name) || is_editor_name(name)
}

/// Copy an element, dropping editor attributes. Values stay escaped as read.
fn clean_element(e: &BytesStart<'_>) -> Result<BytesStart<'static>, SvgError> {
    let name = element_name(e)?;
    let mut cleaned = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(parse_err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(parse_err)?;
        if is_editor_name(key) {
            continue;
        }
        cleaned.push_attribute(Attribute {
            key: attr.key,
            value: attr.value.into_owned().into(),
        });
    }
    Ok(cleaned.into_owned())
}

fn root_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, SvgError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(parse_err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(parse_err)?;
        if is_editor_name(key) || key == "version" || key == "xml:space" {
            continue;
        }
        let value = std::str::from_utf8(&attr.value).map_err(parse_err)?;
        attrs.push((key.to_string(), value.to_string()));
    }
    Ok(attrs)
}

fn view_box(attrs: &[(String, String)]) -> Option<String> {
    let get = |k: &str| attrs.iter().find(|(key, _)| key == k).map(|(_, v)| v.trim());
    if let Some(vb) = get("viewBox") {
        return Some(vb.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    let numeric = |v: &str| {
        v.trim_end_matches("px")
            .parse::<f64>()
            .ok()
            .map(|n| n.to_string())
    };
    match (get("width").and_then(numeric), get("height").and_then(numeric)) {
        (Some(w), Some(h)) => Some(format!("0 0 {w} {h}")),
        _ => None,
    }
}

/// Optimize an SVG document.
pub fn optimize(source: &str) -> Result<OptimizedSvg, SvgError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut root: Option<Vec<(String, String)>> = None;
    let mut depth = 0usize;
    // Depth at which a dropped element started; everything inside is skipped.
    let mut skip_from: Option<usize> = None;

    loop {
        let event = reader.read_event().map_err(parse_err)?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                if skip_from.is_some() {
                    continue;
                }
                let name = element_name(&e)?;
                if root.is_none() {
                    if name != "svg" {
                        return Err(SvgError::MissingRoot);
                    }
                    root = Some(root_attributes(&e)?);
                } else if drops_element(&name) {
                    skip_from = Some(depth);
                } else {
                    writer
                        .write_event(Event::Start(clean_element(&e)?))
                        .map_err(write_err)?;
                }
            }
            Event::End(e) => {
                if let Some(start) = skip_from {
                    if depth == start {
                        skip_from = None;
                    }
                } else if depth > 1 {
                    writer.write_event(Event::End(e)).map_err(write_err)?;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) => {
                if skip_from.is_some() {
                    continue;
                }
                let name = element_name(&e)?;
                if root.is_none() {
                    if name != "svg" {
                        return Err(SvgError::MissingRoot);
                    }
                    root = Some(root_attributes(&e)?);
                } else if !drops_element(&name) {
                    writer
                        .write_event(Event::Empty(clean_element(&e)?))
                        .map_err(write_err)?;
                }
            }
            Event::Text(t) => {
                if skip_from.is_none() && depth > 0 {
                    writer.write_event(Event::Text(t)).map_err(write_err)?;
                }
            }
            Event::CData(c) => {
                if skip_from.is_none() && depth > 0 {
                    writer.write_event(Event::CData(c)).map_err(write_err)?;
                }
            }
            // Declarations, comments, doctypes and processing instructions.
            _ => {}
        }
    }

    let root_attributes = root.ok_or(SvgError::MissingRoot)?;
    let inner = String::from_utf8(writer.into_inner()).map_err(parse_err)?;
    Ok(OptimizedSvg {
        view_box: view_box(&root_attributes),
        root_attributes,
        inner,
    })
}
