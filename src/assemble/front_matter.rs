//! YAML front matter at the top of materials and views.

use serde_json::{Map, Value};

/// Split `---\n<yaml>\n---` off the top of `source`.
///
/// Returns the parsed block (empty when absent) and the remaining body.
pub fn split(source: &str) -> Result<(Map<String, Value>, &str), String> {
    let text = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok((Map::new(), text));
    };

    let (yaml, body) = match find_close(rest) {
        Some((end, body_start)) => (&rest[..end], &rest[body_start..]),
        None => return Err("front matter is not closed with '---'".to_string()),
    };

    if yaml.trim().is_empty() {
        return Ok((Map::new(), body));
    }
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    match serde_json::to_value(value).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok((map, body)),
        Value::Null => Ok((Map::new(), body)),
        _ => Err("front matter must be a mapping".to_string()),
    }
}

/// Position of the closing `---` line and of the first body byte.
fn find_close(rest: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}
