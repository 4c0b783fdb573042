//! Vendor prefixing for compiled CSS.
//!
//! Browser targets are expressed the way style themes have always declared
//! them: `"last N version"` / `"last N versions"`. A fixed rule table lists,
//! per property, which prefixes are still needed and from how far back in
//! browser history they start to matter. A declaration whose property is in
//! the table gets prefixed copies inserted directly before it.
//!
//! Works on both expanded and compressed output and is a pure function of
//! `(css, targets)`.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TargetsError {
    #[error("expected \"last N version(s)\", got \"{0}\"")]
    Unsupported(String),
}

/// How many recent versions of each browser must be supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserTargets {
    pub last_versions: u32,
}

impl BrowserTargets {
    pub fn parse(query: &str) -> Result<Self, TargetsError> {
        let words: Vec<&str> = query.split_whitespace().collect();
        match words.as_slice() {
            [last, n, unit]
                if last.eq_ignore_ascii_case("last")
                    && (unit.eq_ignore_ascii_case("version")
                        || unit.eq_ignore_ascii_case("versions")) =>
            {
                match n.parse::<u32>() {
                    Ok(n) if n > 0 => Ok(Self { last_versions: n }),
                    _ => Err(TargetsError::Unsupported(query.to_string())),
                }
            }
            _ => Err(TargetsError::Unsupported(query.to_string())),
        }
    }
}

/// `(property, prefix, needed from this many versions back)`
const RULES: &[(&str, &str, u32)] = &[
    ("appearance", "-webkit-", 1),
    ("appearance", "-moz-", 2),
    ("backdrop-filter", "-webkit-", 1),
    ("box-decoration-break", "-webkit-", 1),
    ("hyphens", "-webkit-", 1),
    ("hyphens", "-ms-", 3),
    ("mask-image", "-webkit-", 1),
    ("tab-size", "-moz-", 3),
    ("text-size-adjust", "-webkit-", 1),
    ("text-size-adjust", "-moz-", 2),
    ("text-size-adjust", "-ms-", 3),
    ("user-select", "-webkit-", 1),
    ("user-select", "-moz-", 3),
    ("user-select", "-ms-", 3),
];

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    let mut props: Vec<&str> = RULES.iter().map(|(p, _, _)| *p).collect();
    props.dedup();
    Regex::new(&format!(
        r"([{{;])(\s*)({})(\s*:\s*)([^;{{}}]+)",
        props.join("|")
    ))
    .expect("prefix pattern is valid")
});

/// Prefixes required for `property` under `targets`, in table order.
pub fn prefixes_for(property: &str, targets: BrowserTargets) -> Vec<&'static str> {
    RULES
        .iter()
        .filter(|(p, _, since)| *p == property && targets.last_versions >= *since)
        .map(|(_, prefix, _)| *prefix)
        .collect()
}

/// Insert prefixed copies of every declaration that needs them.
pub fn apply(css: &str, targets: BrowserTargets) -> String {
    DECLARATION
        .replace_all(css, |caps: &Captures| {
            let (lead, ws, prop, sep, value) = (&caps[1], &caps[2], &caps[3], &caps[4], &caps[5]);
            let mut out = String::from(lead);
            for prefix in prefixes_for(prop, targets) {
                out.push_str(&format!("{ws}{prefix}{prop}{sep}{};", value.trim_end()));
            }
            out.push_str(&format!("{ws}{prop}{sep}{value}"));
            out
        })
        .into_owned()
}
