//! Viewport size toggle for the styleguide UI.
//!
//! The library chrome has a row of controls (`[data-viewport="md"]`, ...)
//! that switch the preview width between breakpoints. The selected size is
//! mirrored as a class on `<body>` and kept in session storage so it
//! survives navigation between pages.
//!
//! [`ViewportToggle`] is the behavior over two seams, [`SessionStorage`] and
//! [`ViewportDom`]. The browser runtime shipped with the styleguide is
//! generated by [`runtime_script`] from the same constants and written by
//! the scripts task next to the fabricator bundle.
//!
//! Storage is probed once by writing and removing [`PROBE_KEY`]. If that
//! fails the toggle runs on an in-memory state and never touches storage
//! again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Session storage key holding the serialized [`ViewportState`].
pub const STORAGE_KEY: &str = "viewport";
/// Throwaway key used to detect storage support.
pub const PROBE_KEY: &str = "_f";
/// Attribute carrying a control's breakpoint.
pub const CONTROL_ATTR: &str = "data-viewport";
pub const ACTIVE_CLASS: &str = "active";
/// File name of the browser runtime.
pub const RUNTIME_FILENAME: &str = "viewport.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Xs,
    Sm,
    Md,
    #[default]
    Lg,
    Xl,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 5] = [
        Breakpoint::Xs,
        Breakpoint::Sm,
        Breakpoint::Md,
        Breakpoint::Lg,
        Breakpoint::Xl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Xs => "xs",
            Breakpoint::Sm => "sm",
            Breakpoint::Md => "md",
            Breakpoint::Lg => "lg",
            Breakpoint::Xl => "xl",
        }
    }

    /// Every breakpoint class name.
    pub fn class_names() -> [&'static str; 5] {
        Self::ALL.map(Breakpoint::as_str)
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown breakpoint '{0}'")]
pub struct UnknownBreakpoint(pub String);

impl FromStr for Breakpoint {
    type Err = UnknownBreakpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Breakpoint::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownBreakpoint(s.to_string()))
    }
}

/// Persisted toggle state: `{"viewportSize":"lg"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    pub viewport_size: Breakpoint,
}

impl ViewportState {
    pub fn new(viewport_size: Breakpoint) -> Self {
        Self { viewport_size }
    }

    pub fn to_json(self) -> String {
        serde_json::json!({ "viewportSize": self.viewport_size.as_str() }).to_string()
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage is disabled")]
    Disabled,
    #[error("storage quota exceeded")]
    QuotaExceeded,
}

/// Key/value session storage.
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

/// The parts of the page the toggle touches.
pub trait ViewportDom {
    fn add_body_class(&mut self, class: &str);
    fn remove_body_classes(&mut self, classes: &[&str]);
    /// Remove the active marker from every control in `control`'s group.
    fn clear_active(&mut self, control: Breakpoint);
    /// Mark the control for `size` active; no-op if the page has none.
    fn mark_active(&mut self, size: Breakpoint);
}

/// Write-then-remove probe. Any failure means storage is unusable.
pub fn probe_storage<S: SessionStorage>(storage: &mut S) -> bool {
    storage.set_item(PROBE_KEY, PROBE_KEY).is_ok() && storage.remove_item(PROBE_KEY).is_ok()
}

pub struct ViewportToggle<S, D> {
    storage: S,
    dom: D,
    storage_available: bool,
    state: ViewportState,
}

impl<S: SessionStorage, D: ViewportDom> ViewportToggle<S, D> {
    /// Probe storage, seed it, read the initial state and apply it.
    pub fn init(mut storage: S, mut dom: D) -> Self {
        let storage_available = probe_storage(&mut storage);
        let mut state = ViewportState::default();

        if storage_available {
            match storage.get_item(STORAGE_KEY) {
                Ok(Some(raw)) => {
                    state = ViewportState::from_json(&raw).unwrap_or_default();
                }
                Ok(None) => {
                    let _ = storage.set_item(STORAGE_KEY, &state.to_json());
                }
                Err(_) => {}
            }
        }

        dom.add_body_class(state.viewport_size.as_str());
        dom.mark_active(state.viewport_size);

        Self {
            storage,
            dom,
            storage_available,
            state,
        }
    }

    /// Handle a click on the control for `size`.
    pub fn click(&mut self, size: Breakpoint) {
        self.dom.clear_active(size);
        self.dom.mark_active(size);
        self.dom.remove_body_classes(&Breakpoint::class_names());
        self.dom.add_body_class(size.as_str());
        self.state.viewport_size = size;

        if self.storage_available {
            let _ = self.storage.set_item(STORAGE_KEY, &self.state.to_json());
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn storage_available(&self) -> bool {
        self.storage_available
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }
}

/// Browser runtime implementing the same behavior as [`ViewportToggle`].
pub fn runtime_script() -> String {
    let default = ViewportState::default();
    let sizes: Vec<String> = Breakpoint::class_names()
        .iter()
        .map(|s| format!("'{s}'"))
        .collect();
    format!(
        r#"'use strict';
(function () {{
  var STORAGE_KEY = '{storage_key}';
  var SIZES = [{sizes}];
  var options = {default_json};

  var hasStorage = (function () {{
    var probe = '{probe}';
    try {{
      sessionStorage.setItem(probe, probe);
      sessionStorage.removeItem(probe);
      return true;
    }} catch (e) {{
      return false;
    }}
  }}());

  if (hasStorage) {{
    var stored = sessionStorage.getItem(STORAGE_KEY);
    if (stored === null) {{
      sessionStorage.setItem(STORAGE_KEY, JSON.stringify(options));
    }} else {{
      var parsed = null;
      try {{
        parsed = JSON.parse(stored);
      }} catch (e) {{}}
      if (parsed && SIZES.indexOf(parsed.viewportSize) !== -1) {{
        options = {{ viewportSize: parsed.viewportSize }};
      }}
    }}
  }}

  var body = document.querySelector('body');
  var control = function (size) {{
    return document.querySelector('[{attr}="' + size + '"]');
  }};

  body.classList.add(options.viewportSize);
  if (control(options.viewportSize)) control(options.viewportSize).classList.add('{active}');

  var toggle = function (e) {{
    var el = e.currentTarget;
    var current = el.parentNode.querySelector('.{active}');
    if (current) current.classList.remove('{active}');
    el.classList.add('{active}');

    var size = el.getAttribute('{attr}');
    SIZES.forEach(function (s) {{ body.classList.remove(s); }});
    body.classList.add(size);
    options.viewportSize = size;

    if (hasStorage) {{
      sessionStorage.setItem(STORAGE_KEY, JSON.stringify(options));
    }}
  }};

  var controls = document.querySelectorAll('[{attr}]');
  for (var i = 0; i < controls.length; i++) {{
    controls[i].addEventListener('click', toggle);
  }}
}}());
"#,
        storage_key = STORAGE_KEY,
        sizes = sizes.join(", "),
        default_json = default.to_json(),
        probe = PROBE_KEY,
        attr = CONTROL_ATTR,
        active = ACTIVE_CLASS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    #[derive(Default)]
    struct MemoryStorage {
        items: HashMap<String, String>,
        disabled: bool,
        writes: Vec<String>,
    }

    impl MemoryStorage {
        fn disabled() -> Self {
            Self {
                disabled: true,
                ..Self::default()
            }
        }
    }

    impl SessionStorage for MemoryStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.disabled {
                return Err(StorageError::Disabled);
            }
            Ok(self.items.get(key).cloned())
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.writes.push(key.to_string());
            if self.disabled {
                return Err(StorageError::Disabled);
            }
            self.items.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
            if self.disabled {
                return Err(StorageError::Disabled);
            }
            self.items.remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDom {
        body: BTreeSet<String>,
        active: BTreeSet<Breakpoint>,
    }

    impl ViewportDom for FakeDom {
        fn add_body_class(&mut self, class: &str) {
            self.body.insert(class.to_string());
        }

        fn remove_body_classes(&mut self, classes: &[&str]) {
            for c in classes {
                self.body.remove(*c);
            }
        }

        fn clear_active(&mut self, _control: Breakpoint) {
            self.active.clear();
        }

        fn mark_active(&mut self, size: Breakpoint) {
            self.active.insert(size);
        }
    }

    fn body(toggle: &ViewportToggle<MemoryStorage, FakeDom>) -> Vec<&str> {
        toggle.dom().body.iter().map(String::as_str).collect()
    }

    // =========================================================================
    // State serialization
    // =========================================================================

    #[test]
    fn state_json_shape() {
        assert_eq!(ViewportState::default().to_json(), r#"{"viewportSize":"lg"}"#);
        assert_eq!(
            ViewportState::from_json(r#"{"viewportSize":"md"}"#),
            Some(ViewportState::new(Breakpoint::Md))
        );
        assert_eq!(ViewportState::from_json("not json"), None);
    }

    #[test]
    fn breakpoint_parse() {
        assert_eq!("xs".parse::<Breakpoint>(), Ok(Breakpoint::Xs));
        assert!("xxl".parse::<Breakpoint>().is_err());
    }

    // =========================================================================
    // Init
    // =========================================================================

    #[test]
    fn init_seeds_storage_and_applies_default() {
        let toggle = ViewportToggle::init(MemoryStorage::default(), FakeDom::default());
        assert!(toggle.storage_available());
        assert_eq!(
            toggle.storage().items.get(STORAGE_KEY).map(String::as_str),
            Some(r#"{"viewportSize":"lg"}"#)
        );
        assert!(!toggle.storage().items.contains_key(PROBE_KEY));
        assert_eq!(body(&toggle), vec!["lg"]);
        assert!(toggle.dom().active.contains(&Breakpoint::Lg));
    }

    #[test]
    fn init_reads_stored_state() {
        let mut storage = MemoryStorage::default();
        storage
            .items
            .insert(STORAGE_KEY.into(), r#"{"viewportSize":"sm"}"#.into());
        let toggle = ViewportToggle::init(storage, FakeDom::default());
        assert_eq!(toggle.state().viewport_size, Breakpoint::Sm);
        assert_eq!(body(&toggle), vec!["sm"]);
    }

    #[test]
    fn init_with_corrupt_storage_falls_back_to_default() {
        let mut storage = MemoryStorage::default();
        storage.items.insert(STORAGE_KEY.into(), "{oops".into());
        let toggle = ViewportToggle::init(storage, FakeDom::default());
        assert_eq!(toggle.state().viewport_size, Breakpoint::Lg);
    }

    #[test]
    fn init_with_unknown_stored_size_falls_back_to_default() {
        for raw in ["{}", r#"{"viewportSize":"xxl"}"#, "null"] {
            let mut storage = MemoryStorage::default();
            storage.items.insert(STORAGE_KEY.into(), raw.into());
            let toggle = ViewportToggle::init(storage, FakeDom::default());
            assert_eq!(toggle.state().viewport_size, Breakpoint::Lg, "{raw}");
            assert_eq!(body(&toggle), vec!["lg"], "{raw}");
        }
    }

    // =========================================================================
    // Click
    // =========================================================================

    #[test]
    fn click_without_storage_updates_dom_only() {
        let mut toggle = ViewportToggle::init(MemoryStorage::disabled(), FakeDom::default());
        assert!(!toggle.storage_available());
        let writes_after_probe = toggle.storage().writes.len();

        toggle.click(Breakpoint::Md);

        assert_eq!(body(&toggle), vec!["md"]);
        assert_eq!(toggle.state().viewport_size, Breakpoint::Md);
        assert_eq!(toggle.storage().writes.len(), writes_after_probe);
    }

    #[test]
    fn click_with_storage_round_trips() {
        let mut toggle = ViewportToggle::init(MemoryStorage::default(), FakeDom::default());
        toggle.click(Breakpoint::Md);

        let stored = toggle.storage().get_item(STORAGE_KEY).unwrap().unwrap();
        assert_eq!(stored, r#"{"viewportSize":"md"}"#);
        assert_eq!(
            ViewportState::from_json(&stored),
            Some(ViewportState::new(Breakpoint::Md))
        );
    }

    #[test]
    fn click_moves_active_marker_and_body_class() {
        let mut toggle = ViewportToggle::init(MemoryStorage::default(), FakeDom::default());
        toggle.click(Breakpoint::Xs);
        toggle.click(Breakpoint::Xl);
        assert_eq!(body(&toggle), vec!["xl"]);
        assert_eq!(
            toggle.dom().active.iter().copied().collect::<Vec<_>>(),
            vec![Breakpoint::Xl]
        );
    }

    // =========================================================================
    // Runtime script
    // =========================================================================

    #[test]
    fn runtime_script_uses_shared_constants() {
        let js = runtime_script();
        assert!(js.contains("var STORAGE_KEY = 'viewport';"));
        assert!(js.contains("var probe = '_f';"));
        assert!(js.contains(r#"var options = {"viewportSize":"lg"};"#));
        assert!(js.contains("var SIZES = ['xs', 'sm', 'md', 'lg', 'xl'];"));
        assert!(js.contains("[data-viewport]"));
    }

    #[test]
    fn runtime_script_accepts_only_known_stored_sizes() {
        let js = runtime_script();
        assert!(js.contains("if (parsed && SIZES.indexOf(parsed.viewportSize) !== -1) {"));
        assert!(!js.contains("options = JSON.parse(stored);"));
    }
}
