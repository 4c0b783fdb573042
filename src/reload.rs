//! Live-reload notifications.
//!
//! Tasks and the watch loop talk to connected browsers through the
//! [`Reloader`] trait. A style task asks for a [`ReloadKind::Styles`]
//! refresh (stylesheets re-fetched, page state kept); other watch rules ask
//! for a [`ReloadKind::Full`] page reload.

use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    Full,
    Styles,
}

impl ReloadKind {
    /// SSE event name sent to the browser snippet.
    pub fn event_name(self) -> &'static str {
        match self {
            ReloadKind::Full => "reload",
            ReloadKind::Styles => "css",
        }
    }
}

pub trait Reloader: Send + Sync {
    fn notify(&self, kind: ReloadKind);
}

/// Used outside the dev server.
#[derive(Debug, Default)]
pub struct NoReload;

impl Reloader for NoReload {
    fn notify(&self, _kind: ReloadKind) {}
}

/// Fans reload events out to every connected browser.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadKind>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadKind> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Reloader for ReloadHub {
    fn notify(&self, kind: ReloadKind) {
        // No subscribers means no browser is connected.
        let receivers = self.tx.send(kind).unwrap_or(0);
        tracing::debug!(kind = kind.event_name(), receivers, "Reload broadcast");
    }
}

/// Records every notification; lets callers assert on reload behavior.
#[derive(Debug, Default)]
pub struct RecordingReloader {
    events: Mutex<Vec<ReloadKind>>,
}

impl RecordingReloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReloadKind> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Reloader for RecordingReloader {
    fn notify(&self, kind: ReloadKind) {
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        events.push(kind);
    }
}
