//! Dev server: static output, live reload and watch-triggered rebuilds.
//!
//! ```text
//!  notify ──▶ FileWatcher ──batch──▶ watch::actions ──▶ Coalescer ──▶ spawn_blocking(run_task)
//!                                                                         │
//!  browser ◀── SSE /__livereload ◀── ReloadHub ◀──────── notify(kind) ◀───┘
//! ```
//!
//! HTML responses get a small script injected before `</body>` that opens
//! the event stream: `reload` reloads the page, `css` re-fetches every
//! stylesheet in place.

pub mod coalesce;
pub mod watch;

use crate::reload::{ReloadHub, ReloadKind};
use crate::runner::{self, BuildContext};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use coalesce::Coalescer;
use futures::Stream;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use watch::{FileWatcher, WatchAction, WatchRule};

pub const LIVERELOAD_PATH: &str = "/__livereload";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Watcher error: {0}")]
    Watch(String),
    #[error("Invalid watch pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Browser side of live reload.
pub fn livereload_snippet() -> String {
    format!(
        r#"<script>
(function () {{
  var source = new EventSource("{LIVERELOAD_PATH}");
  source.addEventListener("{reload}", function () {{ location.reload(); }});
  source.addEventListener("{css}", function () {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {{
      var url = links[i].href.replace(/[?&]livereload=\d+/, "");
      links[i].href = url + (url.indexOf("?") < 0 ? "?" : "&") + "livereload=" + Date.now();
    }}
  }});
}})();
</script>
"#,
        reload = ReloadKind::Full.event_name(),
        css = ReloadKind::Styles.event_name(),
    )
}

/// Insert the snippet before the last `</body>`, or append it.
pub fn inject_snippet(html: &str) -> String {
    let snippet = livereload_snippet();
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{snippet}{}", &html[..pos], &html[pos..]),
        None => format!("{html}{snippet}"),
    }
}

#[derive(Clone)]
struct ServerState {
    root: Arc<PathBuf>,
    hub: ReloadHub,
}

pub fn router(root: PathBuf, hub: ReloadHub) -> Router {
    let state = ServerState {
        root: Arc::new(root),
        hub,
    };
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback(static_file)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn livereload(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = futures::stream::unfold(state.hub.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(kind) => {
                    let event = Event::default().event(kind.event_name()).data(kind.event_name());
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// The HTML file a request path points at, if any.
fn html_target(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in Path::new(uri_path.trim_start_matches('/')).components() {
        match part {
            Component::Normal(p) => path.push(p),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if path.is_dir() {
        path.push("index.html");
    }
    let is_html = path.extension().is_some_and(|e| e == "html" || e == "htm");
    (is_html && path.is_file()).then_some(path)
}

async fn static_file(State(state): State<ServerState>, request: Request<Body>) -> Response {
    if let Some(path) = html_target(&state.root, request.uri().path()) {
        return match tokio::fs::read_to_string(&path).await {
            Ok(html) => Html(inject_snippet(&html)).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        };
    }
    match ServeDir::new(state.root.as_path()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Run one watch action: evict changed modules, then run the task
/// through the coalescer.
pub fn dispatch(ctx: &Arc<BuildContext>, coalescer: &Arc<Coalescer>, action: WatchAction) {
    for rel in &action.invalidate {
        ctx.bundler.invalidate(Path::new(rel));
    }
    if !coalescer.begin(action.task) {
        return;
    }
    let ctx = ctx.clone();
    let coalescer = coalescer.clone();
    tokio::task::spawn_blocking(move || run_coalesced(&ctx, &coalescer, &action));
}

/// Run `action.task` until no change arrived during the last run.
pub fn run_coalesced(ctx: &BuildContext, coalescer: &Coalescer, action: &WatchAction) -> usize {
    coalescer.drive(action.task, || {
        let outcome = runner::run_task(ctx, action.task);
        if let Some(kind) = action.reload
            && !outcome.failed()
        {
            ctx.reloader.notify(kind);
        }
    })
}

async fn watch_loop(
    mut watcher: FileWatcher,
    ctx: Arc<BuildContext>,
    rules: Vec<WatchRule>,
) {
    let coalescer = Arc::new(Coalescer::new());
    while let Some(changed) = watcher.recv().await {
        for action in watch::actions(&rules, &ctx.config.root, &changed) {
            info!(task = %action.task, "Change detected");
            dispatch(&ctx, &coalescer, action);
        }
    }
    warn!("Watcher stopped");
}

/// `ctx` with `hub` as its reloader, in every mode. Prod style runs never
/// notify, so only watch-triggered full reloads reach prod browsers.
pub fn serving_context(ctx: BuildContext, hub: &ReloadHub) -> BuildContext {
    ctx.with_reloader(Arc::new(hub.clone()))
}

/// Serve the output root and rebuild on change until the process exits.
pub async fn serve(ctx: BuildContext, hub: ReloadHub) -> Result<(), ServeError> {
    let ctx = serving_context(ctx, &hub);
    let serve_cfg = &ctx.config.project.serve;
    let rules = watch::rules(&ctx.config)?;
    let watcher = FileWatcher::new(&ctx.config.path(&serve_cfg.watch_root), serve_cfg.debounce_ms)?;
    let addr = SocketAddr::from(([127, 0, 0, 1], serve_cfg.port));
    let app = router(ctx.config.dest(), hub);

    let ctx = Arc::new(ctx);
    tokio::spawn(watch_loop(watcher, ctx.clone(), rules));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!("Serving {} at http://{addr}", ctx.config.dest().display());
    axum::serve(listener, app).await?;
    Ok(())
}
