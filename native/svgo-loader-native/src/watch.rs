//! Filesystem change handling for the asset registry.
//!
//! Add and remove events are coalesced over a debounce window into a single
//! registry invalidation followed by one refresh signal for observers.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::LoaderError;
use crate::registry::AssetRegistry;

/// Name of the observer query made stale by an asset change.
pub const STATIC_SVG_FILES_QUERY: &str = "getStaticSvgFiles";

/// File change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    /// Maps a host watcher event name. Only `add` and `unlink` matter.
    pub fn from_host(event: &str, path: impl Into<PathBuf>) -> Option<Self> {
        match event {
            "add" => Some(WatchEvent::Added(path.into())),
            "unlink" => Some(WatchEvent::Removed(path.into())),
            _ => None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            WatchEvent::Added(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Emitted once per coalesced debounce window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub query: String,
    /// Number of filesystem events folded into this signal.
    pub coalesced: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEBOUNCER
// ═══════════════════════════════════════════════════════════════════════════════

/// Trailing debounce over [`WatchEvent`]s. Each event restarts the window;
/// when it elapses the registry is invalidated once and one
/// [`RefreshSignal`] goes out to every subscriber.
pub struct InvalidationDebouncer {
    events: mpsc::UnboundedSender<WatchEvent>,
    refresh: broadcast::Sender<RefreshSignal>,
    task: JoinHandle<()>,
}

impl InvalidationDebouncer {
    /// Must be called inside a tokio runtime.
    pub fn spawn(registry: Arc<AssetRegistry>, window: Duration) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let (refresh, _) = broadcast::channel(16);
        let task = tokio::spawn(run_debounce(rx, registry, refresh.clone(), window));
        Self {
            events,
            refresh,
            task,
        }
    }

    pub fn notify(&self, event: WatchEvent) {
        trace!(?event, "asset event");
        let _ = self.events.send(event);
    }

    /// Feeds a host watcher event. Returns false when the kind is ignored.
    pub fn notify_host(&self, event: &str, path: &str) -> bool {
        match WatchEvent::from_host(event, path) {
            Some(event) => {
                self.notify(event);
                true
            }
            None => false,
        }
    }

    /// Sender for producers such as [`AssetWatcher`].
    pub fn handle(&self) -> mpsc::UnboundedSender<WatchEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh.subscribe()
    }
}

impl Drop for InvalidationDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_debounce(
    mut rx: mpsc::UnboundedReceiver<WatchEvent>,
    registry: Arc<AssetRegistry>,
    refresh: broadcast::Sender<RefreshSignal>,
    window: Duration,
) {
    while rx.recv().await.is_some() {
        let mut coalesced = 1;
        let sleep = tokio::time::sleep(window);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(_) => {
                        coalesced += 1;
                        sleep.as_mut().reset(Instant::now() + window);
                    }
                    None => break,
                },
                _ = &mut sleep => break,
            }
        }

        registry.invalidate();
        debug!(coalesced, "asset change window flushed");
        // no subscribers is fine
        let _ = refresh.send(RefreshSignal {
            query: STATIC_SVG_FILES_QUERY.to_string(),
            coalesced,
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NATIVE WATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Watches every registry root recursively and forwards asset add/remove
/// events to a debouncer.
pub struct AssetWatcher {
    _watcher: RecommendedWatcher,
    watched_paths: Vec<PathBuf>,
}

impl AssetWatcher {
    pub fn start(
        registry: &AssetRegistry,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self, LoaderError> {
        let is_asset = asset_filter(registry.extension());
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in process_event(event) {
                        if is_asset(change.path()) {
                            let _ = events.send(change);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "asset watcher error"),
            },
            Config::default(),
        )
        .map_err(|source| LoaderError::Watch {
            path: String::from("<init>"),
            source,
        })?;

        let mut watched_paths = Vec::new();
        for dir in registry.root_dirs() {
            if !dir.exists() {
                debug!(root = %dir.display(), "not watching missing asset root");
                continue;
            }
            watcher
                .watch(&dir, RecursiveMode::Recursive)
                .map_err(|source| LoaderError::Watch {
                    path: dir.display().to_string(),
                    source,
                })?;
            watched_paths.push(dir);
        }

        Ok(Self {
            _watcher: watcher,
            watched_paths,
        })
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}

fn asset_filter(extension: &str) -> impl Fn(&PathBuf) -> bool + Send + 'static {
    let extension = extension.to_string();
    move |path: &PathBuf| {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.as_str()))
    }
}

/// Maps a notify event to add/remove events. A rename is a remove plus an add.
fn process_event(event: Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(WatchEvent::Added).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both => {
                let mut paths = event.paths.into_iter();
                let mut out = Vec::new();
                if let Some(from) = paths.next() {
                    out.push(WatchEvent::Removed(from));
                }
                if let Some(to) = paths.next() {
                    out.push(WatchEvent::Added(to));
                }
                out
            }
            RenameMode::From => event.paths.into_iter().map(WatchEvent::Removed).collect(),
            RenameMode::To => event.paths.into_iter().map(WatchEvent::Added).collect(),
            _ => event
                .paths
                .into_iter()
                .map(|p| {
                    if p.exists() {
                        WatchEvent::Added(p)
                    } else {
                        WatchEvent::Removed(p)
                    }
                })
                .collect(),
        },
        _ => Vec::new(),
    }
}
