//! Asset registry with lazy, single-flight scanning.
//!
//! The registry owns the current [`Snapshot`]. A query after invalidation
//! triggers one scan; concurrent queries during that scan wait for the same
//! result instead of starting their own.

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::discovery::{scan, Snapshot};
use crate::options::{AssetRoot, LoaderOptions};

type ScanResult = watch::Sender<Option<Arc<Snapshot>>>;

#[derive(Debug, Default)]
struct RegistryState {
    snapshot: Option<Arc<Snapshot>>,
    /// Bumped by every invalidation. A scan only caches its result when the
    /// generation did not move while it ran.
    generation: u64,
}

/// Shared index of icon assets.
///
/// # Concurrency
///
/// - `state`: `RwLock` over the cached snapshot and its generation
/// - `inflight`: holds the result channel of the scan in progress, if any
pub struct AssetRegistry {
    roots: Vec<AssetRoot>,
    extension: String,
    ignore_dirs: Vec<String>,
    state: RwLock<RegistryState>,
    inflight: Arc<Mutex<Option<Arc<ScanResult>>>>,
    scans: AtomicU64,
}

impl AssetRegistry {
    pub fn new(options: &LoaderOptions) -> Self {
        Self {
            roots: options.roots.clone(),
            extension: options.extension.clone(),
            ignore_dirs: options.ignore_dirs.clone(),
            state: RwLock::new(RegistryState::default()),
            inflight: Arc::new(Mutex::new(None)),
            scans: AtomicU64::new(0),
        }
    }

    pub fn roots(&self) -> &[AssetRoot] {
        &self.roots
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn root_dirs(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| r.dir.clone()).collect()
    }

    /// Cached snapshot, if any, without scanning.
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.state.read().snapshot.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Number of scans started so far.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Returns the cached snapshot, scanning when none is cached.
    ///
    /// # Singleflight Protocol
    ///
    /// 1. Fast path: return the cached snapshot
    /// 2. Leader election: first caller becomes leader, others subscribe to its result
    /// 3. Leader scans on the blocking pool and publishes through a `watch` channel
    /// 4. Waiters whose leader was cancelled retry from step 1
    ///
    /// `invalidate` detaches the scan in progress, so a call made after it
    /// elects a new leader instead of waiting on the stale result.
    pub async fn get(&self) -> Arc<Snapshot> {
        loop {
            if let Some(snapshot) = self.peek() {
                trace!("asset snapshot cache hit");
                return snapshot;
            }

            let (sender, is_leader) = {
                let mut slot = self.inflight.lock();
                match slot.as_ref() {
                    Some(sender) => (Arc::clone(sender), false),
                    None => {
                        let (tx, _rx) = watch::channel(None);
                        let sender = Arc::new(tx);
                        *slot = Some(Arc::clone(&sender));
                        (sender, true)
                    }
                }
            };

            if !is_leader {
                let mut rx = sender.subscribe();
                drop(sender);
                loop {
                    if let Some(snapshot) = rx.borrow_and_update().clone() {
                        return snapshot;
                    }
                    if rx.changed().await.is_err() {
                        debug!("scan leader went away, retrying");
                        break;
                    }
                }
                continue;
            }

            let guard = ScanGuard {
                slot: Arc::clone(&self.inflight),
                sender,
                completed: false,
            };

            // a previous leader may have finished between the fast path and election
            if let Some(snapshot) = self.peek() {
                return guard.complete(snapshot);
            }

            let snapshot = self.scan_now().await;
            return guard.complete(snapshot);
        }
    }

    async fn scan_now(&self) -> Arc<Snapshot> {
        let generation = self.state.read().generation;
        self.scans.fetch_add(1, Ordering::Relaxed);

        let roots = self.roots.clone();
        let extension = self.extension.clone();
        let ignore_dirs = self.ignore_dirs.clone();
        let result =
            tokio::task::spawn_blocking(move || scan(&roots, &extension, &ignore_dirs)).await;

        let snapshot = match result {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "asset scan failed");
                return Arc::new(Snapshot::default());
            }
        };

        let mut state = self.state.write();
        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&snapshot));
            debug!(count = snapshot.len(), "asset snapshot cached");
        } else {
            debug!(count = snapshot.len(), "assets changed during scan, not caching");
        }
        snapshot
    }

    /// Discards the cached snapshot and detaches any scan in progress.
    /// Does not rescan.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.snapshot = None;
        state.generation += 1;
        // waiters already subscribed still get the old result
        *self.inflight.lock() = None;
        debug!(generation = state.generation, "asset registry invalidated");
    }
}

/// Clears the in-flight slot when the leader finishes or is cancelled.
struct ScanGuard {
    slot: Arc<Mutex<Option<Arc<ScanResult>>>>,
    sender: Arc<ScanResult>,
    completed: bool,
}

impl ScanGuard {
    fn complete(mut self, snapshot: Arc<Snapshot>) -> Arc<Snapshot> {
        self.completed = true;
        self.sender.send_replace(Some(Arc::clone(&snapshot)));
        snapshot
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if !self.completed {
            debug!("scan leader cancelled");
        }
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.sender))
        {
            *slot = None;
        }
    }
}
