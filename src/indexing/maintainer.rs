use crate::core::config::{resolve_root, Config};
use crate::core::error::{Error, Result};
use crate::indexing::rules::WalkRules;
use crate::indexing::watch::{EventSink, EventSource, FsEvent, NotifySource, WatchMessage};
use crate::storage::index::{FileRecord, IndexStore};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Records buffered before each bulk write during a rebuild
pub const REBUILD_BATCH_SIZE: usize = 1000;

/// Lifecycle of an index maintainer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Idle,
    Rebuilding,
    Monitoring,
    Stopped,
}

/// Counts from one completed rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Roots that existed and were walked
    pub roots: usize,
    /// Files written to the index
    pub files: usize,
    /// Entries skipped because they vanished or could not be read
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Completed(RebuildStats),
    /// Another rebuild was in flight; nothing was done
    AlreadyRunning,
    /// The maintainer has been shut down
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Started,
    /// Monitoring was already active; nothing was done
    AlreadyRunning,
    /// The maintainer has been shut down
    Stopped,
}

/// Guarded by one lock: whether a rebuild is in flight and the events held
/// back until it finishes.
///
/// Held events are kept per path, last one wins, so the backlog is bounded by
/// the number of distinct files touched during the rebuild.
#[derive(Default)]
struct Lifecycle {
    rebuilding: bool,
    stopped: bool,
    pending: HashMap<PathBuf, FsEvent>,
}

impl Lifecycle {
    /// Hold `event` until the rebuild finishes. A move is held as a delete of
    /// its source plus a create of its target.
    fn hold(&mut self, event: FsEvent) {
        if event.is_dir() {
            return;
        }
        match event {
            FsEvent::Moved { from, to, is_dir } => {
                self.hold(FsEvent::Deleted { path: from, is_dir });
                self.hold(FsEvent::Created { path: to, is_dir });
            }
            single => {
                let path = match &single {
                    FsEvent::Created { path, .. }
                    | FsEvent::Modified { path, .. }
                    | FsEvent::Deleted { path, .. } => path.clone(),
                    FsEvent::Moved { to, .. } => to.clone(),
                };
                self.pending.insert(path, single);
            }
        }
    }
}

struct Inner {
    store: Arc<IndexStore>,
    roots: Vec<PathBuf>,
    rules: WalkRules,
    max_depth: usize,
    lifecycle: Mutex<Lifecycle>,
}

struct Monitor {
    source: Box<dyn EventSource>,
    control: Sender<WatchMessage>,
    worker: JoinHandle<()>,
}

/// Keeps one index store in step with the filesystem: full rebuilds plus
/// incremental updates from a watch source.
pub struct IndexMaintainer {
    inner: Arc<Inner>,
    monitor: Mutex<Option<Monitor>>,
}

impl IndexMaintainer {
    pub fn new(store: Arc<IndexStore>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                roots: config.search_roots.iter().map(|root| resolve_root(root)).collect(),
                rules: WalkRules::new(config.show_hidden),
                max_depth: config.max_depth,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
            monitor: Mutex::new(None),
        }
    }

    /// Open the configured store and build a maintainer around it
    pub fn open(config: &Config) -> Result<Self> {
        let store = IndexStore::open(config)?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// The store this maintainer writes to
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.inner.store
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.inner.roots
    }

    pub fn state(&self) -> IndexState {
        let (rebuilding, stopped) = {
            let lifecycle = self.inner.lifecycle();
            (lifecycle.rebuilding, lifecycle.stopped)
        };
        if rebuilding {
            IndexState::Rebuilding
        } else if self.lock_monitor().is_some() {
            IndexState::Monitoring
        } else if stopped {
            IndexState::Stopped
        } else {
            IndexState::Idle
        }
    }

    /// Clear the index and walk every root again.
    ///
    /// Blocks until done. Watch events arriving meanwhile are held back and
    /// applied, in order, once the walk has finished.
    pub fn rebuild_index(&self) -> RebuildOutcome {
        {
            let mut lifecycle = self.inner.lifecycle();
            if lifecycle.stopped {
                tracing::info!("Index maintainer is stopped, ignoring rebuild request");
                return RebuildOutcome::Stopped;
            }
            if lifecycle.rebuilding {
                tracing::info!("Rebuild already in progress, skipping");
                return RebuildOutcome::AlreadyRunning;
            }
            lifecycle.rebuilding = true;
        }

        tracing::info!(roots = self.inner.roots.len(), "Rebuilding file index");
        let stats = self.inner.rebuild();
        tracing::info!(
            roots = stats.roots,
            files = stats.files,
            skipped = stats.skipped,
            "File index rebuilt"
        );

        self.inner.finish_rebuild();
        RebuildOutcome::Completed(stats)
    }

    /// Watch the roots with the platform watcher
    pub fn start_monitoring(&self) -> Result<MonitorStatus> {
        self.start_monitoring_with(Box::new(NotifySource::new()))
    }

    /// Watch the roots with a caller-supplied event source
    pub fn start_monitoring_with(&self, mut source: Box<dyn EventSource>) -> Result<MonitorStatus> {
        if self.inner.lifecycle().stopped {
            tracing::info!("Index maintainer is stopped, ignoring monitor request");
            return Ok(MonitorStatus::Stopped);
        }

        let mut monitor = self.lock_monitor();
        if monitor.is_some() {
            tracing::info!("Monitoring already running, skipping duplicate start");
            return Ok(MonitorStatus::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel();
        source.start(&self.inner.roots, EventSink::new(tx.clone()))?;

        let inner = Arc::clone(&self.inner);
        let worker = std::thread::Builder::new()
            .name("quickfind-index-events".to_string())
            .spawn(move || inner.drain(rx))
            .map_err(|e| Error::Watch(format!("Failed to start event thread: {}", e)))?;

        *monitor = Some(Monitor {
            source,
            control: tx,
            worker,
        });
        tracing::info!(roots = ?self.inner.roots, "Monitoring started");
        Ok(MonitorStatus::Started)
    }

    /// Stop watching. Events already delivered are applied before this
    /// returns. Returns false if monitoring was not active.
    pub fn stop_monitoring(&self) -> bool {
        let Some(monitor) = self.lock_monitor().take() else {
            return false;
        };

        drop(monitor.source);
        let _ = monitor.control.send(WatchMessage::Stop);
        if monitor.worker.join().is_err() {
            tracing::warn!("Index event thread panicked");
        }
        tracing::info!("Monitoring stopped");
        true
    }

    /// Stop monitoring for good; later rebuild and monitor requests are refused.
    pub fn shutdown(&self) {
        self.stop_monitoring();
        self.inner.lifecycle().stopped = true;
    }

    /// Apply one filesystem event to the index. While a rebuild runs the
    /// event is held back like any watch event.
    pub fn apply_event(&self, event: &FsEvent) {
        self.inner.dispatch(event.clone());
    }

    fn lock_monitor(&self) -> MutexGuard<'_, Option<Monitor>> {
        self.monitor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for IndexMaintainer {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Event thread body: apply events until told to stop.
    fn drain(&self, rx: Receiver<WatchMessage>) {
        while let Ok(message) = rx.recv() {
            match message {
                WatchMessage::Event(event) => self.dispatch(event),
                WatchMessage::Stop => break,
            }
        }
    }

    /// Apply the events held back during a rebuild, then lower the flag.
    /// The lifecycle lock is held throughout so the event thread cannot
    /// overtake the backlog.
    fn finish_rebuild(&self) {
        let mut lifecycle = self.lifecycle();
        let pending = std::mem::take(&mut lifecycle.pending);
        if !pending.is_empty() {
            tracing::debug!(events = pending.len(), "Applying events held during rebuild");
        }
        for event in pending.values() {
            self.apply_event(event);
        }
        lifecycle.rebuilding = false;
    }

    fn dispatch(&self, event: FsEvent) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.rebuilding {
            lifecycle.hold(event);
        } else {
            self.apply_event(&event);
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.rules.is_ignored_path(path, &self.roots)
    }

    fn apply_event(&self, event: &FsEvent) {
        if event.is_dir() {
            return;
        }
        match event {
            FsEvent::Created { path, .. } | FsEvent::Modified { path, .. } => {
                if !self.is_ignored(path) {
                    self.refresh(path);
                }
            }
            FsEvent::Deleted { path, .. } => self.remove(path),
            FsEvent::Moved { from, to, .. } => {
                self.remove(from);
                if !self.is_ignored(to) {
                    self.refresh(to);
                }
            }
        }
    }

    /// Re-stat `path` and store it. A file that is gone again is skipped.
    fn refresh(&self, path: &Path) {
        let record = match FileRecord::from_path(path) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                return;
            }
        };
        if let Err(e) = self.store.upsert(&record) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to update index entry");
        }
    }

    fn remove(&self, path: &Path) {
        if let Err(e) = self.store.delete(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove index entry");
        }
    }

    fn flush(&self, batch: &mut Vec<FileRecord>) {
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.store.upsert_batch(batch) {
            tracing::warn!(records = batch.len(), error = %e, "Failed to write index batch");
        }
        batch.clear();
    }

    fn rebuild(&self) -> RebuildStats {
        let mut stats = RebuildStats::default();

        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear index before rebuild");
        }

        for root in &self.roots {
            if !root.is_dir() {
                tracing::debug!(root = %root.display(), "Skipping missing root");
                continue;
            }
            stats.roots += 1;

            let rules = self.rules;
            let walker = WalkBuilder::new(root)
                .standard_filters(false)
                .follow_links(false)
                .max_depth(Some(self.max_depth))
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    if is_dir {
                        rules.admits_dir(entry.file_name())
                    } else {
                        rules.admits_file(entry.file_name())
                    }
                })
                .build();

            let mut batch = Vec::with_capacity(REBUILD_BATCH_SIZE);
            for result in walker {
                let entry = match result {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::trace!(error = %err, "Skipping unreadable entry");
                        stats.skipped += 1;
                        continue;
                    }
                };
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                    continue;
                }

                match FileRecord::from_path(entry.path()) {
                    Ok(record) => {
                        batch.push(record);
                        stats.files += 1;
                        if batch.len() >= REBUILD_BATCH_SIZE {
                            self.flush(&mut batch);
                        }
                    }
                    Err(e) => {
                        tracing::trace!(path = %entry.path().display(), error = %e, "Skipping file");
                        stats.skipped += 1;
                    }
                }
            }
            self.flush(&mut batch);
        }

        stats
    }
}
