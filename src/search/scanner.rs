//! Index-free search: walk the roots directly at query time.
//!
//! Each root is one task on a bounded rayon pool. Subdirectories are walked
//! recursively on the worker that owns the root, so the number of
//! outstanding tasks never exceeds the number of roots regardless of tree
//! shape. Matches are deduplicated across roots and emitted in batches,
//! each sorted newest first.

use crate::core::cancel::CancelToken;
use crate::core::config::{resolve_root, Config};
use crate::indexing::rules::{default_excluded_prefixes, has_excluded_prefix, WalkRules};
use crate::search::query::ParsedQuery;
use crate::search::session::{SearchEvent, SearchHandle, SearchSlot, BATCH_SIZE};
use crate::storage::index::{mtime_secs, sort_by_recency, FileRecord};
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound on scanner worker threads
const MAX_WORKERS: usize = 8;

/// How often the coordinator re-checks the stop flag while workers run
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Knobs for a live scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_depth: usize,
    pub show_hidden: bool,
    /// Roots under these prefixes are skipped entirely
    pub excluded_prefixes: Vec<PathBuf>,
    pub batch_size: usize,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            show_hidden: config.show_hidden,
            excluded_prefixes: default_excluded_prefixes(),
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_excluded_prefixes(mut self, prefixes: Vec<PathBuf>) -> Self {
        self.excluded_prefixes = prefixes;
        self
    }
}

/// Worker count: a little above the core count, capped.
pub fn worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores + 2).min(MAX_WORKERS)
}

/// State shared by every worker of one scan, behind one lock
struct ScanBuffer {
    seen: HashSet<PathBuf>,
    buffer: Vec<FileRecord>,
    finished: bool,
    events: Sender<SearchEvent>,
}

struct ScanShared {
    state: Mutex<ScanBuffer>,
    token: CancelToken,
    batch_size: usize,
}

impl ScanShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, ScanBuffer> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a match unless it was already reported via another root.
    fn offer(&self, record: FileRecord) {
        let mut state = self.lock();
        if state.finished || !state.seen.insert(record.path.clone()) {
            return;
        }
        state.buffer.push(record);
        if state.buffer.len() >= self.batch_size {
            self.flush_locked(&mut state);
        }
    }

    fn flush_locked(&self, state: &mut ScanBuffer) {
        if state.buffer.is_empty() || state.finished {
            return;
        }
        let mut batch = std::mem::take(&mut state.buffer);
        sort_by_recency(&mut batch);
        if state.events.send(SearchEvent::Batch(batch)).is_err() {
            // Nobody is listening any more
            self.token.cancel();
        }
    }

    /// Emit the remainder (unless cancelled) and then the terminal signal.
    fn finish(&self) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        if !self.token.is_cancelled() {
            self.flush_locked(&mut state);
        }
        state.finished = true;
        let _ = state.events.send(SearchEvent::Finished);
    }
}

/// Recursive directory walk for one root
struct Walker {
    shared: Arc<ScanShared>,
    query: Arc<ParsedQuery>,
    rules: WalkRules,
    max_depth: usize,
    excluded_prefixes: Arc<Vec<PathBuf>>,
}

impl Walker {
    /// Walk `dir`, whose entries sit at `depth + 1` below the root.
    fn walk(&self, dir: &Path, depth: usize) {
        if self.shared.token.is_cancelled() || depth >= self.max_depth {
            return;
        }
        if depth == 0 && has_excluded_prefix(dir, &self.excluded_prefixes) {
            tracing::debug!(root = %dir.display(), "Skipping system-reserved root");
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!(dir = %dir.display(), error = %e, "Unreadable directory");
                return;
            }
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name();
            if file_type.is_dir() {
                if self.rules.admits_dir(&name) {
                    dirs.push(entry.path());
                }
            } else if file_type.is_file() && self.rules.admits_file(&name) {
                files.push(entry);
            }
        }

        for entry in files {
            if self.shared.token.is_cancelled() {
                return;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.query.matches(&name) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => self.shared.offer(FileRecord {
                    path: entry.path(),
                    name,
                    mtime: mtime_secs(&metadata),
                    size: metadata.len(),
                }),
                Err(e) => {
                    tracing::trace!(path = %entry.path().display(), error = %e, "File vanished during scan");
                }
            }
        }

        for sub in dirs {
            if self.shared.token.is_cancelled() {
                return;
            }
            self.walk(&sub, depth + 1);
        }
    }
}

/// Live filesystem search
pub struct LiveScanner {
    options: ScanOptions,
    slot: SearchSlot,
}

impl LiveScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            slot: SearchSlot::new(),
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Start scanning `roots` for `query_text`, superseding any scan this
    /// scanner started before.
    pub fn scan(&self, query_text: &str, roots: &[PathBuf]) -> SearchHandle {
        let token = CancelToken::new();
        self.slot.replace(token.clone());

        let query = ParsedQuery::parse(query_text);
        let (tx, rx) = mpsc::channel();

        if query.is_empty() {
            let _ = tx.send(SearchEvent::Finished);
            return SearchHandle::new(rx, token, None);
        }

        let shared = Arc::new(ScanShared {
            state: Mutex::new(ScanBuffer {
                seen: HashSet::new(),
                buffer: Vec::new(),
                finished: false,
                events: tx,
            }),
            token: token.clone(),
            batch_size: self.options.batch_size.max(1),
        });
        let options = self.options.clone();
        let roots: Vec<PathBuf> = roots.iter().map(|root| resolve_root(root)).collect();
        let query = Arc::new(query);

        let coordinator =
            std::thread::spawn(move || run_scan(shared, query, roots, options));

        SearchHandle::new(rx, token, Some(coordinator))
    }

    /// Cancel whatever scan is in flight.
    pub fn cancel_current(&self) {
        self.slot.cancel_current();
    }
}

fn run_scan(
    shared: Arc<ScanShared>,
    query: Arc<ParsedQuery>,
    roots: Vec<PathBuf>,
    options: ScanOptions,
) {
    let pool = match ThreadPoolBuilder::new()
        .num_threads(worker_count())
        .thread_name(|i| format!("quickfind-scan-{}", i))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to start scan workers");
            shared.finish();
            return;
        }
    };

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let excluded_prefixes = Arc::new(options.excluded_prefixes);
    let rules = WalkRules::new(options.show_hidden);
    let mut submitted = 0;

    for root in roots {
        if shared.token.is_cancelled() {
            break;
        }
        if !root.exists() {
            continue;
        }
        let walker = Walker {
            shared: Arc::clone(&shared),
            query: Arc::clone(&query),
            rules,
            max_depth: options.max_depth,
            excluded_prefixes: Arc::clone(&excluded_prefixes),
        };
        let done = done_tx.clone();
        pool.spawn(move || {
            walker.walk(&root, 0);
            let _ = done.send(());
        });
        submitted += 1;
    }
    drop(done_tx);

    let mut completed = 0;
    while completed < submitted && !shared.token.is_cancelled() {
        match done_rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(()) => completed += 1,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Dropping the pool does not wait for in-flight walks; they observe the
    // stop flag and unwind on their own.
    drop(pool);
    shared.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_formula() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(worker_count(), (cores + 2).min(MAX_WORKERS));
        assert!(worker_count() >= 3);
        assert!(worker_count() <= 8);
    }

    #[test]
    fn test_finish_is_terminal() {
        let (tx, rx) = mpsc::channel();
        let shared = ScanShared {
            state: Mutex::new(ScanBuffer {
                seen: HashSet::new(),
                buffer: Vec::new(),
                finished: false,
                events: tx,
            }),
            token: CancelToken::new(),
            batch_size: 2,
        };

        shared.offer(FileRecord::new("/a/old.txt", 1.0, 0));
        shared.offer(FileRecord::new("/a/new.txt", 2.0, 0));
        shared.offer(FileRecord::new("/a/new.txt", 2.0, 0));
        shared.offer(FileRecord::new("/a/rest.txt", 3.0, 0));
        shared.token.cancel();
        shared.finish();
        shared.offer(FileRecord::new("/a/late.txt", 4.0, 0));
        shared.finish();
        drop(shared);

        let events: Vec<SearchEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        let SearchEvent::Batch(batch) = &events[0] else {
            panic!("expected a batch first");
        };
        let names: Vec<&str> = batch.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["new.txt", "old.txt"]);
        assert_eq!(events[1], SearchEvent::Finished);
    }
}
