//! Result delivery for in-flight searches.
//!
//! Every search owns a private channel, so batches from a superseded search
//! can never reach the consumer of a newer one. `SearchSlot` remembers the
//! search in flight and cancels it when the next one starts.

use crate::core::cancel::CancelToken;
use crate::storage::index::FileRecord;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

/// Number of records per emitted batch
pub const BATCH_SIZE: usize = 50;

/// What a running search reports
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Batch(Vec<FileRecord>),
    /// Terminal signal; nothing follows it
    Finished,
}

/// Consumer side of one search. Dropping it cancels the search.
pub struct SearchHandle {
    events: Receiver<SearchEvent>,
    token: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl SearchHandle {
    pub(crate) fn new(
        events: Receiver<SearchEvent>,
        token: CancelToken,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            events,
            token,
            worker,
        }
    }

    /// Ask the search to stop. Already-queued events remain readable.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Block for the next event; `None` once the producer is gone.
    pub fn recv(&self) -> Option<SearchEvent> {
        self.events.recv().ok()
    }

    /// Block for the next event for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SearchEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Read batches until `Finished`, returning them in arrival order.
    pub fn batches(mut self) -> Vec<Vec<FileRecord>> {
        let mut batches = Vec::new();
        while let Some(event) = self.recv() {
            match event {
                SearchEvent::Batch(batch) => batches.push(batch),
                SearchEvent::Finished => break,
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        batches
    }

    /// Read until `Finished` and flatten every batch.
    pub fn collect(self) -> Vec<FileRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Tracks the search in flight so a new one supersedes it
#[derive(Debug, Default)]
pub struct SearchSlot {
    current: Mutex<Option<CancelToken>>,
}

impl SearchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current search (if any) and make `token` current.
    pub fn replace(&self, token: CancelToken) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(token) {
            previous.cancel();
        }
    }

    /// Cancel the current search, if any.
    pub fn cancel_current(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.cancel();
        }
    }
}
