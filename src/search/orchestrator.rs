use crate::core::cancel::CancelToken;
use crate::search::query::ParsedQuery;
use crate::search::session::{SearchEvent, SearchHandle, SearchSlot, BATCH_SIZE};
use crate::storage::index::{FileRecord, IndexStore};
use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;

/// Candidates fetched from the index per coarse key
pub const COARSE_LIMIT: usize = 1000;

/// Answers interactive queries from the index in two stages: a cheap
/// single-substring lookup per key, then the full predicate over the
/// merged candidates.
pub struct SearchOrchestrator {
    store: Arc<IndexStore>,
    slot: SearchSlot,
}

impl SearchOrchestrator {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self {
            store,
            slot: SearchSlot::new(),
        }
    }

    /// The substrings used to prefilter the index for `query`.
    ///
    /// OR queries look up every alternative. AND queries only need their
    /// first term since the rest is re-checked during refinement. Anything
    /// else falls back to the most recent files.
    pub fn coarse_keys(query: &ParsedQuery) -> Vec<&str> {
        if !query.or_terms.is_empty() {
            query.or_terms.iter().map(String::as_str).collect()
        } else if let Some(first) = query.and_terms.first() {
            vec![first.as_str()]
        } else {
            vec![""]
        }
    }

    /// Coarse stage: merged candidates, deduplicated by path, in per-key
    /// recency order.
    pub fn candidates(&self, query: &ParsedQuery, token: &CancelToken) -> Vec<FileRecord> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for key in Self::coarse_keys(query) {
            if token.is_cancelled() {
                break;
            }
            match self.store.coarse_query(key, COARSE_LIMIT) {
                Ok(records) => {
                    for record in records {
                        if seen.insert(record.path.clone()) {
                            merged.push(record);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Index lookup failed");
                }
            }
        }

        merged
    }

    /// Run `query` to completion on the calling thread, handing batches of
    /// matches to `emit` in discovery order.
    pub fn run<F>(&self, query: &ParsedQuery, token: &CancelToken, mut emit: F)
    where
        F: FnMut(Vec<FileRecord>),
    {
        if query.is_empty() {
            return;
        }

        let mut batch = Vec::with_capacity(BATCH_SIZE);
        for record in self.candidates(query, token) {
            if token.is_cancelled() {
                return;
            }
            if query.matches(&record.name) {
                batch.push(record);
                if batch.len() >= BATCH_SIZE {
                    emit(std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE)));
                }
            }
        }

        if !batch.is_empty() && !token.is_cancelled() {
            emit(batch);
        }
    }

    /// Blocking search returning every match.
    pub fn search(&self, text: &str) -> Vec<FileRecord> {
        let query = ParsedQuery::parse(text);
        let mut results = Vec::new();
        self.run(&query, &CancelToken::new(), |batch| results.extend(batch));
        results
    }

    /// Start a background search, superseding any search this orchestrator
    /// started before.
    pub fn start(self: &Arc<Self>, text: &str) -> SearchHandle {
        let token = CancelToken::new();
        self.slot.replace(token.clone());

        let query = ParsedQuery::parse(text);
        let (tx, rx) = mpsc::channel();

        if query.is_empty() {
            let _ = tx.send(SearchEvent::Finished);
            return SearchHandle::new(rx, token, None);
        }

        let orchestrator = Arc::clone(self);
        let worker_token = token.clone();
        let worker = std::thread::spawn(move || {
            orchestrator.run(&query, &worker_token, |batch| {
                if worker_token.is_cancelled() {
                    return;
                }
                if tx.send(SearchEvent::Batch(batch)).is_err() {
                    worker_token.cancel();
                }
            });
            let _ = tx.send(SearchEvent::Finished);
        });

        SearchHandle::new(rx, token, Some(worker))
    }

    /// Cancel whatever search is in flight.
    pub fn cancel_current(&self) {
        self.slot.cancel_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_keys() {
        let q = ParsedQuery::parse("a|b|c");
        assert_eq!(SearchOrchestrator::coarse_keys(&q), vec!["a", "b", "c"]);

        let q = ParsedQuery::parse("report q1 .pdf");
        assert_eq!(SearchOrchestrator::coarse_keys(&q), vec!["report"]);

        let q = ParsedQuery::parse("!draft .pdf");
        assert_eq!(SearchOrchestrator::coarse_keys(&q), vec![""]);
    }
}
