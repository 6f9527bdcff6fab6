use crate::core::error::{Error, Result};
use notify_debouncer_full::{
    new_debouncer,
    notify::{
        event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
        Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    },
    DebounceEventResult, Debouncer, FileIdMap,
};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Quiet period before a burst of filesystem notifications is delivered
const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

/// A filesystem change, tagged file-vs-directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created { path: PathBuf, is_dir: bool },
    Modified { path: PathBuf, is_dir: bool },
    Deleted { path: PathBuf, is_dir: bool },
    Moved { from: PathBuf, to: PathBuf, is_dir: bool },
}

impl FsEvent {
    pub fn is_dir(&self) -> bool {
        match self {
            FsEvent::Created { is_dir, .. }
            | FsEvent::Modified { is_dir, .. }
            | FsEvent::Deleted { is_dir, .. }
            | FsEvent::Moved { is_dir, .. } => *is_dir,
        }
    }
}

/// Messages drained by the index maintainer's event thread
#[derive(Debug)]
pub(crate) enum WatchMessage {
    Event(FsEvent),
    Stop,
}

/// Where an event source delivers its events
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<WatchMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<WatchMessage>) -> Self {
        Self { tx }
    }

    /// Queue an event. Returns false once the consumer has gone away.
    pub fn send(&self, event: FsEvent) -> bool {
        self.tx.send(WatchMessage::Event(event)).is_ok()
    }
}

/// Something that reports filesystem changes under a set of roots.
///
/// Delivery stops when the source is dropped.
pub trait EventSource: Send {
    fn start(&mut self, roots: &[PathBuf], sink: EventSink) -> Result<()>;
}

/// Event source backed by the platform watcher, debounced
#[derive(Default)]
pub struct NotifySource {
    debouncer: Option<Debouncer<RecommendedWatcher, FileIdMap>>,
}

impl NotifySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSource for NotifySource {
    fn start(&mut self, roots: &[PathBuf], sink: EventSink) -> Result<()> {
        let mut debouncer = new_debouncer(
            DEBOUNCE_TIMEOUT,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        for fs_event in translate(&event.event) {
                            if !sink.send(fs_event) {
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        tracing::warn!(error = %e, "File watcher error");
                    }
                }
            },
        )
        .map_err(|e| Error::Watch(format!("Failed to create file watcher: {}", e)))?;

        for root in roots {
            if !root.exists() {
                tracing::debug!(root = %root.display(), "Skipping missing root");
                continue;
            }
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| {
                    Error::Watch(format!("Failed to watch {}: {}", root.display(), e))
                })?;
            debouncer.cache().add_root(root, RecursiveMode::Recursive);
        }

        self.debouncer = Some(debouncer);
        Ok(())
    }
}

/// Translate one `notify` event into zero or more index events.
pub fn translate(event: &Event) -> Vec<FsEvent> {
    let paths = &event.paths;
    let Some(first) = paths.first().cloned() else {
        return Vec::new();
    };

    match &event.kind {
        EventKind::Create(kind) => {
            let is_dir = matches!(kind, CreateKind::Folder) || first.is_dir();
            vec![FsEvent::Created { path: first, is_dir }]
        }
        EventKind::Remove(kind) => {
            let is_dir = matches!(kind, RemoveKind::Folder);
            vec![FsEvent::Deleted { path: first, is_dir }]
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if paths.len() >= 2 => {
                let to = paths[1].clone();
                let is_dir = to.is_dir();
                vec![FsEvent::Moved { from: first, to, is_dir }]
            }
            RenameMode::From => vec![FsEvent::Deleted {
                path: first,
                is_dir: false,
            }],
            RenameMode::To => {
                let is_dir = first.is_dir();
                vec![FsEvent::Created { path: first, is_dir }]
            }
            // Unpaired renames: whatever is there now decides
            _ => {
                if first.exists() {
                    let is_dir = first.is_dir();
                    vec![FsEvent::Created { path: first, is_dir }]
                } else {
                    vec![FsEvent::Deleted {
                        path: first,
                        is_dir: false,
                    }]
                }
            }
        },
        EventKind::Modify(_) => {
            let is_dir = first.is_dir();
            vec![FsEvent::Modified { path: first, is_dir }]
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
