// Core functionality
pub mod core {
    pub mod cancel;
    pub mod config;
    pub mod error;
}

// Persistent file index
pub mod storage {
    pub mod index;
}

// Index maintenance: rebuilds and filesystem events
pub mod indexing {
    pub mod maintainer;
    pub mod rules;
    pub mod watch;
}

// Query language, indexed search and live scanning
pub mod search {
    pub mod orchestrator;
    pub mod query;
    pub mod scanner;
    pub mod session;
}

// Command line surface
pub mod ui {
    pub mod cli;
    pub mod format;
}

// Re-export commonly used types
pub use core::cancel::CancelToken;
pub use core::config::Config;
pub use core::error::{Error, Result};
pub use indexing::maintainer::{IndexMaintainer, IndexState, MonitorStatus, RebuildOutcome, RebuildStats};
pub use indexing::rules::WalkRules;
pub use indexing::watch::{EventSink, EventSource, FsEvent, NotifySource};
pub use search::orchestrator::SearchOrchestrator;
pub use search::query::ParsedQuery;
pub use search::scanner::{LiveScanner, ScanOptions};
pub use search::session::{SearchEvent, SearchHandle};
pub use storage::index::{FileRecord, IndexStore};
pub use ui::cli::Cli;
