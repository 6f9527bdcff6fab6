use crate::core::config::Config;
use crate::storage::index::FileRecord;
use chrono::{DateTime, Local, Utc};
use std::path::Path;

/// Human-readable size: whole B/K/M/G units, one decimal for terabytes.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "K", "M", "G"] {
        if size < 1024.0 {
            return format!("{}{}", size as u64, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1}T", size)
}

/// Local calendar date of a modification time
pub fn format_mtime(mtime: f64) -> String {
    DateTime::<Utc>::from_timestamp(mtime.trunc() as i64, 0)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Parent directory of `path`, with the home directory shown as `~`
pub fn display_dir(path: &Path, home: Option<&Path>) -> String {
    let parent = path.parent().unwrap_or(path);
    if let Some(home) = home {
        if let Ok(rest) = parent.strip_prefix(home) {
            return if rest.as_os_str().is_empty() {
                "~".to_string()
            } else {
                format!("~/{}", rest.display())
            };
        }
    }
    parent.display().to_string()
}

/// One result line: name, size, date, directory
pub fn format_record(record: &FileRecord, home: Option<&Path>) -> String {
    format!(
        "{:<40} {:>7}  {}  {}",
        record.name,
        format_size(record.size),
        format_mtime(record.mtime),
        display_dir(&record.path, home),
    )
}

/// One result as a JSON object on a single line
pub fn format_record_json(record: &FileRecord) -> serde_json::Result<String> {
    serde_json::to_string(record)
}

/// Index location, roots and record count. `files` is `None` while no index
/// has been built.
pub fn format_status(config: &Config, files: Option<u64>) -> String {
    let mut lines = vec![format!("Index: {}", config.index_path.display())];
    for root in &config.search_roots {
        lines.push(format!("Root:  {}", root.display()));
    }
    match files {
        Some(count) => lines.push(format!("Files: {}", count)),
        None => lines.push("Not built yet. Run 'quickfind index' to build it.".to_string()),
    }
    lines.join("\n")
}
