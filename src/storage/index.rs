use crate::core::config::Config;
use crate::core::error::{db_err, Error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;

/// Table definition for the file index
/// Key: absolute path, Value: (mtime seconds, size in bytes)
const FILES_TABLE: TableDefinition<&str, (f64, u64)> = TableDefinition::new("files");

/// One indexed file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Absolute path, the record's identity
    pub path: PathBuf,
    /// Base file name, used for all matching
    pub name: String,
    /// Last modification time in seconds since the epoch
    pub mtime: f64,
    /// Size in bytes
    pub size: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, mtime: f64, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            mtime,
            size,
        }
    }

    /// Stat `path` and build a record for it. Fails for directories,
    /// non-UTF-8 paths and anything `stat` rejects.
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.to_str().is_none() {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Not a regular file: {}", path.display()),
            )));
        }
        Ok(Self::new(path, mtime_secs(&metadata), metadata.len()))
    }

    fn key(&self) -> Result<&str> {
        self.path
            .to_str()
            .ok_or_else(|| Error::InvalidPath(self.path.clone()))
    }
}

/// Modification time of `metadata` as fractional seconds since the epoch.
/// Times before the epoch or unavailable on the platform read as 0.
pub fn mtime_secs(metadata: &std::fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Sort records newest first; equal times fall back to path order.
pub fn sort_by_recency(records: &mut [FileRecord]) {
    records.sort_by(|a, b| b.mtime.total_cmp(&a.mtime).then_with(|| a.path.cmp(&b.path)));
}

/// Base name of an index key
fn key_name(key: &str) -> &str {
    Path::new(key)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(key)
}

/// Case-insensitive substring test against an already lowercased needle.
/// ASCII names are compared in place.
fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    if haystack.is_ascii() && needle_lower.is_ascii() {
        let needle = needle_lower.as_bytes();
        return haystack
            .as_bytes()
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle));
    }
    haystack.to_lowercase().contains(needle_lower)
}

/// Heap entry for the coarse query. Orders worse-ranked entries as greater,
/// so the heap top is the first one to evict.
struct Ranked {
    mtime: f64,
    size: u64,
    path: String,
}

impl Ranked {
    /// Whether a row with `mtime` and `path` ranks ahead of `self`
    fn is_beaten_by(&self, mtime: f64, path: &str) -> bool {
        match mtime.total_cmp(&self.mtime) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => Path::new(path) < Path::new(&self.path),
        }
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .mtime
            .total_cmp(&self.mtime)
            .then_with(|| Path::new(&self.path).cmp(Path::new(&other.path)))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Persistent file index.
///
/// Every operation runs as one transaction inside one critical section of
/// the store's lock. Sequences of operations are not isolated from each
/// other.
pub struct IndexStore {
    db: Mutex<Database>,
}

impl IndexStore {
    /// Open or create the index at the configured location
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.index_path)
    }

    /// Open or create the index at `path`
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            Database::open(path).map_err(|e| {
                let msg = e.to_string();
                if msg.to_lowercase().contains("lock") || msg.to_lowercase().contains("already open") {
                    Error::Database("Index database is locked. Another quickfind process may be running. Close other instances and try again.".to_string())
                } else {
                    Error::Database(format!("Failed to open index database: {}", e))
                }
            })?
        } else {
            Database::create(path).map_err(db_err("Failed to create index database"))?
        };

        // Initialize table (safe even if it already exists)
        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let _table = write_txn
                .open_table(FILES_TABLE)
                .map_err(db_err("Failed to open table"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(Self { db: Mutex::new(db) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("Index lock poisoned".to_string()))
    }

    /// Insert or replace the record for `record.path`
    pub fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(record))
    }

    /// Insert or replace many records in a single transaction
    pub fn upsert_batch(&self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let db = self.lock()?;
        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(FILES_TABLE)
                .map_err(db_err("Failed to open table"))?;
            for record in records {
                table
                    .insert(record.key()?, (record.mtime, record.size))
                    .map_err(db_err("Failed to insert file record"))?;
            }
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(())
    }

    /// Remove the record for `path`. Removing an unknown path is not an error.
    pub fn delete(&self, path: &Path) -> Result<()> {
        let key = path
            .to_str()
            .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;

        let db = self.lock()?;
        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        {
            let mut table = write_txn
                .open_table(FILES_TABLE)
                .map_err(db_err("Failed to open table"))?;
            table
                .remove(key)
                .map_err(db_err("Failed to remove file record"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(())
    }

    /// Look up the record for `path`
    pub fn get(&self, path: &Path) -> Result<Option<FileRecord>> {
        let Some(key) = path.to_str() else {
            return Ok(None);
        };

        let db = self.lock()?;
        let read_txn = db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(FILES_TABLE)
            .map_err(db_err("Failed to open table"))?;

        let value = table.get(key).map_err(db_err("Failed to get file record"))?;
        Ok(value.map(|guard| {
            let (mtime, size) = guard.value();
            FileRecord::new(path, mtime, size)
        }))
    }

    /// Up to `limit` records whose name contains `needle` (case-insensitive),
    /// newest first. An empty needle matches every record.
    ///
    /// Rows are filtered on the borrowed key and only the best `limit` are
    /// kept while scanning. Unreadable rows are skipped.
    pub fn coarse_query(&self, needle: &str, limit: usize) -> Result<Vec<FileRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let needle = needle.to_lowercase();
        let mut best: BinaryHeap<Ranked> = BinaryHeap::with_capacity(limit.min(4096) + 1);

        {
            let db = self.lock()?;
            let read_txn = db
                .begin_read()
                .map_err(db_err("Failed to begin read transaction"))?;
            let table = read_txn
                .open_table(FILES_TABLE)
                .map_err(db_err("Failed to open table"))?;

            for item in table.iter().map_err(db_err("Failed to iterate index"))? {
                let (key, value) = match item {
                    Ok(row) => row,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable index row");
                        continue;
                    }
                };
                let path = key.value();
                if !contains_ignore_case(key_name(path), &needle) {
                    continue;
                }
                let (mtime, size) = value.value();
                if best.len() == limit {
                    let admits = best
                        .peek()
                        .map_or(true, |worst| worst.is_beaten_by(mtime, path));
                    if !admits {
                        continue;
                    }
                    best.pop();
                }
                best.push(Ranked {
                    mtime,
                    size,
                    path: path.to_string(),
                });
            }
        }

        Ok(best
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| FileRecord::new(ranked.path, ranked.mtime, ranked.size))
            .collect())
    }

    /// Remove every record
    pub fn clear(&self) -> Result<()> {
        let db = self.lock()?;
        let write_txn = db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        write_txn
            .delete_table(FILES_TABLE)
            .map_err(db_err("Failed to drop table"))?;
        {
            let _table = write_txn
                .open_table(FILES_TABLE)
                .map_err(db_err("Failed to open table"))?;
        }
        write_txn
            .commit()
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(())
    }

    /// Number of indexed files
    pub fn len(&self) -> Result<u64> {
        let db = self.lock()?;
        let read_txn = db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(FILES_TABLE)
            .map_err(db_err("Failed to open table"))?;
        table.len().map_err(db_err("Failed to count file records"))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
