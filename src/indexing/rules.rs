use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Directory names never traversed: version control, caches, build output
/// and package managers.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    ".idea",
    ".vscode",
    "Library",
    "Containers",
    "Cache",
    "Caches",
    "Logs",
    "tmp",
];

/// Top-level roots the live scanner refuses to walk.
pub const SYSTEM_EXCLUDED_PREFIXES: &[&str] = &[
    "/System", "/private", "/dev", "/net", "/Volumes", "/cores", "/var", "/tmp", "/proc", "/sys",
];

/// Check if a directory name is in the ignore set
pub fn is_ignored_dir_name(name: &OsStr) -> bool {
    name.to_str()
        .map(|name| IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

fn is_hidden_name(name: &OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

/// Pruning rules shared by the index rebuild, incremental maintenance and
/// the live scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkRules {
    pub show_hidden: bool,
}

impl WalkRules {
    pub fn new(show_hidden: bool) -> Self {
        Self { show_hidden }
    }

    /// Whether a subdirectory called `name` should be descended into
    pub fn admits_dir(&self, name: &OsStr) -> bool {
        !is_ignored_dir_name(name) && (self.show_hidden || !is_hidden_name(name))
    }

    /// Whether a file called `name` should be reported
    pub fn admits_file(&self, name: &OsStr) -> bool {
        self.show_hidden || !is_hidden_name(name)
    }

    /// Whether `path` lies under an ignored or (when hidden files are off)
    /// hidden component.
    ///
    /// Only components below the first matching root are considered, so a
    /// root that itself sits in a dot-directory still works. Paths outside
    /// every root are judged on all their components.
    pub fn is_ignored_path(&self, path: &Path, roots: &[PathBuf]) -> bool {
        let relative = roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        let mut components = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .peekable();

        while let Some(name) = components.next() {
            // The final component is the file itself; the ignore set only prunes directories.
            let is_dir_component = components.peek().is_some();
            if is_dir_component && is_ignored_dir_name(name) {
                return true;
            }
            if !self.show_hidden && is_hidden_name(name) {
                return true;
            }
        }
        false
    }
}

/// Whether `path` starts with one of `prefixes`, compared component-wise.
pub fn has_excluded_prefix(path: &Path, prefixes: &[PathBuf]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

/// The default set of system-reserved prefixes
pub fn default_excluded_prefixes() -> Vec<PathBuf> {
    SYSTEM_EXCLUDED_PREFIXES.iter().map(PathBuf::from).collect()
}
