use super::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default maximum traversal depth below a search root
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Configuration for quickfind
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for quickfind data
    pub base_dir: PathBuf,
    /// Location of the persistent file index
    pub index_path: PathBuf,
    /// Directory roots to index and scan
    pub search_roots: Vec<PathBuf>,
    /// Whether dot-prefixed files and directories are visible
    pub show_hidden: bool,
    /// Maximum depth (in path components below a root) of reported files
    pub max_depth: usize,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".quickfind"))
    }

    /// Create a new configuration
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| {
            Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".quickfind"))
        });

        let search_roots = dirs::home_dir().into_iter().collect();

        Ok(Self {
            index_path: base_dir.join("index.redb"),
            search_roots,
            show_hidden: false,
            max_depth: DEFAULT_MAX_DEPTH,
            base_dir,
        })
    }

    /// Replace the search roots. Each root is `~`-expanded and made absolute.
    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.search_roots = roots.into_iter().map(|p| resolve_root(p.as_ref())).collect();
        self
    }

    pub fn with_show_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    /// Store the index somewhere other than `base_dir`
    pub fn with_index_path(mut self, index_path: impl Into<PathBuf>) -> Self {
        self.index_path = index_path.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists()
    }
}

/// Expand a leading `~` component to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Expand `~` and anchor a relative path at the current directory.
///
/// The path is not required to exist and symlinks are left alone.
pub fn resolve_root(path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    match std::path::absolute(&expanded) {
        Ok(absolute) => absolute,
        Err(e) => {
            tracing::debug!(path = %expanded.display(), error = %e, "Could not make root absolute");
            expanded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths_derive_from_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base_dir = temp_dir.path().join("qf");
        let config = Config::new(Some(base_dir.clone())).unwrap();

        assert_eq!(config.index_path, base_dir.join("index.redb"));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.show_hidden);
        assert!(!config.is_initialized());

        config.init().unwrap();
        assert!(config.is_initialized());
    }

    #[test]
    fn test_index_path_override() {
        let temp_dir = TempDir::new().unwrap();
        let elsewhere = temp_dir.path().join("other").join("files.redb");
        let config = Config::new(Some(temp_dir.path().join("qf")))
            .unwrap()
            .with_index_path(&elsewhere);
        config.init().unwrap();

        assert_eq!(config.index_path, elsewhere);
        assert!(elsewhere.parent().unwrap().exists());
    }

    #[test]
    fn test_expand_home() {
        let plain = Path::new("/data/notes");
        assert_eq!(expand_home(plain), PathBuf::from("/data/notes"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/Documents")), home.join("Documents"));
            assert_eq!(expand_home(Path::new("~")), home);
        }
        // Only a whole leading component counts
        assert_eq!(expand_home(Path::new("~user/x")), PathBuf::from("~user/x"));
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let config = Config::new(None)
            .unwrap()
            .with_roots(["data", "./notes", "/abs/root"]);

        assert!(config.search_roots.iter().all(|root| root.is_absolute()));
        assert_eq!(config.search_roots[0], cwd.join("data"));
        assert_eq!(config.search_roots[1], cwd.join("notes"));
        assert_eq!(config.search_roots[2], PathBuf::from("/abs/root"));
    }
}
