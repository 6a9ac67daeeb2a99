/// Best-time persistence.
///
/// The run state machine only talks to a `BestTimeStore`; where the
/// numbers live is the store's business.
///
///   **FileStore**: `best_times.toml` in the save directory, one table
///   per namespace, keyed by level index:
///
///   ```toml
///   [worldswap]
///   0 = 18342
///   2 = 40117
///   ```
///
///   **MemoryStore**: in-process only. Used when the save directory
///   can't be opened, and by tests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("best time file is malformed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not encode best times: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Per-level best run times in whole milliseconds.
pub trait BestTimeStore {
    fn best(&self, level: usize) -> Option<u64>;
    fn record(&mut self, level: usize, ms: u64) -> Result<(), SaveError>;
}

// ══════════════════════════════════════════════════════════════
// Paths
// ══════════════════════════════════════════════════════════════

const BEST_TIMES_FILE: &str = "best_times.toml";

/// Directory for best times and the log file.
pub fn save_dir() -> PathBuf {
    // 1. Try exe directory (works for local/portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            // Check if writable (system installs like /usr/games/ won't be)
            let test_path = parent.join(".write_test_worldswap");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home (~/.local/share/worldswap)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/worldswap");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. Fallback to CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

// ══════════════════════════════════════════════════════════════
// File store
// ══════════════════════════════════════════════════════════════

type Namespaces = BTreeMap<String, BTreeMap<String, u64>>;

pub struct FileStore {
    path: PathBuf,
    namespace: String,
    data: Namespaces,
}

impl FileStore {
    /// Open (or start) `best_times.toml` inside `dir`.
    /// Tables for other namespaces are kept untouched on write.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self, SaveError> {
        let path = dir.join(BEST_TIMES_FILE);
        let data = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|source| SaveError::Read { path: path.clone(), source })?;
            toml::from_str::<Namespaces>(&text)?
        } else {
            Namespaces::new()
        };
        Ok(FileStore { path, namespace: namespace.to_string(), data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), SaveError> {
        let text = toml::to_string(&self.data)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| SaveError::Write { path: self.path.clone(), source })?;
        }
        std::fs::write(&self.path, text)
            .map_err(|source| SaveError::Write { path: self.path.clone(), source })
    }
}

impl BestTimeStore for FileStore {
    fn best(&self, level: usize) -> Option<u64> {
        self.data.get(&self.namespace)?.get(&level.to_string()).copied()
    }

    fn record(&mut self, level: usize, ms: u64) -> Result<(), SaveError> {
        self.data
            .entry(self.namespace.clone())
            .or_default()
            .insert(level.to_string(), ms);
        self.flush()
    }
}

// ══════════════════════════════════════════════════════════════
// Memory store
// ══════════════════════════════════════════════════════════════

#[derive(Default, Debug)]
pub struct MemoryStore {
    times: HashMap<usize, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl BestTimeStore for MemoryStore {
    fn best(&self, level: usize) -> Option<u64> {
        self.times.get(&level).copied()
    }

    fn record(&mut self, level: usize, ms: u64) -> Result<(), SaveError> {
        self.times.insert(level, ms);
        Ok(())
    }
}
