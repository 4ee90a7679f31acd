//! Local key-value cache for session data
//!
//! Holds the access token between runs, plus whatever an older client may
//! have left under [`LEGACY_STATE_KEY`]. Values are strings; callers
//! serialize as they see fit.

use crate::error::{Result, TrackerError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key of the whole-dashboard snapshot written by older clients
pub const LEGACY_STATE_KEY: &str = "habitTrackerState";

/// Key of the signed-in user's access token
pub const SESSION_TOKEN_KEY: &str = "session.access_token";

/// Local key-value storage
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Remove every key
    fn clear(&self) -> Result<()>;
}

fn poisoned() -> TrackerError {
    TrackerError::Cache("cache lock poisoned".into())
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.clear();
        Ok(())
    }
}

/// Cache persisted as a flat JSON object in one file.
///
/// Every write rewrites the file. Clearing deletes it.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open the cache at `path`, loading existing entries if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;

        // Session tokens are for the owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        cache.set(SESSION_TOKEN_KEY, "tok").unwrap();
        assert_eq!(cache.get(SESSION_TOKEN_KEY).unwrap().as_deref(), Some("tok"));

        cache.remove(SESSION_TOKEN_KEY).unwrap();
        assert!(cache.get(SESSION_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_file_cache_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let cache = FileCache::open(&path).unwrap();
        cache.set(SESSION_TOKEN_KEY, "tok").unwrap();
        cache.set(LEGACY_STATE_KEY, "{}").unwrap();
        drop(cache);

        let reopened = FileCache::open(&path).unwrap();
        assert_eq!(reopened.get(SESSION_TOKEN_KEY).unwrap().as_deref(), Some("tok"));
        assert_eq!(reopened.get(LEGACY_STATE_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_cache_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let cache = FileCache::open(&path).unwrap();
        cache.set(SESSION_TOKEN_KEY, "tok").unwrap();
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(!path.exists());
        assert!(cache.get(SESSION_TOKEN_KEY).unwrap().is_none());

        // Clearing twice is fine
        cache.clear().unwrap();
    }

    #[test]
    fn test_file_cache_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(FileCache::open(&path), Err(TrackerError::Serialization(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let cache = FileCache::open(&path).unwrap();
        cache.set(SESSION_TOKEN_KEY, "tok").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
