//! Response cache with expiry, used by the direct solvers to skip repeated oracle calls.
//!
//! Keys look like `<prompt_kind>:<puzzle_text>`. The cache is an optimization only; a
//! miss or an unreadable entry never changes results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

pub const DEFAULT_TTL_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache entry encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cache lock poisoned")]
    Poisoned,
}

pub trait ResponseCache: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, CacheError>;
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;
    /// Reset the remaining lifetime of an existing entry. `0` expires it now.
    ///
    /// Returns whether the key was live.
    fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError>;
}

pub fn cache_key(prompt_kind: &str, puzzle: &str) -> String {
    format!("{prompt_kind}:{puzzle}")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

fn deadline_ms(ttl_secs: u64) -> u64 {
    now_ms().saturating_add(ttl_secs.saturating_mul(1000))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
    expires_at_ms: u64,
}

impl Entry {
    fn live(&self) -> bool {
        now_ms() < self.expires_at_ms
    }
}

/// Process-local cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> Result<R, CacheError> {
        let mut guard = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        guard.retain(|_, e| e.live());
        Ok(f(&mut guard))
    }
}

impl ResponseCache for MemoryCache {
    fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.with(|m| m.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with(|m| m.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.with(|m| {
            m.insert(
                key.to_string(),
                Entry {
                    key: key.to_string(),
                    value: value.to_string(),
                    expires_at_ms: deadline_ms(ttl_secs),
                },
            );
        })
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
        self.with(|m| match m.get_mut(key) {
            Some(e) => {
                e.expires_at_ms = deadline_ms(ttl_secs);
                true
            }
            None => false,
        })
    }
}

/// One JSON file per key under a directory, written atomically.
///
/// File names are the SHA-256 of the key; the stored key is compared on read.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(root).map_err(|source| CacheError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut h = Sha256::new();
        h.update(key.as_bytes());
        self.root.join(format!("{}.json", hex::encode(h.finalize())))
    }

    fn read(&self, key: &str) -> Option<Entry> {
        let p = self.path_for(key);
        let txt = std::fs::read_to_string(&p).ok()?;
        let e: Entry = serde_json::from_str(&txt).ok()?;
        if e.key != key {
            return None;
        }
        if !e.live() {
            let _ = std::fs::remove_file(&p);
            return None;
        }
        Some(e)
    }

    fn write(&self, e: &Entry) -> Result<(), CacheError> {
        let p = self.path_for(&e.key);
        let io_err = |source: std::io::Error| CacheError::Io {
            path: p.clone(),
            source,
        };
        let data = serde_json::to_vec(e)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.persist(&p).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl ResponseCache for DiskCache {
    fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.read(key).is_some())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read(key).map(|e| e.value))
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.write(&Entry {
            key: key.to_string(),
            value: value.to_string(),
            expires_at_ms: deadline_ms(ttl_secs),
        })
    }

    fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
        let Some(mut e) = self.read(key) else {
            return Ok(false);
        };
        if ttl_secs == 0 {
            let p = self.path_for(key);
            std::fs::remove_file(&p).map_err(|source| CacheError::Io { path: p, source })?;
            return Ok(true);
        }
        e.expires_at_ms = deadline_ms(ttl_secs);
        self.write(&e)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(c: &dyn ResponseCache) {
        let k = cache_key("ioprompt", "4 5 6 10");
        assert_eq!(k, "ioprompt:4 5 6 10");
        assert!(!c.exists(&k).unwrap());
        c.set(&k, "5 * 6 - (10 - 4) = 24", DEFAULT_TTL_SECS).unwrap();
        assert!(c.exists(&k).unwrap());
        assert_eq!(c.get(&k).unwrap().as_deref(), Some("5 * 6 - (10 - 4) = 24"));
        assert!(c.expire(&k, 0).unwrap());
        assert!(!c.exists(&k).unwrap());
        assert_eq!(c.get(&k).unwrap(), None);
        assert!(!c.expire(&k, 10).unwrap());
    }

    #[test]
    fn memory_cache_set_get_expire() {
        exercise(&MemoryCache::new());
    }

    #[test]
    fn disk_cache_set_get_expire() {
        let td = tempfile::tempdir().unwrap();
        exercise(&DiskCache::open(td.path()).unwrap());
    }

    #[test]
    fn zero_ttl_set_is_never_visible() {
        let c = MemoryCache::new();
        c.set("k", "v", 0).unwrap();
        assert!(!c.exists("k").unwrap());
    }

    #[test]
    fn entries_lapse_after_their_ttl() {
        let td = tempfile::tempdir().unwrap();
        let disk = DiskCache::open(td.path()).unwrap();
        let mem = MemoryCache::new();
        disk.set("k", "v", 1).unwrap();
        mem.set("k", "v", 1).unwrap();
        assert!(disk.exists("k").unwrap() && mem.exists("k").unwrap());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(!disk.exists("k").unwrap());
        assert!(!mem.exists("k").unwrap());
    }

    #[test]
    fn disk_cache_persists_across_instances() {
        let td = tempfile::tempdir().unwrap();
        DiskCache::open(td.path())
            .unwrap()
            .set("cotprompt:1 1 4 6", "Answer: 6 * 4 * 1 * 1 = 24", 60)
            .unwrap();
        let again = DiskCache::open(td.path()).unwrap();
        assert_eq!(
            again.get("cotprompt:1 1 4 6").unwrap().as_deref(),
            Some("Answer: 6 * 4 * 1 * 1 = 24")
        );
        assert!(again.expire("cotprompt:1 1 4 6", 120).unwrap());
        assert!(again.exists("cotprompt:1 1 4 6").unwrap());
    }
}
