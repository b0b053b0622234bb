use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use textsift_core::{ContentStore, Error, Result};

pub mod budget;
pub mod collect;
pub mod containment;
pub mod dedup;
pub mod embed;
pub mod pipeline;
pub mod records;
pub mod score;
pub mod textprep;
pub mod threshold;

/// Hex sha256 of `parts`, each terminated by a newline.
pub fn content_key(parts: &[&str]) -> String {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p.as_bytes());
        h.update(b"\n");
    }
    hex::encode(h.finalize())
}

/// Filesystem-backed content store, sharded by key prefix.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join("textsift-store")
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        // Keys become path components; only accept what `content_key` produces.
        if key.len() < 4 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Store(format!("invalid store key: {key:?}")));
        }
        Ok(self
            .root
            .join(&key[0..2])
            .join(&key[2..4])
            .join(format!("{key}.bin")))
    }
}

impl ContentStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let p = self.path(key)?;
        match fs::read(&p) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let p = self.path(key)?;
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Store(e.to_string()))?;
        }
        fs::write(&p, value).map_err(|e| Error::Store(e.to_string()))
    }
}

/// In-process store. Handy for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let m = self
            .inner
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
        Ok(m.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut m = self
            .inner
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
        m.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
