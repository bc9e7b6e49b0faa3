// src/ingest/raw_store.rs
//! Raw collections: one JSON array per series / subreddit / search term.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

pub trait RawStore: Send + Sync {
    /// Items persisted under `key`; empty when nothing was stored yet.
    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Vec<R>>;
    fn save<R: Serialize>(&self, key: &str, items: &[R]) -> Result<()>;
    fn exists(&self, key: &str) -> bool;
}

/// Stores `key` as `<root>/<key>.json`; `/` in keys becomes a subdirectory.
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut p = self.root.clone();
        for part in key.split('/').filter(|s| !s.is_empty()) {
            p.push(part);
        }
        p.set_extension("json");
        p
    }
}

impl RawStore for JsonDirStore {
    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Vec<R>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    fn save<R: Serialize>(&self, key: &str, items: &[R]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(items)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }
}

/// In-memory store; items are kept serialized so round-trips behave like files.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawStore for MemoryStore {
    fn load<R: DeserializeOwned>(&self, key: &str) -> Result<Vec<R>> {
        let m = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match m.get(key) {
            Some(s) => Ok(serde_json::from_str(s)?),
            None => Ok(Vec::new()),
        }
    }

    fn save<R: Serialize>(&self, key: &str, items: &[R]) -> Result<()> {
        let body = serde_json::to_string(items)?;
        let mut m = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        m.insert(key.to_string(), body);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        let m = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        m.contains_key(key)
    }
}
