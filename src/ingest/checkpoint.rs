// src/ingest/checkpoint.rs
//! Per-series watermarks used to resume incremental fetches.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::ingest::types::Watermark;

pub trait CheckpointStore: Send + Sync {
    fn get(&self, source_key: &str) -> Result<Option<Watermark>>;
    fn set(&self, source_key: &str, watermark: Watermark) -> Result<()>;
}

/// All watermarks of one source in a single JSON object file.
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Watermark>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading checkpoints from {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("parsing checkpoints in {}", self.path.display()))
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn get(&self, source_key: &str) -> Result<Option<Watermark>> {
        Ok(self.read_all()?.get(source_key).copied())
    }

    fn set(&self, source_key: &str, watermark: Watermark) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(source_key.to_string(), watermark);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&all)?;
        // write-then-rename so a crash never leaves a truncated file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    inner: Mutex<BTreeMap<String, Watermark>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, source_key: &str) -> Result<Option<Watermark>> {
        let m = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        Ok(m.get(source_key).copied())
    }

    fn set(&self, source_key: &str, watermark: Watermark) -> Result<()> {
        let mut m = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        m.insert(source_key.to_string(), watermark);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn json_store_roundtrips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCheckpointStore::new(dir.path().join("state/fred.json"));
        assert_eq!(store.get("CPIAUCSL").unwrap(), None);

        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        store.set("CPIAUCSL", Watermark::Date(d)).unwrap();
        store.set("GDPC1", Watermark::Date(d)).unwrap();
        store
            .set("CPIAUCSL", Watermark::Date(d.succ_opt().unwrap()))
            .unwrap();

        let reopened = JsonCheckpointStore::new(store.path());
        assert_eq!(
            reopened.get("CPIAUCSL").unwrap(),
            Some(Watermark::Date(d.succ_opt().unwrap()))
        );
        assert_eq!(reopened.get("GDPC1").unwrap(), Some(Watermark::Date(d)));
    }

    #[test]
    fn memory_store() {
        let s = MemoryCheckpointStore::new();
        s.set("r/x", Watermark::Timestamp(10)).unwrap();
        assert_eq!(s.get("r/x").unwrap(), Some(Watermark::Timestamp(10)));
        assert_eq!(s.get("r/y").unwrap(), None);
    }
}
