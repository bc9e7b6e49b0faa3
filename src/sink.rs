// src/sink.rs
//! Output tables.
//!
//! A `Sink` accepts a named table as ordered columns plus JSON-valued rows,
//! either appended to what is there or replacing it.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::Value;

pub const FRED_OBSERVATIONS: &str = "fred_observations";
pub const REDDIT_POSTS: &str = "reddit_posts";
pub const TRENDS_WEEKLY: &str = "trends_weekly";
pub const ZILLOW_METRICS: &str = "zillow_metrics";
pub const ZILLOW_CITY_LATEST: &str = "zillow_city_latest";
pub const ZILLOW_STATE_AGGREGATED: &str = "zillow_state_aggregated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TableBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Short rows are padded with nulls.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// One row per record; columns are the union of field names in first-seen
    /// order. Records must serialize to JSON objects.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self> {
        let mut objects = Vec::with_capacity(records.len());
        for r in records {
            match serde_json::to_value(r)? {
                Value::Object(m) => objects.push(m),
                other => bail!("record is not an object: {other}"),
            }
        }
        let mut columns: Vec<String> = Vec::new();
        for m in &objects {
            for k in m.keys() {
                if !columns.contains(k) {
                    columns.push(k.clone());
                }
            }
        }
        let mut batch = Self::new(columns);
        for mut m in objects {
            let row = batch
                .columns
                .iter()
                .map(|c| m.remove(c).unwrap_or(Value::Null))
                .collect();
            batch.rows.push(row);
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let ci = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(ci)
    }
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn write(&self, table: &str, batch: TableBatch, mode: WriteMode) -> Result<()>;
}

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One `<table>.csv` per table under a directory.
pub struct CsvDirSink {
    dir: PathBuf,
}

impl CsvDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    fn existing_header(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let header = rdr.headers()?.iter().map(str::to_string).collect();
        Ok(Some(header))
    }
}

#[async_trait::async_trait]
impl Sink for CsvDirSink {
    async fn write(&self, table: &str, batch: TableBatch, mode: WriteMode) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(table);

        let append = match (mode, Self::existing_header(&path)?) {
            (WriteMode::Append, Some(header)) => {
                if header != batch.columns {
                    bail!("{table}: appended columns differ from {}", path.display());
                }
                true
            }
            _ => false,
        };

        let file = if append {
            OpenOptions::new().append(true).open(&path)
        } else {
            fs::File::create(&path)
        }
        .with_context(|| format!("opening {}", path.display()))?;

        let mut w = csv::Writer::from_writer(file);
        if !append {
            w.write_record(&batch.columns)?;
        }
        for row in &batch.rows {
            w.write_record(row.iter().map(cell))?;
        }
        w.flush().with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(
            target: "pipeline",
            table,
            rows = batch.rows.len(),
            mode = ?mode,
            path = %path.display(),
            "table written"
        );
        Ok(())
    }
}

/// Keeps tables in memory; used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, TableBatch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<TableBatch> {
        self.tables.lock().ok()?.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Sink for MemorySink {
    async fn write(&self, table: &str, batch: TableBatch, mode: WriteMode) -> Result<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        match (mode, tables.get_mut(table)) {
            (WriteMode::Append, Some(existing)) => {
                if existing.columns != batch.columns {
                    bail!("{table}: appended columns differ");
                }
                existing.rows.extend(batch.rows);
            }
            _ => {
                tables.insert(table.to_string(), batch);
            }
        }
        Ok(())
    }
}
