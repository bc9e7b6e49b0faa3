// src/ingest/mod.rs
pub mod checkpoint;
pub mod fetcher;
pub mod providers;
pub mod rate_limit;
pub mod raw_store;
pub mod retry;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::ingest::fetcher::IncrementalFetcher;
use crate::ingest::raw_store::RawStore;
use crate::ingest::types::{RawRecord, Upstream};

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_fetched_total", "Items returned by upstream sources.");
        describe_counter!(
            "ingest_merged_total",
            "New unique items appended to raw collections."
        );
        describe_counter!(
            "ingest_retries_total",
            "Upstream requests retried after a transient failure."
        );
        describe_counter!(
            "ingest_failed_units_total",
            "Series/subreddits/terms abandoned during a run."
        );
    });
}

/// Raw-store key of one unit: `<source>/<unit>`.
pub fn raw_key(source: &str, unit: &str) -> String {
    format!("{source}/{unit}")
}

/// Merge `incoming` into `existing` by natural key. The first occurrence in
/// `existing ++ incoming` wins; the result is stably sorted by stamp.
/// Returns the merged collection and the number of dropped duplicates.
pub fn merge_by_key<R: RawRecord>(existing: Vec<R>, incoming: Vec<R>) -> (Vec<R>, usize) {
    let mut seen: HashSet<R::Key> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    let mut duplicates = 0usize;

    for r in existing.into_iter().chain(incoming) {
        if seen.insert(r.natural_key()) {
            out.push(r);
        } else {
            duplicates += 1;
        }
    }

    out.sort_by_key(|r| r.stamp());
    (out, duplicates)
}

/// Per-source outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub merged: usize,
    pub skipped: usize,
    pub failed_units: Vec<String>,
}

/// Sync every unit of one source in order. A failing unit is logged and
/// recorded; the remaining units still run.
pub async fn sync_all<U, S>(
    fetcher: &IncrementalFetcher<U, S>,
    keys: &[String],
    now: DateTime<Utc>,
) -> SourceReport
where
    U: Upstream,
    S: RawStore,
{
    ensure_metrics_described();

    let mut report = SourceReport {
        source: fetcher.source().to_string(),
        ..Default::default()
    };
    for key in keys {
        match fetcher.sync(key, now).await {
            Ok(r) => {
                report.fetched += r.fetched;
                report.merged += r.added;
                report.skipped += r.duplicates + r.invalid;
            }
            Err(e) => {
                tracing::error!(
                    target: "ingest",
                    source = fetcher.source(),
                    key = key.as_str(),
                    error = format!("{e:#}"),
                    "unit abandoned"
                );
                counter!("ingest_failed_units_total").increment(1);
                report.failed_units.push(key.clone());
            }
        }
    }
    tracing::info!(
        target: "ingest",
        source = report.source.as_str(),
        fetched = report.fetched,
        merged = report.merged,
        skipped = report.skipped,
        failed = report.failed_units.len(),
        "source complete"
    );
    report
}
