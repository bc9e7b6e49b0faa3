// src/ingest/fetcher.rs
//! Incremental, resumable fetch of one source.
//!
//! Per unit (series / subreddit / term):
//! 1. resolve the start boundary from the checkpoint or the lookback window,
//! 2. page through the upstream behind the rate limiter with bounded retries,
//! 3. merge with the persisted collection (first seen wins) and save,
//! 4. advance the checkpoint to the newest valid record.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::error::FetchError;
use crate::ingest::checkpoint::CheckpointStore;
use crate::ingest::merge_by_key;
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::raw_store::RawStore;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::{FetchWindow, RawRecord, Upstream, Watermark};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Resume from the checkpoint when one exists.
    pub incremental: bool,
    /// Window used when there is no checkpoint (or `incremental` is off).
    pub lookback_days: i64,
}

/// Outcome of one successful unit sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub key: String,
    pub fetched: usize,
    pub added: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub total: usize,
    pub watermark: Option<Watermark>,
}

pub struct IncrementalFetcher<U: Upstream, S: RawStore> {
    upstream: U,
    limiter: RateLimiter,
    retry: RetryPolicy,
    raw: Arc<S>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: FetchSettings,
}

impl<U: Upstream, S: RawStore> IncrementalFetcher<U, S> {
    pub fn new(
        upstream: U,
        limiter: RateLimiter,
        retry: RetryPolicy,
        raw: Arc<S>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            upstream,
            limiter,
            retry,
            raw,
            checkpoints,
            settings,
        }
    }

    pub fn source(&self) -> &'static str {
        self.upstream.name()
    }

    /// Raw-store key for a unit, namespaced by source.
    pub fn raw_key(&self, key: &str) -> String {
        crate::ingest::raw_key(self.upstream.name(), key)
    }

    /// Request everything after `since` (or the lookback window) up to `now`.
    /// Returns the fetched items and the newest stamp among them.
    pub async fn fetch(
        &self,
        key: &str,
        since: Option<Watermark>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<U::Record>, Option<Watermark>), FetchError> {
        let kind = self.upstream.cursor_kind();
        let start = match since {
            Some(wm) => wm.next(),
            None => Watermark::lookback(kind, now, self.settings.lookback_days),
        };
        let end = Watermark::at(kind, now);
        if start > end {
            tracing::info!(target: "ingest", source = self.source(), key, %start, "already up to date");
            return Ok((Vec::new(), since));
        }

        let page_size = self.upstream.page_size();
        let mut window = FetchWindow {
            start,
            end,
            page_size: page_size.unwrap_or(0),
        };
        let mut items: Vec<U::Record> = Vec::new();

        loop {
            let w = window;
            tracing::debug!(target: "ingest", source = self.source(), key, start = %w.start, end = %w.end, "requesting page");
            let page = self
                .retry
                .run(key, |_| async move {
                    self.limiter.acquire().await;
                    self.upstream.fetch_page(key, &w).await
                })
                .await?;

            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            let newest = page.iter().map(RawRecord::stamp).max();
            items.extend(page);

            let Some(size) = page_size else { break };
            if page_len < size {
                break;
            }
            match newest {
                Some(newest) => {
                    let cursor = newest.next();
                    if cursor >= end || cursor <= window.start {
                        break;
                    }
                    window.start = cursor;
                }
                None => break,
            }
        }

        let newest = items
            .iter()
            .filter(|r| r.is_valid())
            .map(RawRecord::stamp)
            .max();
        Ok((items, newest))
    }

    /// Fetch, merge into the raw collection, and advance the checkpoint.
    pub async fn sync(&self, key: &str, now: DateTime<Utc>) -> Result<FetchReport> {
        let raw_key = self.raw_key(key);
        let existing: Vec<U::Record> = self
            .raw
            .load(&raw_key)
            .with_context(|| format!("loading raw collection {raw_key}"))?;

        let since = if self.settings.incremental {
            self.checkpoints.get(key)?
        } else {
            None
        };
        if let Some(wm) = since {
            tracing::info!(target: "ingest", source = self.source(), key, from = %wm.next(), "incremental update");
        }

        let (fetched, _) = self
            .fetch(key, since, now)
            .await
            .with_context(|| format!("fetching {raw_key}"))?;
        counter!("ingest_fetched_total").increment(fetched.len() as u64);

        if fetched.is_empty() {
            tracing::info!(target: "ingest", source = self.source(), key, "no new items");
            let invalid = existing.iter().filter(|r| !r.is_valid()).count();
            return Ok(FetchReport {
                key: key.to_string(),
                fetched: 0,
                added: 0,
                duplicates: 0,
                invalid,
                total: existing.len(),
                watermark: since,
            });
        }

        let fetched_len = fetched.len();
        let before = existing.len();
        let (merged, duplicates) = merge_by_key(existing, fetched);
        self.raw
            .save(&raw_key, &merged)
            .with_context(|| format!("saving raw collection {raw_key}"))?;

        let invalid = merged.iter().filter(|r| !r.is_valid()).count();
        let watermark = merged
            .iter()
            .filter(|r| r.is_valid())
            .map(RawRecord::stamp)
            .max();
        match watermark {
            Some(wm) => self.checkpoints.set(key, wm)?,
            None => tracing::warn!(target: "ingest", source = self.source(), key, "no valid records; checkpoint unchanged"),
        }

        let added = merged.len() - before;
        counter!("ingest_merged_total").increment(added as u64);
        tracing::info!(
            target: "ingest",
            source = self.source(),
            key,
            fetched = fetched_len,
            added,
            duplicates,
            total = merged.len(),
            watermark = ?watermark,
            "merged"
        );

        Ok(FetchReport {
            key: key.to_string(),
            fetched: fetched_len,
            added,
            duplicates,
            invalid,
            total: merged.len(),
            watermark: watermark.or(since),
        })
    }
}
