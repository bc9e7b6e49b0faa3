// src/pipeline.rs
//! One pipeline pass: ingest every source, rebuild the processed and derived
//! tables from the raw collections, write them to the sink.
//!
//! Sources run one after another. A failing unit or source is reported and
//! the run carries on; only configuration errors abort it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::city::city_latest_table;
use crate::aggregate::state::state_aggregate_table;
use crate::aggregate::{
    build_city_latest, build_state_aggregate, resample_weekly, CityLatestSnapshot, PolicyTable,
    StateAggregate, TrendPoint,
};
use crate::config::{resolve_api_key, PathsConfig, PipelineConfig, ENV_FRED_API_KEY, ENV_SERPAPI_API_KEY};
use crate::extract::{Gazetteer, TextExtractor};
use crate::ingest::checkpoint::{CheckpointStore, JsonCheckpointStore, MemoryCheckpointStore};
use crate::ingest::fetcher::IncrementalFetcher;
use crate::ingest::providers::fred::{FredClient, RawObservation};
use crate::ingest::providers::pullpush::{PullPushClient, RawPost};
use crate::ingest::providers::trends::{RawInterest, TrendsClient};
use crate::ingest::providers::http_client;
use crate::ingest::raw_store::{JsonDirStore, MemoryStore, RawStore};
use crate::ingest::{raw_key, sync_all, SourceReport};
use crate::normalize::workbook::read_workbook;
use crate::normalize::zillow::{normalize_dir, MetricFact};
use crate::process::fred::{observations_from_raw, observations_from_workbook};
use crate::process::{combine_observations, daily_rows, process_posts, Observation, Post};
use crate::sink::{self, Sink, TableBatch, WriteMode};

/// Raw collections plus one checkpoint store per source.
pub struct Stores<S: RawStore> {
    pub raw: Arc<S>,
    pub fred: Arc<dyn CheckpointStore>,
    pub reddit: Arc<dyn CheckpointStore>,
    pub trends: Arc<dyn CheckpointStore>,
}

impl Stores<JsonDirStore> {
    pub fn on_disk(paths: &PathsConfig) -> Self {
        let cp = |source: &str| -> Arc<dyn CheckpointStore> {
            Arc::new(JsonCheckpointStore::new(
                paths.state_dir.join(format!("{source}_checkpoints.json")),
            ))
        };
        Self {
            raw: Arc::new(JsonDirStore::new(&paths.raw_dir)),
            fred: cp("fred"),
            reddit: cp("reddit"),
            trends: cp("trends"),
        }
    }
}

impl Stores<MemoryStore> {
    pub fn in_memory() -> Self {
        Self {
            raw: Arc::new(MemoryStore::new()),
            fred: Arc::new(MemoryCheckpointStore::new()),
            reddit: Arc::new(MemoryCheckpointStore::new()),
            trends: Arc::new(MemoryCheckpointStore::new()),
        }
    }
}

/// Every unit of a source that could not even be attempted.
fn unavailable(source: &str, keys: Vec<String>, reason: &str) -> SourceReport {
    tracing::error!(target: "pipeline", source, reason, "source unavailable");
    metrics::counter!("ingest_failed_units_total").increment(keys.len() as u64);
    SourceReport {
        source: source.to_string(),
        failed_units: keys,
        ..Default::default()
    }
}

pub async fn ingest_fred<S: RawStore>(
    cfg: &PipelineConfig,
    stores: &Stores<S>,
    now: DateTime<Utc>,
) -> SourceReport {
    let keys: Vec<String> = cfg.fred.series.iter().map(|s| s.id.clone()).collect();
    let Some(api_key) = resolve_api_key(&cfg.fred.api_key, ENV_FRED_API_KEY) else {
        return unavailable("fred", keys, "FRED_API_KEY not set");
    };
    let client = match http_client(cfg.fred.timeout_secs) {
        Ok(c) => c,
        Err(e) => return unavailable("fred", keys, &format!("{e:#}")),
    };
    let tuning = cfg.fred.tuning();
    let fetcher = IncrementalFetcher::new(
        FredClient::new(client, &cfg.fred.base_url, api_key),
        tuning.limiter(),
        tuning.retry(),
        stores.raw.clone(),
        stores.fred.clone(),
        tuning.settings(cfg.incremental),
    );
    sync_all(&fetcher, &keys, now).await
}

pub async fn ingest_reddit<S: RawStore>(
    cfg: &PipelineConfig,
    stores: &Stores<S>,
    now: DateTime<Utc>,
) -> SourceReport {
    let keys: Vec<String> = cfg.reddit.subreddits.iter().map(|s| s.name.clone()).collect();
    let client = match http_client(cfg.reddit.timeout_secs) {
        Ok(c) => c,
        Err(e) => return unavailable("reddit", keys, &format!("{e:#}")),
    };
    let tuning = cfg.reddit.tuning();
    let fetcher = IncrementalFetcher::new(
        PullPushClient::new(client, &cfg.reddit.base_url, cfg.reddit.page_size),
        tuning.limiter(),
        tuning.retry(),
        stores.raw.clone(),
        stores.reddit.clone(),
        tuning.settings(cfg.incremental),
    );
    sync_all(&fetcher, &keys, now).await
}

pub async fn ingest_trends<S: RawStore>(
    cfg: &PipelineConfig,
    stores: &Stores<S>,
    now: DateTime<Utc>,
) -> SourceReport {
    let keys: Vec<String> = cfg.trends.terms.iter().map(|t| t.key.clone()).collect();
    let Some(api_key) = resolve_api_key(&cfg.trends.api_key, ENV_SERPAPI_API_KEY) else {
        return unavailable("trends", keys, "SERPAPI_API_KEY not set");
    };
    let client = match http_client(cfg.trends.timeout_secs) {
        Ok(c) => c,
        Err(e) => return unavailable("trends", keys, &format!("{e:#}")),
    };
    let queries: HashMap<String, String> = cfg
        .trends
        .terms
        .iter()
        .map(|t| (t.key.clone(), t.query.clone()))
        .collect();
    let tuning = cfg.trends.tuning();
    let fetcher = IncrementalFetcher::new(
        TrendsClient::new(client, &cfg.trends.base_url, api_key, &cfg.trends.geo, queries),
        tuning.limiter(),
        tuning.retry(),
        stores.raw.clone(),
        stores.trends.clone(),
        tuning.settings(cfg.incremental),
    );
    sync_all(&fetcher, &keys, now).await
}

/// Enabled sources in order: FRED, Reddit, Trends.
pub async fn ingest_all<S: RawStore>(
    cfg: &PipelineConfig,
    stores: &Stores<S>,
    now: DateTime<Utc>,
) -> Vec<SourceReport> {
    let mut reports = Vec::new();
    if cfg.fred.enabled {
        reports.push(ingest_fred(cfg, stores, now).await);
    }
    if cfg.reddit.enabled {
        reports.push(ingest_reddit(cfg, stores, now).await);
    }
    if cfg.trends.enabled {
        reports.push(ingest_trends(cfg, stores, now).await);
    }
    reports
}

/// Gazetteer from `paths.gazetteer_csv`, or an empty one when the file is
/// absent (explicit "City, ST" matches still work).
pub fn load_extractor(cfg: &PipelineConfig) -> Result<TextExtractor> {
    let path = &cfg.paths.gazetteer_csv;
    let gazetteer = if path.exists() {
        Gazetteer::load_csv(path, cfg.extract.min_population)?
    } else {
        tracing::warn!(target: "extract", path = %path.display(), "gazetteer not found; city fallback disabled");
        Gazetteer::empty()
    };
    Ok(TextExtractor::new(gazetteer))
}

/// Processed and derived rows of one pass.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    pub observations: Vec<Observation>,
    pub posts: Vec<Post>,
    pub trends_weekly: Vec<TrendPoint>,
    pub zillow_facts: Vec<MetricFact>,
    pub city_latest: Vec<CityLatestSnapshot>,
    pub state_aggregate: Vec<StateAggregate>,
    pub dropped_nulls: usize,
    pub removed_posts: usize,
    pub skipped_inputs: Vec<String>,
}

fn load_unit<S: RawStore, R: serde::de::DeserializeOwned>(
    raw: &S,
    source: &str,
    unit: &str,
    skipped: &mut Vec<String>,
) -> Option<Vec<R>> {
    let key = raw_key(source, unit);
    if !raw.exists(&key) {
        tracing::warn!(target: "pipeline", key = key.as_str(), "no raw collection, skipping");
        skipped.push(key);
        return None;
    }
    match raw.load(&key) {
        Ok(items) => Some(items),
        Err(e) => {
            tracing::warn!(target: "pipeline", key = key.as_str(), error = format!("{e:#}"), "unreadable raw collection, skipping");
            skipped.push(key);
            None
        }
    }
}

/// Rebuild every processed and derived table from the raw collections and
/// the bulk inputs. Only configuration errors are returned.
pub fn build_outputs<S: RawStore>(
    cfg: &PipelineConfig,
    raw: &S,
    extractor: &TextExtractor,
) -> Result<Outputs> {
    let mut out = Outputs::default();

    if cfg.fred.enabled {
        let workbook = read_workbook(&cfg.paths.fred_workbook_dir, &cfg.fred.sheets);
        out.dropped_nulls += workbook.dropped_nulls;
        out.skipped_inputs
            .extend(workbook.sheets_skipped.iter().map(|s| format!("workbook/{s}")));
        let historical = observations_from_workbook(&workbook.facts, &cfg.fred.series);

        let mut api = Vec::new();
        for spec in &cfg.fred.series {
            let Some(items) =
                load_unit::<_, RawObservation>(raw, "fred", &spec.id, &mut out.skipped_inputs)
            else {
                continue;
            };
            let (obs, dropped) = observations_from_raw(&items, spec);
            out.dropped_nulls += dropped;
            api.extend(obs);
        }
        out.observations = combine_observations(historical, api);
    }

    if cfg.reddit.enabled {
        for sub in &cfg.reddit.subreddits {
            let Some(items) =
                load_unit::<_, RawPost>(raw, "reddit", &sub.name, &mut out.skipped_inputs)
            else {
                continue;
            };
            let (posts, stats) = process_posts(&items, sub.category, extractor);
            out.removed_posts += stats.removed;
            out.posts.extend(posts);
        }
    }

    if cfg.trends.enabled {
        let mut daily = Vec::new();
        for term in &cfg.trends.terms {
            let Some(items) =
                load_unit::<_, RawInterest>(raw, "trends", &term.key, &mut out.skipped_inputs)
            else {
                continue;
            };
            daily.extend(daily_rows(&items, term, &cfg.trends.geo));
        }
        out.trends_weekly = resample_weekly(&daily);
    }

    if cfg.zillow.enabled {
        let batch = normalize_dir(&cfg.paths.zillow_dir, &cfg.zillow)
            .context("normalizing zillow exports")?;
        out.dropped_nulls += batch.dropped_nulls;
        out.skipped_inputs
            .extend(batch.files_skipped.iter().map(|f| format!("zillow/{f}")));
        out.zillow_facts = batch.facts;
        out.city_latest = build_city_latest(&out.zillow_facts);
        let policies = PolicyTable::with_overrides(&cfg.aggregate.policies);
        out.state_aggregate =
            build_state_aggregate(&out.city_latest, &cfg.aggregate.city_region_type, &policies);
    }

    Ok(out)
}

/// Replace every non-empty output table. Returns rows written per table.
pub async fn publish(sink: &dyn Sink, outputs: &Outputs) -> Result<BTreeMap<String, usize>> {
    let batches: Vec<(&str, TableBatch)> = vec![
        (sink::FRED_OBSERVATIONS, TableBatch::from_records(&outputs.observations)?),
        (sink::REDDIT_POSTS, TableBatch::from_records(&outputs.posts)?),
        (sink::TRENDS_WEEKLY, TableBatch::from_records(&outputs.trends_weekly)?),
        (sink::ZILLOW_METRICS, TableBatch::from_records(&outputs.zillow_facts)?),
        (sink::ZILLOW_CITY_LATEST, city_latest_table(&outputs.city_latest)),
        (sink::ZILLOW_STATE_AGGREGATED, state_aggregate_table(&outputs.state_aggregate)),
    ];

    let mut written = BTreeMap::new();
    for (table, batch) in batches {
        if batch.is_empty() {
            tracing::info!(target: "pipeline", table, "no rows, table left as is");
            continue;
        }
        let rows = batch.len();
        sink.write(table, batch, WriteMode::Replace)
            .await
            .with_context(|| format!("writing {table}"))?;
        written.insert(table.to_string(), rows);
    }
    Ok(written)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    /// Rows written per table.
    pub tables: BTreeMap<String, usize>,
    pub dropped_nulls: usize,
    pub removed_posts: usize,
    pub skipped_inputs: Vec<String>,
}

impl RunReport {
    pub fn failed_units(&self) -> usize {
        self.sources.iter().map(|s| s.failed_units.len()).sum()
    }

    pub fn log(&self) {
        for s in &self.sources {
            tracing::info!(
                target: "pipeline",
                source = s.source.as_str(),
                fetched = s.fetched,
                merged = s.merged,
                skipped = s.skipped,
                failed = ?s.failed_units,
                "source summary"
            );
        }
        for (table, rows) in &self.tables {
            tracing::info!(target: "pipeline", table = table.as_str(), rows, "table summary");
        }
        tracing::info!(
            target: "pipeline",
            failed_units = self.failed_units(),
            dropped_nulls = self.dropped_nulls,
            removed_posts = self.removed_posts,
            skipped_inputs = self.skipped_inputs.len(),
            "run complete"
        );
    }
}

/// Full pass: ingest, rebuild, publish.
pub async fn run<S: RawStore>(
    cfg: &PipelineConfig,
    stores: &Stores<S>,
    extractor: &TextExtractor,
    sink: &dyn Sink,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    tracing::info!(target: "pipeline", incremental = cfg.incremental, %now, "run started");
    let sources = ingest_all(cfg, stores, now).await;
    let outputs = build_outputs(cfg, stores.raw.as_ref(), extractor)?;
    let tables = publish(sink, &outputs).await?;

    let report = RunReport {
        sources,
        tables,
        dropped_nulls: outputs.dropped_nulls,
        removed_posts: outputs.removed_posts,
        skipped_inputs: outputs.skipped_inputs,
    };
    report.log();
    Ok(report)
}
