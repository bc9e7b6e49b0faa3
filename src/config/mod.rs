// src/config/mod.rs
//! Pipeline configuration.
//!
//! Resolution order:
//! 1) `$PIPELINE_CONFIG_PATH` (must exist)
//! 2) `config/pipeline.toml`
//! 3) built-in defaults
//!
//! Every table is optional in the file; missing keys keep their defaults.

pub mod sources;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationPolicy;
use crate::error::PipelineError;
use crate::extract::gazetteer::DEFAULT_MIN_POPULATION;
use crate::ingest::fetcher::FetchSettings;
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::retry::RetryPolicy;

pub use crate::config::sources::{
    FredConfig, RedditConfig, SeriesSpec, SheetSpec, SubredditCategory, SubredditSpec,
    TrendTermSpec, TrendsConfig, ZillowConfig, ENV_PLACEHOLDER,
};

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_FULL_REFRESH: &str = "PIPELINE_FULL_REFRESH";
pub const ENV_FRED_API_KEY: &str = "FRED_API_KEY";
pub const ENV_SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resume from checkpoints; `false` re-fetches every default window.
    pub incremental: bool,
    pub paths: PathsConfig,
    pub extract: ExtractConfig,
    pub fred: FredConfig,
    pub reddit: RedditConfig,
    pub trends: TrendsConfig,
    pub zillow: ZillowConfig,
    pub aggregate: AggregateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            paths: PathsConfig::default(),
            extract: ExtractConfig::default(),
            fred: FredConfig::default(),
            reddit: RedditConfig::default(),
            trends: TrendsConfig::default(),
            zillow: ZillowConfig::default(),
            aggregate: AggregateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw collections, one JSON array per unit.
    pub raw_dir: PathBuf,
    /// Checkpoint files.
    pub state_dir: PathBuf,
    /// Where `CsvDirSink` writes the output tables.
    pub output_dir: PathBuf,
    pub zillow_dir: PathBuf,
    /// One CSV per workbook sheet, named `<sheet>.csv`.
    pub fred_workbook_dir: PathBuf,
    pub gazetteer_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".into(),
            state_dir: "data/state".into(),
            output_dir: "data/processed".into(),
            zillow_dir: "data/zillow_raw".into(),
            fred_workbook_dir: "data/historic_fred".into(),
            gazetteer_csv: "data/uscities.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub min_population: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_population: DEFAULT_MIN_POPULATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Region type rolled up into the state table.
    pub city_region_type: String,
    /// Per-metric overrides of the built-in policy table.
    pub policies: BTreeMap<String, AggregationPolicy>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            city_region_type: "msa".into(),
            policies: BTreeMap::new(),
        }
    }
}

/// Rate limit, retry and window knobs shared by every fetched source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTuning {
    pub min_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_factor: u64,
    pub lookback_days: i64,
    pub full_lookback_days: i64,
}

impl FetchTuning {
    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::from_millis(self.min_delay_ms)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_factor)
    }

    /// A full refresh (`incremental == false`) uses the wider window.
    pub fn settings(&self, incremental: bool) -> FetchSettings {
        FetchSettings {
            incremental,
            lookback_days: if incremental {
                self.lookback_days
            } else {
                self.full_lookback_days
            },
        }
    }
}

impl FredConfig {
    pub fn tuning(&self) -> FetchTuning {
        FetchTuning {
            min_delay_ms: self.min_delay_ms,
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            lookback_days: self.lookback_days,
            full_lookback_days: self.full_lookback_days,
        }
    }
}

impl RedditConfig {
    pub fn tuning(&self) -> FetchTuning {
        FetchTuning {
            min_delay_ms: self.min_delay_ms,
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            lookback_days: self.lookback_days,
            full_lookback_days: self.full_lookback_days,
        }
    }
}

impl TrendsConfig {
    pub fn tuning(&self) -> FetchTuning {
        FetchTuning {
            min_delay_ms: self.min_delay_ms,
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            lookback_days: self.lookback_days,
            full_lookback_days: self.full_lookback_days,
        }
    }
}

/// `"ENV"` (or an empty value) reads `env_var`; anything else is the key.
pub fn resolve_api_key(configured: &str, env_var: &str) -> Option<String> {
    let configured = configured.trim();
    if configured.is_empty() || configured == ENV_PLACEHOLDER {
        return std::env::var(env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    Some(configured.to_string())
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: PipelineConfig = toml::from_str(s).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load using the env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        let full_refresh = std::env::var(ENV_FULL_REFRESH)
            .ok()
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        if full_refresh {
            self.incremental = false;
        }
    }

    /// Reject tables the run cannot work with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn unique<'a>(what: &str, keys: impl Iterator<Item = &'a str>) -> Result<(), PipelineError> {
            let mut seen = HashSet::new();
            for k in keys {
                if k.trim().is_empty() {
                    return Err(PipelineError::Config(format!("empty {what}")));
                }
                if !seen.insert(k) {
                    return Err(PipelineError::Config(format!("duplicate {what} {k}")));
                }
            }
            Ok(())
        }

        unique("series id", self.fred.series.iter().map(|s| s.id.as_str()))?;
        unique("sheet", self.fred.sheets.iter().map(|s| s.sheet.as_str()))?;
        unique(
            "subreddit",
            self.reddit.subreddits.iter().map(|s| s.name.as_str()),
        )?;
        unique("trend term", self.trends.terms.iter().map(|t| t.key.as_str()))?;

        if let Some((file, _)) = self
            .zillow
            .metric_files
            .iter()
            .find(|(_, metric)| metric.trim().is_empty())
        {
            return Err(PipelineError::Config(format!(
                "no metric type mapped for {file}"
            )));
        }
        if self.reddit.page_size == 0 {
            return Err(PipelineError::Config("reddit.page_size must be > 0".into()));
        }
        for (source, days, full) in [
            ("fred", self.fred.lookback_days, self.fred.full_lookback_days),
            ("reddit", self.reddit.lookback_days, self.reddit.full_lookback_days),
            ("trends", self.trends.lookback_days, self.trends.full_lookback_days),
        ] {
            if days < 1 || full < 1 {
                return Err(PipelineError::Config(format!(
                    "{source} lookback windows must be >= 1 day"
                )));
            }
        }
        Ok(())
    }
}
