// src/ingest/providers/trends.rs
//! Search-interest time series through SerpApi's Google Trends engine.
//! One request per term; daily resolution for windows up to ~9 months.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::ingest::providers::{de_epoch, get_json};
use crate::ingest::types::{CursorKind, FetchWindow, RawRecord, Upstream, Watermark};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInterest {
    pub term_key: String,
    pub date: NaiveDate,
    pub interest_score: Option<i64>,
}

impl RawRecord for RawInterest {
    type Key = (String, NaiveDate);

    fn natural_key(&self) -> Self::Key {
        (self.term_key.clone(), self.date)
    }

    fn stamp(&self) -> Watermark {
        Watermark::Date(self.date)
    }
}

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    interest_over_time: Option<InterestOverTime>,
}

#[derive(Debug, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    #[serde(deserialize_with = "de_epoch")]
    timestamp: i64,
    #[serde(default)]
    values: Vec<PointValue>,
}

#[derive(Debug, Deserialize)]
struct PointValue {
    #[serde(default)]
    extracted_value: Option<i64>,
}

pub struct TrendsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    geo: String,
    /// term key -> query (search text or topic id)
    queries: HashMap<String, String>,
}

impl TrendsClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        geo: impl Into<String>,
        queries: HashMap<String, String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            geo: geo.into(),
            queries,
        }
    }
}

fn points_from(term_key: &str, body: TrendsResponse) -> Result<Vec<RawInterest>, FetchError> {
    if let Some(err) = body.error {
        // "hasn't returned any results" is an empty series, not a failure
        if err.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(FetchError::Permanent(err));
    }
    let Some(iot) = body.interest_over_time else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(iot.timeline_data.len());
    for p in iot.timeline_data {
        let Some(dt) = DateTime::from_timestamp(p.timestamp, 0) else {
            continue;
        };
        out.push(RawInterest {
            term_key: term_key.to_string(),
            date: dt.date_naive(),
            interest_score: p.values.first().and_then(|v| v.extracted_value),
        });
    }
    Ok(out)
}

#[async_trait]
impl Upstream for TrendsClient {
    type Record = RawInterest;

    fn name(&self) -> &'static str {
        "trends"
    }

    fn cursor_kind(&self) -> CursorKind {
        CursorKind::Date
    }

    async fn fetch_page(
        &self,
        term_key: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawInterest>, FetchError> {
        let Some(query) = self.queries.get(term_key) else {
            return Err(FetchError::Permanent(format!("unknown trends term {term_key}")));
        };
        let (Some(start), Some(end)) = (window.start.as_date(), window.end.as_date()) else {
            return Err(FetchError::Permanent("trends expects a date window".into()));
        };
        let timeframe = format!("{} {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"));
        let req = self.client.get(&self.base_url).query(&[
            ("engine", "google_trends"),
            ("data_type", "TIMESERIES"),
            ("q", query.as_str()),
            ("date", timeframe.as_str()),
            ("geo", self.geo.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        let body: TrendsResponse = get_json(req).await?;
        let points = points_from(term_key, body)?;
        tracing::info!(target: "ingest", source = "trends", term_key, %timeframe, count = points.len(), "retrieved interest");
        Ok(points)
    }
}
