// src/ingest/providers/fred.rs
//! FRED `series/observations` client. One request per series.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::ingest::providers::get_json;
use crate::ingest::types::{CursorKind, FetchWindow, RawRecord, Upstream, Watermark};

/// Marker FRED uses for a missing observation.
pub const MISSING_VALUE: &str = ".";

/// Raw observation as persisted: the value stays a string so the missing
/// marker survives the round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub series_id: String,
    pub date: NaiveDate,
    pub value: String,
}

impl RawObservation {
    pub fn numeric_value(&self) -> Option<f64> {
        if self.value == MISSING_VALUE {
            return None;
        }
        self.value.trim().parse().ok()
    }
}

impl RawRecord for RawObservation {
    type Key = (String, NaiveDate);

    fn natural_key(&self) -> Self::Key {
        (self.series_id.clone(), self.date)
    }

    fn stamp(&self) -> Watermark {
        Watermark::Date(self.date)
    }

    fn is_valid(&self) -> bool {
        self.value != MISSING_VALUE
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<WireObservation>,
}

#[derive(Debug, Deserialize)]
struct WireObservation {
    date: NaiveDate,
    value: String,
}

pub struct FredClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FredClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Upstream for FredClient {
    type Record = RawObservation;

    fn name(&self) -> &'static str {
        "fred"
    }

    fn cursor_kind(&self) -> CursorKind {
        CursorKind::Date
    }

    async fn fetch_page(
        &self,
        series_id: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawObservation>, FetchError> {
        let (Some(start), Some(end)) = (window.start.as_date(), window.end.as_date()) else {
            return Err(FetchError::Permanent("fred expects a date window".into()));
        };
        let url = format!("{}/series/observations", self.base_url);
        let req = self.client.get(url).query(&[
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("observation_start", start.format("%Y-%m-%d").to_string()),
            ("observation_end", end.format("%Y-%m-%d").to_string()),
        ]);
        let body: ObservationsResponse = get_json(req).await?;

        tracing::info!(
            target: "ingest",
            source = "fred",
            series_id,
            count = body.observations.len(),
            "retrieved observations"
        );
        Ok(body
            .observations
            .into_iter()
            .map(|o| RawObservation {
                series_id: series_id.to_string(),
                date: o.date,
                value: o.value,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_marker_is_invalid() {
        let o = RawObservation {
            series_id: "GDPC1".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value: ".".into(),
        };
        assert!(!o.is_valid());
        assert_eq!(o.numeric_value(), None);
    }

    #[test]
    fn wire_shape_parses() {
        let body = r#"{"realtime_start":"2024-01-01","observations":[
            {"realtime_start":"2024-01-01","realtime_end":"2024-01-01","date":"2024-01-04","value":"6.62"}
        ]}"#;
        let r: ObservationsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(r.observations.len(), 1);
        assert_eq!(r.observations[0].value, "6.62");
    }
}
