// src/ingest/types.rs
use std::hash::Hash;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::FetchError;

/// Granularity of a source's cursor: calendar days or unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Date,
    Timestamp,
}

/// Last successfully ingested point of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Watermark {
    Date(NaiveDate),
    Timestamp(i64),
}

impl Watermark {
    /// One unit (day / second) after this watermark.
    pub fn next(self) -> Self {
        match self {
            Watermark::Date(d) => Watermark::Date(d + Duration::days(1)),
            Watermark::Timestamp(ts) => Watermark::Timestamp(ts + 1),
        }
    }

    /// `now` expressed in the given cursor granularity.
    pub fn at(kind: CursorKind, now: DateTime<Utc>) -> Self {
        match kind {
            CursorKind::Date => Watermark::Date(now.date_naive()),
            CursorKind::Timestamp => Watermark::Timestamp(now.timestamp()),
        }
    }

    /// Start of the default lookback window ending at `now`.
    pub fn lookback(kind: CursorKind, now: DateTime<Utc>, days: i64) -> Self {
        Self::at(kind, now - Duration::days(days))
    }

    pub fn as_date(self) -> Option<NaiveDate> {
        match self {
            Watermark::Date(d) => Some(d),
            Watermark::Timestamp(ts) => DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()),
        }
    }

    pub fn as_timestamp(self) -> i64 {
        match self {
            Watermark::Timestamp(ts) => ts,
            Watermark::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watermark::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Watermark::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

/// A record persisted in a raw collection.
pub trait RawRecord: Clone + Serialize + DeserializeOwned + Send + Sync {
    type Key: Eq + Hash + Clone;

    /// Identity of the record within its collection.
    fn natural_key(&self) -> Self::Key;

    /// Timestamp used for ordering and as the checkpoint watermark.
    fn stamp(&self) -> Watermark;

    /// `false` for records carrying the upstream "missing value" marker.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Request window plus page size for cursor sources.
///
/// Date cursors are inclusive on both ends (`[start, end]`); timestamp
/// cursors are half-open (`[start, end)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: Watermark,
    pub end: Watermark,
    pub page_size: usize,
}

/// One external source type. Implementations perform a single request and
/// never sleep or retry; pacing is the fetcher's job.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    type Record: RawRecord;

    fn name(&self) -> &'static str;

    fn cursor_kind(&self) -> CursorKind;

    /// `Some(n)` for cursor-paginated sources, `None` for single-shot ones.
    fn page_size(&self) -> Option<usize> {
        None
    }

    async fn fetch_page(
        &self,
        key: &str,
        window: &FetchWindow,
    ) -> Result<Vec<Self::Record>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_advances_one_unit() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert_eq!(
            Watermark::Date(d).next(),
            Watermark::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(Watermark::Timestamp(99).next(), Watermark::Timestamp(100));
    }

    #[test]
    fn serde_shape_is_tagged() {
        let wm = Watermark::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let s = serde_json::to_string(&wm).unwrap();
        assert_eq!(s, r#"{"date":"2024-01-05"}"#);
        let back: Watermark = serde_json::from_str(&s).unwrap();
        assert_eq!(back, wm);
    }
}
