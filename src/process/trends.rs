// src/process/trends.rs
//! Raw interest points -> daily rows labelled from the term catalogue.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::TrendTermSpec;
use crate::ingest::providers::trends::RawInterest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInterest {
    pub date: NaiveDate,
    pub search_term: String,
    pub category: String,
    pub interest_score: i64,
    pub region: String,
}

/// Daily rows for one term, sorted by date. A missing score counts as 0.
pub fn daily_rows(raw: &[RawInterest], term: &TrendTermSpec, geo: &str) -> Vec<DailyInterest> {
    let mut out: Vec<DailyInterest> = raw
        .iter()
        .map(|r| DailyInterest {
            date: r.date,
            search_term: term.display_name.clone(),
            category: term.category.clone(),
            interest_score: r.interest_score.unwrap_or(0).clamp(0, 100),
            region: geo.to_string(),
        })
        .collect();
    out.sort_by_key(|r| r.date);
    if let (Some(first), Some(last)) = (out.first(), out.last()) {
        tracing::debug!(
            target: "normalize",
            term = term.key.as_str(),
            rows = out.len(),
            from = %first.date,
            to = %last.date,
            "daily interest"
        );
    }
    out
}
