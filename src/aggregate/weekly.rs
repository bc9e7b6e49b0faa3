// src/aggregate/weekly.rs
//! Daily search interest -> weekly averages.
//!
//! Weeks run Monday..Sunday and are labelled by the Sunday before the Monday,
//! so a Sunday belongs to the week labelled seven days earlier.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::process::trends::DailyInterest;

/// Natural key: `(week_start_date, search_term, region)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub week_start_date: NaiveDate,
    pub search_term: String,
    pub category: String,
    /// Rounded half to even, within 0..=100.
    pub avg_interest_score: i64,
    pub region: String,
}

/// Label of the week containing `d`.
pub fn week_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(i64::from(d.weekday().num_days_from_monday()) + 1)
}

struct Bucket<'a> {
    first: &'a DailyInterest,
    sum: i64,
    n: i64,
}

/// Average each term's daily scores per week. Weeks with no data are not
/// emitted. Output is sorted by `(week_start_date, search_term, region)`.
pub fn resample_weekly(daily: &[DailyInterest]) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<(NaiveDate, &str, &str), Bucket<'_>> = BTreeMap::new();
    let mut ordered: Vec<&DailyInterest> = daily.iter().collect();
    ordered.sort_by_key(|r| r.date);

    for r in ordered {
        let key = (week_start(r.date), r.search_term.as_str(), r.region.as_str());
        let b = buckets.entry(key).or_insert(Bucket {
            first: r,
            sum: 0,
            n: 0,
        });
        b.sum += r.interest_score;
        b.n += 1;
    }

    let out: Vec<TrendPoint> = buckets
        .into_iter()
        .map(|((week, term, region), b)| {
            let mean = b.sum as f64 / b.n as f64;
            TrendPoint {
                week_start_date: week,
                search_term: term.to_string(),
                category: b.first.category.clone(),
                avg_interest_score: (mean.round_ties_even() as i64).clamp(0, 100),
                region: region.to_string(),
            }
        })
        .collect();

    tracing::info!(target: "aggregate", daily = daily.len(), weekly = out.len(), "resampled interest");
    out
}
