// src/process/fred.rs
//! FRED observations from the API collections and the historical workbook.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SeriesSpec;
use crate::ingest::merge_by_key;
use crate::ingest::providers::fred::RawObservation;
use crate::ingest::types::{RawRecord, Watermark};
use crate::normalize::workbook::SheetFact;

/// Natural key: `(series_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub series_id: String,
    pub series_name: String,
    pub date: NaiveDate,
    pub value: f64,
    pub frequency: String,
    pub units: String,
}

impl RawRecord for Observation {
    type Key = (String, NaiveDate);

    fn natural_key(&self) -> Self::Key {
        (self.series_id.clone(), self.date)
    }

    fn stamp(&self) -> Watermark {
        Watermark::Date(self.date)
    }
}

/// API observations for one series; missing values are dropped and counted.
pub fn observations_from_raw(raw: &[RawObservation], spec: &SeriesSpec) -> (Vec<Observation>, usize) {
    let mut dropped = 0usize;
    let out = raw
        .iter()
        .filter_map(|r| {
            let Some(value) = r.numeric_value() else {
                dropped += 1;
                return None;
            };
            Some(Observation {
                series_id: r.series_id.clone(),
                series_name: spec.name.clone(),
                date: r.date,
                value,
                frequency: spec.frequency.clone(),
                units: spec.units.clone(),
            })
        })
        .collect();
    (out, dropped)
}

/// Workbook rows, labelled from the catalogue when the series is known.
pub fn observations_from_workbook(facts: &[SheetFact], catalogue: &[SeriesSpec]) -> Vec<Observation> {
    facts
        .iter()
        .map(|f| {
            let spec = catalogue.iter().find(|s| s.id == f.series_id);
            Observation {
                series_id: f.series_id.clone(),
                series_name: spec.map_or_else(|| f.series_id.clone(), |s| s.name.clone()),
                date: f.date,
                value: f.value,
                frequency: f.frequency.clone(),
                units: spec.map_or_else(|| "unknown".to_string(), |s| s.units.clone()),
            }
        })
        .collect()
}

/// Workbook history first, then API rows; the first row per key wins.
/// Sorted by `(date, series_id)`.
pub fn combine_observations(historical: Vec<Observation>, api: Vec<Observation>) -> Vec<Observation> {
    let (mut merged, duplicates) = merge_by_key(historical, api);
    merged.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.series_id.cmp(&b.series_id)));
    tracing::info!(target: "normalize", rows = merged.len(), duplicates, "combined fred observations");
    merged
}
