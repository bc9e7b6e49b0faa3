// src/aggregate/city.rs
//! Most recent value per metric per city, pivoted wide.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::normalize::zillow::MetricFact;
use crate::sink::TableBatch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityLatestSnapshot {
    pub region_name: String,
    pub state_name: String,
    pub region_type: String,
    /// metric type -> latest value
    pub metrics: BTreeMap<String, f64>,
    /// Newest date across all of this city's metrics.
    pub latest_date: NaiveDate,
}

type CityKey = (String, String, String);

/// One snapshot per `(region_name, state_name, region_type)`, sorted by that
/// key. Facts without a state are not city rows and are left out. Among facts
/// with the same date the later one in `facts` wins.
pub fn build_city_latest(facts: &[MetricFact]) -> Vec<CityLatestSnapshot> {
    let mut latest: BTreeMap<CityKey, BTreeMap<String, (NaiveDate, f64)>> = BTreeMap::new();
    let mut stateless = 0usize;

    for f in facts {
        let Some(state) = &f.state_name else {
            stateless += 1;
            continue;
        };
        let key = (f.region_name.clone(), state.clone(), f.region_type.clone());
        let metrics = latest.entry(key).or_default();
        match metrics.get_mut(&f.metric_type) {
            Some(slot) if slot.0 > f.date => {}
            Some(slot) => *slot = (f.date, f.value),
            None => {
                metrics.insert(f.metric_type.clone(), (f.date, f.value));
            }
        }
    }

    let out: Vec<CityLatestSnapshot> = latest
        .into_iter()
        .filter_map(|((region_name, state_name, region_type), metrics)| {
            let latest_date = metrics.values().map(|(d, _)| *d).max()?;
            Some(CityLatestSnapshot {
                region_name,
                state_name,
                region_type,
                metrics: metrics.into_iter().map(|(m, (_, v))| (m, v)).collect(),
                latest_date,
            })
        })
        .collect();

    tracing::info!(target: "aggregate", cities = out.len(), stateless, "built city-latest snapshot");
    out
}

/// Every metric column present on any snapshot, sorted.
pub fn metric_columns<'a, I>(metric_maps: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a BTreeMap<String, f64>>,
{
    let set: BTreeSet<&String> = metric_maps.into_iter().flat_map(|m| m.keys()).collect();
    set.into_iter().cloned().collect()
}

/// Wide table: identity columns, one column per metric, then `latest_date`.
/// A metric the city lacks is an empty cell.
pub fn city_latest_table(rows: &[CityLatestSnapshot]) -> TableBatch {
    let metrics = metric_columns(rows.iter().map(|r| &r.metrics));
    let mut columns = vec![
        "region_name".to_string(),
        "state_name".to_string(),
        "region_type".to_string(),
    ];
    columns.extend(metrics.iter().cloned());
    columns.push("latest_date".to_string());

    let mut batch = TableBatch::new(columns);
    for r in rows {
        let mut row = vec![
            Value::from(r.region_name.as_str()),
            Value::from(r.state_name.as_str()),
            Value::from(r.region_type.as_str()),
        ];
        row.extend(
            metrics
                .iter()
                .map(|m| r.metrics.get(m).map_or(Value::Null, |v| Value::from(*v))),
        );
        row.push(Value::from(r.latest_date.format("%Y-%m-%d").to_string()));
        batch.push_row(row);
    }
    batch
}
