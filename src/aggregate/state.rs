// src/aggregate/state.rs
//! State rollup of the city-latest snapshot.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::city::{metric_columns, CityLatestSnapshot};
use crate::aggregate::PolicyTable;
use crate::sink::TableBatch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateAggregate {
    pub state_name: String,
    pub metrics: BTreeMap<String, f64>,
    pub latest_date: NaiveDate,
    pub city_count: usize,
}

/// Group `region_type` rows by state and reduce each metric with its policy.
///
/// The metric set is every metric present anywhere in the snapshot; a city
/// lacking one contributes 0 to it, so means include those cities.
pub fn build_state_aggregate(
    cities: &[CityLatestSnapshot],
    region_type: &str,
    policies: &PolicyTable,
) -> Vec<StateAggregate> {
    let metrics = metric_columns(cities.iter().map(|c| &c.metrics));

    let mut by_state: BTreeMap<&str, Vec<&CityLatestSnapshot>> = BTreeMap::new();
    for c in cities
        .iter()
        .filter(|c| c.region_type.eq_ignore_ascii_case(region_type))
    {
        by_state.entry(c.state_name.as_str()).or_default().push(c);
    }

    let out: Vec<StateAggregate> = by_state
        .into_iter()
        .filter_map(|(state, group)| {
            let latest_date = group.iter().map(|c| c.latest_date).max()?;
            let reduced = metrics
                .iter()
                .map(|m| {
                    let values: Vec<f64> = group
                        .iter()
                        .map(|c| c.metrics.get(m).copied().unwrap_or(0.0))
                        .collect();
                    (m.clone(), policies.policy_for(m).apply(&values))
                })
                .collect();
            Some(StateAggregate {
                state_name: state.to_string(),
                metrics: reduced,
                latest_date,
                city_count: group.len(),
            })
        })
        .collect();

    tracing::info!(target: "aggregate", states = out.len(), metrics = metrics.len(), "built state aggregate");
    out
}

pub fn state_aggregate_table(rows: &[StateAggregate]) -> TableBatch {
    let metrics = metric_columns(rows.iter().map(|r| &r.metrics));
    let mut columns = vec!["state_name".to_string()];
    columns.extend(metrics.iter().cloned());
    columns.push("latest_date".to_string());
    columns.push("city_count".to_string());

    let mut batch = TableBatch::new(columns);
    for r in rows {
        let mut row = vec![Value::from(r.state_name.as_str())];
        row.extend(
            metrics
                .iter()
                .map(|m| r.metrics.get(m).map_or(Value::Null, |v| Value::from(*v))),
        );
        row.push(Value::from(r.latest_date.format("%Y-%m-%d").to_string()));
        row.push(Value::from(r.city_count as u64));
        batch.push_row(row);
    }
    batch
}
