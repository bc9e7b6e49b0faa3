// src/aggregate/mod.rs
//! Derived tables: city-latest snapshot, state rollup and weekly interest.
//!
//! How each metric is reduced at state level is data, not code: the
//! [`PolicyTable`] maps metric types to an [`AggregationPolicy`] and falls
//! back to `Mean` for anything unlisted.

pub mod city;
pub mod state;
pub mod weekly;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::aggregate::city::{build_city_latest, CityLatestSnapshot};
pub use crate::aggregate::state::{build_state_aggregate, StateAggregate};
pub use crate::aggregate::weekly::{resample_weekly, week_start, TrendPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    Sum,
    Mean,
    Max,
    Count,
}

impl AggregationPolicy {
    /// Reduce `values`; an empty slice reduces to 0.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            AggregationPolicy::Sum => values.iter().sum(),
            AggregationPolicy::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AggregationPolicy::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationPolicy::Count => values.len() as f64,
        }
    }
}

/// Flow and count metrics add up across cities; everything else averages.
const SUMMED_METRICS: [&str; 4] = [
    "active_listings",
    "new_listings",
    "sales_count",
    "new_construction_sales_count",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    by_metric: BTreeMap<String, AggregationPolicy>,
    fallback: AggregationPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            by_metric: SUMMED_METRICS
                .iter()
                .map(|m| (m.to_string(), AggregationPolicy::Sum))
                .collect(),
            fallback: AggregationPolicy::Mean,
        }
    }
}

impl PolicyTable {
    /// Built-in table with `overrides` layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, AggregationPolicy>) -> Self {
        let mut t = Self::default();
        for (metric, policy) in overrides {
            t.by_metric.insert(metric.clone(), *policy);
        }
        t
    }

    pub fn policy_for(&self, metric_type: &str) -> AggregationPolicy {
        self.by_metric
            .get(metric_type)
            .copied()
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_policies() {
        let t = PolicyTable::default();
        assert_eq!(t.policy_for("sales_count"), AggregationPolicy::Sum);
        assert_eq!(t.policy_for("zhvi"), AggregationPolicy::Mean);
        assert_eq!(t.policy_for("brand_new_metric"), AggregationPolicy::Mean);
    }

    #[test]
    fn overrides_replace_entries() {
        let mut o = BTreeMap::new();
        o.insert("zhvi".to_string(), AggregationPolicy::Max);
        o.insert("sales_count".to_string(), AggregationPolicy::Mean);
        let t = PolicyTable::with_overrides(&o);
        assert_eq!(t.policy_for("zhvi"), AggregationPolicy::Max);
        assert_eq!(t.policy_for("sales_count"), AggregationPolicy::Mean);
        assert_eq!(t.policy_for("new_listings"), AggregationPolicy::Sum);
    }

    #[test]
    fn reductions() {
        let v = [10.0, 20.0, 30.0];
        assert_eq!(AggregationPolicy::Sum.apply(&v), 60.0);
        assert_eq!(AggregationPolicy::Mean.apply(&v), 20.0);
        assert_eq!(AggregationPolicy::Max.apply(&v), 30.0);
        assert_eq!(AggregationPolicy::Count.apply(&v), 3.0);
        assert_eq!(AggregationPolicy::Mean.apply(&[]), 0.0);
    }
}
