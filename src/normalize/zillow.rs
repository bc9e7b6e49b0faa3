// src/normalize/zillow.rs
//! Zillow regional exports: one wide CSV per metric, dates as columns.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ZillowConfig;
use crate::error::PipelineError;
use crate::normalize::{melt, parse_date, WideTable};

/// One (region, metric, month) value. Natural key: `(region_id, metric_type, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFact {
    pub region_id: String,
    pub region_name: String,
    pub region_type: String,
    pub state_name: Option<String>,
    pub metric_type: String,
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZillowBatch {
    pub facts: Vec<MetricFact>,
    pub dropped_nulls: usize,
    pub files_read: Vec<String>,
    pub files_skipped: Vec<String>,
}

/// Metric type for an export file. An unmapped file means the mapping table
/// is out of date, so this is a configuration error.
pub fn metric_type_for<'a>(
    mapping: &'a BTreeMap<String, String>,
    file_name: &str,
) -> Result<&'a str, PipelineError> {
    mapping
        .get(file_name)
        .map(String::as_str)
        .ok_or_else(|| PipelineError::Config(format!("unknown file: {file_name}")))
}

/// Melt one export into facts tagged with `metric_type`.
pub fn normalize_table(
    table: &WideTable,
    metric_type: &str,
    id_columns: &[String],
) -> Result<(Vec<MetricFact>, usize), PipelineError> {
    let id_set: Vec<String> = id_columns
        .iter()
        .map(|c| super::canonical_column(c))
        .collect();
    for required in ["region_id", "region_name", "region_type"] {
        if !id_set.iter().any(|c| c == required) {
            return Err(PipelineError::Config(format!(
                "zillow id_columns lack {required}"
            )));
        }
    }
    for h in &table.headers {
        if id_set.contains(&super::canonical_column(h)) {
            continue;
        }
        if parse_date(h).is_none() {
            return Err(PipelineError::Malformed(format!(
                "column {h:?} is neither an identity column nor a date"
            )));
        }
    }

    let melted = melt(table, id_columns)?;

    let mut facts = Vec::with_capacity(melted.rows.len());
    for row in &melted.rows {
        let Some(date) = parse_date(&row.variable) else {
            continue;
        };
        let id = |c: &str| melted.id(row, c).unwrap_or_default().to_string();
        let state = id("state_name");
        facts.push(MetricFact {
            region_id: id("region_id"),
            region_name: id("region_name"),
            region_type: id("region_type"),
            state_name: (!state.trim().is_empty()).then_some(state),
            metric_type: metric_type.to_string(),
            date,
            value: row.value,
        });
    }
    Ok((facts, melted.dropped_nulls))
}

/// Normalize one export file; its name selects the metric type.
pub fn normalize_file(
    path: &Path,
    cfg: &ZillowConfig,
) -> Result<(Vec<MetricFact>, usize), PipelineError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let metric_type = metric_type_for(&cfg.metric_files, file_name)?;
    let table = WideTable::from_path(path)?;
    let (facts, dropped) = normalize_table(&table, metric_type, &cfg.id_columns)?;
    tracing::info!(
        target: "normalize",
        file = file_name,
        metric_type,
        regions = table.rows.len(),
        rows = facts.len(),
        dropped,
        "normalized export"
    );
    Ok((facts, dropped))
}

/// Normalize every mapped export under `dir`. Missing or malformed files are
/// skipped with a warning; configuration errors abort.
pub fn normalize_dir(dir: &Path, cfg: &ZillowConfig) -> Result<ZillowBatch, PipelineError> {
    let mut batch = ZillowBatch::default();
    for file_name in cfg.metric_files.keys() {
        let path = dir.join(file_name);
        if !path.exists() {
            tracing::warn!(target: "normalize", file = file_name.as_str(), "export not found, skipping");
            batch.files_skipped.push(file_name.clone());
            continue;
        }
        match normalize_file(&path, cfg) {
            Ok((facts, dropped)) => {
                batch.facts.extend(facts);
                batch.dropped_nulls += dropped;
                batch.files_read.push(file_name.clone());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(target: "normalize", file = file_name.as_str(), error = %e, "skipping export");
                batch.files_skipped.push(file_name.clone());
            }
        }
    }
    tracing::info!(
        target: "normalize",
        files = batch.files_read.len(),
        skipped = batch.files_skipped.len(),
        rows = batch.facts.len(),
        dropped_nulls = batch.dropped_nulls,
        "zillow exports normalized"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
RegionID,SizeRank,RegionName,RegionType,StateName,2024-01-31,2024-02-29
102001,0,United States,country,,350000,351000
394913,1,\"New York, NY\",msa,NY,650000,
";

    #[test]
    fn export_melts_into_facts() {
        let table = WideTable::from_reader(EXPORT.as_bytes()).unwrap();
        let cfg = ZillowConfig::default();
        let (facts, dropped) = normalize_table(&table, "zhvi", &cfg.id_columns).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].state_name, None);
        let ny = &facts[2];
        assert_eq!(ny.region_name, "New York, NY");
        assert_eq!(ny.state_name.as_deref(), Some("NY"));
        assert_eq!(ny.metric_type, "zhvi");
        assert_eq!(ny.date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn unknown_file_is_fatal() {
        let cfg = ZillowConfig::default();
        let err = metric_type_for(&cfg.metric_files, "mystery.csv").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn non_date_value_column_is_malformed() {
        let table =
            WideTable::from_reader("RegionID,RegionName,RegionType,StateName,Notes\n1,A,msa,TX,x\n".as_bytes())
                .unwrap();
        let cfg = ZillowConfig::default();
        let err = normalize_table(&table, "zhvi", &cfg.id_columns).unwrap_err();
        assert!(matches!(err, PipelineError::Malformed(_)));
    }

    #[test]
    fn missing_exports_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zhvi_home_value.csv"), EXPORT).unwrap();
        let batch = normalize_dir(dir.path(), &ZillowConfig::default()).unwrap();
        assert_eq!(batch.files_read, vec!["zhvi_home_value.csv".to_string()]);
        assert_eq!(batch.files_skipped.len(), 8);
        assert_eq!(batch.facts.len(), 3);
    }
}
