// src/normalize/workbook.rs
//! Historical FRED workbook, exported as one CSV per frequency sheet
//! (`<sheet>.csv`): an `observation_date` column plus one column per series.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SheetSpec;
use crate::error::PipelineError;
use crate::normalize::{melt, parse_date, WideTable};

const DATE_COLUMN: &str = "observation_date";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetFact {
    pub series_id: String,
    pub date: NaiveDate,
    pub value: f64,
    pub frequency: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookBatch {
    pub facts: Vec<SheetFact>,
    pub dropped_nulls: usize,
    pub sheets_read: Vec<String>,
    pub sheets_skipped: Vec<String>,
}

/// Melt one sheet, tagging every row with `frequency`.
pub fn normalize_sheet(
    table: &WideTable,
    frequency: &str,
) -> Result<(Vec<SheetFact>, usize), PipelineError> {
    let melted = melt(table, &[DATE_COLUMN.to_string()])?;
    let mut facts = Vec::with_capacity(melted.rows.len());
    for row in &melted.rows {
        let raw_date = melted.id(row, DATE_COLUMN).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            PipelineError::Malformed(format!("unparsable {DATE_COLUMN} {raw_date:?}"))
        })?;
        facts.push(SheetFact {
            series_id: row.variable.trim().to_string(),
            date,
            value: row.value,
            frequency: frequency.to_string(),
        });
    }
    Ok((facts, melted.dropped_nulls))
}

/// Read every configured sheet under `dir`. A missing or malformed sheet is
/// skipped with a warning; the others still load.
pub fn read_workbook(dir: &Path, sheets: &[SheetSpec]) -> WorkbookBatch {
    let mut batch = WorkbookBatch::default();
    for spec in sheets {
        let path = dir.join(format!("{}.csv", spec.sheet));
        let result = WideTable::from_path(&path).and_then(|t| {
            if t.headers.len() < 2 {
                tracing::warn!(target: "normalize", sheet = spec.sheet.as_str(), "no series columns");
            }
            normalize_sheet(&t, &spec.frequency)
        });
        match result {
            Ok((facts, dropped)) => {
                tracing::info!(
                    target: "normalize",
                    sheet = spec.sheet.as_str(),
                    frequency = spec.frequency.as_str(),
                    rows = facts.len(),
                    dropped,
                    "melted workbook sheet"
                );
                batch.facts.extend(facts);
                batch.dropped_nulls += dropped;
                batch.sheets_read.push(spec.sheet.clone());
            }
            Err(e) => {
                tracing::warn!(target: "normalize", sheet = spec.sheet.as_str(), error = %e, "skipping sheet");
                batch.sheets_skipped.push(spec.sheet.clone());
            }
        }
    }
    batch
}
