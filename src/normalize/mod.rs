// src/normalize/mod.rs
//! Wide-to-long reshaping.
//!
//! A wide table has a few identity columns and one value column per date (or
//! per series). `melt` emits one row per (identity row, value column) and
//! drops null cells, reporting how many were dropped. `pivot_to_wide` is the
//! inverse and exists mainly to check the reshaping is lossless.

pub mod workbook;
pub mod zillow;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use metrics::describe_counter;
use once_cell::sync::OnceCell;

use crate::error::PipelineError;

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "normalize_dropped_nulls_total",
            "Null cells dropped while melting wide tables."
        );
    });
}

/// Lower-case, snake-case, then map known vendor spellings onto the fact schema.
pub fn canonical_column(name: &str) -> String {
    let snake = name.trim().to_lowercase().replace([' ', '-'], "_");
    match snake.as_str() {
        "regionid" => "region_id".into(),
        "sizerank" => "size_rank".into(),
        "regionname" => "region_name".into(),
        "regiontype" => "region_type".into(),
        "statename" => "state_name".into(),
        _ => snake,
    }
}

/// Dates as they appear in exported headers and cells.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A rectangular string table as read from CSV.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WideTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl WideTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| PipelineError::Malformed(format!("header: {e}")))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for rec in rdr.records() {
            let rec = rec.map_err(|e| PipelineError::Malformed(e.to_string()))?;
            rows.push(rec.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| PipelineError::MissingInput(format!("{}: {e}", path.display())))?;
        Self::from_reader(file).map_err(|e| match e {
            PipelineError::Malformed(m) => {
                PipelineError::Malformed(format!("{}: {m}", path.display()))
            }
            other => other,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeltedRow {
    /// Identity values, aligned with `Melted::id_columns`.
    pub ids: Vec<String>,
    /// Header of the value column this row came from.
    pub variable: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Melted {
    /// Canonical identity column names.
    pub id_columns: Vec<String>,
    pub rows: Vec<MeltedRow>,
    pub dropped_nulls: usize,
}

impl Melted {
    /// Identity value of `row` under canonical column `column`.
    pub fn id<'a>(&self, row: &'a MeltedRow, column: &str) -> Option<&'a str> {
        let i = self.id_columns.iter().position(|c| c == column)?;
        row.ids.get(i).map(String::as_str)
    }
}

/// Melt every non-identity column. Identity columns are matched by their
/// canonical name, so `RegionID` and `region_id` are the same column.
pub fn melt(table: &WideTable, id_columns: &[String]) -> Result<Melted, PipelineError> {
    ensure_metrics_described();

    let canonical: Vec<String> = table.headers.iter().map(|h| canonical_column(h)).collect();
    let mut id_idx = Vec::with_capacity(id_columns.len());
    for col in id_columns {
        let want = canonical_column(col);
        let Some(i) = canonical.iter().position(|c| *c == want) else {
            return Err(PipelineError::MissingInput(format!("column {col} absent")));
        };
        id_idx.push(i);
    }
    let value_idx: Vec<usize> = (0..table.headers.len())
        .filter(|i| !id_idx.contains(i))
        .collect();

    let mut out = Melted {
        id_columns: id_idx.iter().map(|&i| canonical[i].clone()).collect(),
        rows: Vec::with_capacity(table.rows.len() * value_idx.len()),
        dropped_nulls: 0,
    };
    for row in &table.rows {
        let ids: Vec<String> = id_idx
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect();
        for &vi in &value_idx {
            match row.get(vi).and_then(|c| parse_cell(c)) {
                Some(value) => out.rows.push(MeltedRow {
                    ids: ids.clone(),
                    variable: table.headers[vi].clone(),
                    value,
                }),
                None => out.dropped_nulls += 1,
            }
        }
    }
    metrics::counter!("normalize_dropped_nulls_total").increment(out.dropped_nulls as u64);
    Ok(out)
}

/// Inverse of [`melt`]: identity rows and value columns in first-seen order,
/// dropped cells left empty.
pub fn pivot_to_wide(melted: &Melted) -> WideTable {
    let mut columns: Vec<String> = Vec::new();
    let mut col_pos: HashMap<&str, usize> = HashMap::new();
    let mut row_pos: HashMap<&[String], usize> = HashMap::new();
    let mut keys: Vec<&[String]> = Vec::new();

    for r in &melted.rows {
        if !col_pos.contains_key(r.variable.as_str()) {
            col_pos.insert(r.variable.as_str(), columns.len());
            columns.push(r.variable.clone());
        }
        if !row_pos.contains_key(r.ids.as_slice()) {
            row_pos.insert(r.ids.as_slice(), keys.len());
            keys.push(r.ids.as_slice());
        }
    }

    let width = melted.id_columns.len() + columns.len();
    let mut rows: Vec<Vec<String>> = keys
        .iter()
        .map(|ids| {
            let mut row = ids.to_vec();
            row.resize(width, String::new());
            row
        })
        .collect();
    for r in &melted.rows {
        let ri = row_pos[r.ids.as_slice()];
        let ci = melted.id_columns.len() + col_pos[r.variable.as_str()];
        rows[ri][ci] = r.value.to_string();
    }

    let mut headers = melted.id_columns.clone();
    headers.extend(columns);
    WideTable { headers, rows }
}
