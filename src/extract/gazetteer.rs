// src/extract/gazetteer.rs
//! City reference list used for free-text location matching.
//!
//! Loaded from a CSV with at least a city name, a state abbreviation and a
//! population column (the `uscities.csv` layout works as-is). Entries below
//! the population threshold are dropped at load time to bound the match space.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_MIN_POPULATION: u64 = 200_000;

/// USPS codes of the 50 states plus DC.
pub const US_STATE_CODES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC",
];

pub fn is_state_code(code: &str) -> bool {
    US_STATE_CODES.contains(&code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerEntry {
    pub city: String,
    pub state: String,
    pub population: u64,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    city_ascii: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    city_name: Option<String>,
    #[serde(default)]
    state_id: Option<String>,
    #[serde(default)]
    state_abbreviation: Option<String>,
    #[serde(default)]
    population: Option<f64>,
}

impl CsvRow {
    fn into_entry(self) -> Option<GazetteerEntry> {
        let city = self.city_ascii.or(self.city).or(self.city_name)?;
        let state = self.state_id.or(self.state_abbreviation)?;
        let population = self.population.filter(|p| p.is_finite() && *p >= 0.0)? as u64;
        let city = city.trim().to_string();
        if city.is_empty() {
            return None;
        }
        Some(GazetteerEntry {
            city,
            state: state.trim().to_ascii_uppercase(),
            population,
        })
    }
}

/// A gazetteer city with its precompiled case-insensitive word-boundary matcher.
#[derive(Debug, Clone)]
pub struct City {
    pub name: String,
    pub state: String,
    pattern: Regex,
}

impl City {
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// `"City, ST"` with the gazetteer's capitalization.
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.state)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    /// Load order; the first entry per lower-cased name is kept.
    cities: Vec<City>,
    /// Indices into `cities`, longest name first.
    by_length: Vec<usize>,
}

impl Gazetteer {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I, min_population: u64) -> Result<Self>
    where
        I: IntoIterator<Item = GazetteerEntry>,
    {
        let mut seen = HashSet::new();
        let mut cities = Vec::new();
        for e in entries {
            if e.population < min_population {
                continue;
            }
            if !seen.insert(e.city.to_lowercase()) {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&e.city)))
                .with_context(|| format!("compiling matcher for {}", e.city))?;
            cities.push(City {
                name: e.city,
                state: e.state,
                pattern,
            });
        }

        let mut by_length: Vec<usize> = (0..cities.len()).collect();
        // stable: equal lengths keep load order
        by_length.sort_by(|&a, &b| cities[b].name.len().cmp(&cities[a].name.len()));

        Ok(Self { cities, by_length })
    }

    pub fn load_csv(path: &Path, min_population: u64) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("opening gazetteer {}", path.display()))?;
        let mut entries = Vec::new();
        let mut total = 0usize;
        for row in rdr.deserialize::<CsvRow>() {
            total += 1;
            let row = row.with_context(|| format!("reading gazetteer {}", path.display()))?;
            if let Some(e) = row.into_entry() {
                entries.push(e);
            }
        }
        let g = Self::from_entries(entries, min_population)?;
        tracing::info!(
            target: "extract",
            path = %path.display(),
            total,
            kept = g.len(),
            min_population,
            "loaded gazetteer"
        );
        Ok(g)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Cities in load order.
    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    /// Cities ordered by name length, longest first.
    pub fn cities_longest_first(&self) -> impl Iterator<Item = &City> {
        self.by_length.iter().map(move |&i| &self.cities[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(city: &str, state: &str, population: u64) -> GazetteerEntry {
        GazetteerEntry {
            city: city.into(),
            state: state.into(),
            population,
        }
    }

    #[test]
    fn population_filter_and_length_order() {
        let g = Gazetteer::from_entries(
            vec![
                entry("York", "PA", 45_000),
                entry("Austin", "TX", 960_000),
                entry("New York", "NY", 8_300_000),
                entry("Kansas City", "MO", 500_000),
            ],
            DEFAULT_MIN_POPULATION,
        )
        .unwrap();
        assert_eq!(g.len(), 3);
        let names: Vec<&str> = g.cities_longest_first().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kansas City", "New York", "Austin"]);
    }

    #[test]
    fn matcher_respects_word_boundaries() {
        let g = Gazetteer::from_entries(vec![entry("Mesa", "AZ", 500_000)], 0).unwrap();
        let mesa = g.cities().next().unwrap();
        assert!(mesa.is_mentioned_in("we looked in MESA last week"));
        assert!(!mesa.is_mentioned_in("a mesas view"));
    }

    #[test]
    fn loads_uscities_layout() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "city,city_ascii,state_id,state_name,population,lat,lng").unwrap();
        writeln!(f, "San José,San Jose,CA,California,1000000,37.3,-121.9").unwrap();
        writeln!(f, "Tiny,Tiny,VT,Vermont,900,44.0,-72.0").unwrap();
        let g = Gazetteer::load_csv(f.path(), DEFAULT_MIN_POPULATION).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.cities().next().unwrap().label(), "San Jose, CA");
    }
}
