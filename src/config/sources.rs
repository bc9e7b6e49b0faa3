// src/config/sources.rs
//! Per-source catalogues and fetch tuning, with the built-in defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder meaning "read the key from the environment".
pub const ENV_PLACEHOLDER: &str = "ENV";

/// One FRED series and how it is labelled downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub id: String,
    pub name: String,
    pub frequency: String,
    pub units: String,
}

/// Workbook sheet name -> frequency tag written on its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSpec {
    pub sheet: String,
    pub frequency: String,
}

/// What a subreddit's posts are mined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubredditCategory {
    /// Location plus purchase price.
    Purchase,
    /// Every city mentioned.
    Relocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubredditSpec {
    pub name: String,
    pub category: SubredditCategory,
}

/// A tracked search term. `query` is the literal sent upstream (search text
/// or a topic id); `display_name` is what lands in the output rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendTermSpec {
    pub key: String,
    pub query: String,
    pub display_name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FredConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub min_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_factor: u64,
    /// Window when there is no checkpoint.
    pub lookback_days: i64,
    /// Window for a full refresh.
    pub full_lookback_days: i64,
    pub timeout_secs: u64,
    pub series: Vec<SeriesSpec>,
    pub sheets: Vec<SheetSpec>,
}

impl Default for FredConfig {
    fn default() -> Self {
        let series = |id: &str, name: &str, frequency: &str, units: &str| SeriesSpec {
            id: id.into(),
            name: name.into(),
            frequency: frequency.into(),
            units: units.into(),
        };
        let sheet = |sheet: &str, frequency: &str| SheetSpec {
            sheet: sheet.into(),
            frequency: frequency.into(),
        };
        Self {
            enabled: true,
            base_url: "https://api.stlouisfed.org/fred".into(),
            api_key: ENV_PLACEHOLDER.into(),
            min_delay_ms: 500,
            max_retries: 3,
            backoff_factor: 2,
            lookback_days: 365,
            full_lookback_days: 36_500,
            timeout_secs: 30,
            series: vec![
                series("MORTGAGE30US", "30-Year Fixed Rate Mortgage Average", "weekly", "percent"),
                series("CPIAUCSL", "Consumer Price Index for All Urban Consumers", "monthly", "index"),
                series("RHORUSQ156N", "Homeownership Rate in the United States", "quarterly", "percent"),
                series("HPIPONM226S_PCH", "Purchase Only House Price Index", "monthly", "percent_change"),
                series("GDPC1", "Real Gross Domestic Product", "quarterly", "billions_chained_2017_usd"),
            ],
            sheets: vec![
                sheet("Annual", "annual"),
                sheet("Monthly", "monthly"),
                sheet("Quarterly", "quarterly"),
                sheet("Weekly, Ending Thursday", "weekly"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub enabled: bool,
    pub base_url: String,
    pub min_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_factor: u64,
    /// Window when there is no checkpoint.
    pub lookback_days: i64,
    /// Window for a full refresh.
    pub full_lookback_days: i64,
    pub page_size: usize,
    pub timeout_secs: u64,
    pub subreddits: Vec<SubredditSpec>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.pullpush.io/reddit/search/submission/".into(),
            min_delay_ms: 1_000,
            max_retries: 3,
            backoff_factor: 2,
            lookback_days: 30,
            full_lookback_days: 365,
            page_size: 100,
            timeout_secs: 30,
            subreddits: vec![
                SubredditSpec {
                    name: "FirstTimeHomeBuyer".into(),
                    category: SubredditCategory::Purchase,
                },
                SubredditSpec {
                    name: "SameGrassButGreener".into(),
                    category: SubredditCategory::Relocation,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub geo: String,
    pub min_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_factor: u64,
    /// Window when there is no checkpoint.
    pub lookback_days: i64,
    /// Window for a full refresh.
    pub full_lookback_days: i64,
    pub timeout_secs: u64,
    pub terms: Vec<TrendTermSpec>,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        let term = |key: &str, query: &str, display_name: &str, category: &str| TrendTermSpec {
            key: key.into(),
            query: query.into(),
            display_name: display_name.into(),
            category: category.into(),
        };
        Self {
            enabled: true,
            base_url: "https://serpapi.com/search.json".into(),
            api_key: ENV_PLACEHOLDER.into(),
            geo: "US".into(),
            min_delay_ms: 2_000,
            max_retries: 3,
            backoff_factor: 3,
            lookback_days: 90,
            full_lookback_days: 365 * 5,
            timeout_secs: 30,
            terms: vec![
                term("estate_sale", "/m/02rmp0", "Estate Sales", "Involuntary Supply"),
                term("foreclosure_auction", "/m/02tp2m", "Foreclosure Auctions", "Distress Signal"),
                term("home_insurance", "home insurance", "Home Insurance", "Financial Friction"),
                term("mortgage_assumption", "/m/0ddkfg", "Mortgage Assumption", "Market Access"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZillowConfig {
    pub enabled: bool,
    /// Export file name -> metric type.
    pub metric_files: BTreeMap<String, String>,
    /// Columns kept as identifiers when melting; every other column is a date.
    pub id_columns: Vec<String>,
}

impl Default for ZillowConfig {
    fn default() -> Self {
        let metric_files = [
            ("median_sale_price.csv", "median_sale_price"),
            ("zhvi_home_value.csv", "zhvi"),
            ("active_listings.csv", "active_listings"),
            ("market_heat_index.csv", "market_heat_index"),
            ("new_construction_median_sale_price.csv", "new_construction_median_sale_price"),
            ("new_construction_sales_count.csv", "new_construction_sales_count"),
            ("new_homeowner_affordability.csv", "new_homeowner_affordability"),
            ("new_listings.csv", "new_listings"),
            ("sales_count.csv", "sales_count"),
        ]
        .into_iter()
        .map(|(f, m)| (f.to_string(), m.to_string()))
        .collect();
        Self {
            enabled: true,
            metric_files,
            id_columns: ["RegionID", "SizeRank", "RegionName", "RegionType", "StateName"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_tracked_catalogue() {
        let f = FredConfig::default();
        let ids: Vec<&str> = f.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            ["MORTGAGE30US", "CPIAUCSL", "RHORUSQ156N", "HPIPONM226S_PCH", "GDPC1"]
        );
        assert_eq!(RedditConfig::default().subreddits.len(), 2);
        assert_eq!(TrendsConfig::default().terms.len(), 4);
        assert_eq!(ZillowConfig::default().metric_files.len(), 9);
    }

    #[test]
    fn category_is_snake_case_in_toml() {
        let s: SubredditSpec =
            toml::from_str("name = \"RealEstate\"\ncategory = \"relocation\"").unwrap();
        assert_eq!(s.category, SubredditCategory::Relocation);
    }
}
