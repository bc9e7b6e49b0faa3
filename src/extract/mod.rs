// src/extract/mod.rs
//! Free-text cleanup and signal extraction for posts.
//!
//! - `normalize_text` folds typographic punctuation to ASCII and drops control
//!   characters and every remaining non-ASCII code point.
//! - `extract_price` reads a purchase price (`$450K`, `$1.2M`, `$450,000`).
//! - `TextExtractor` resolves `"City, ST"` locations against the state codes
//!   and a [`Gazetteer`].

pub mod gazetteer;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

pub use crate::extract::gazetteer::{is_state_code, Gazetteer, GazetteerEntry};

/// Plausible house price range for full-number matches.
pub const MIN_PRICE: f64 = 50_000.0;
pub const MAX_PRICE: f64 = 50_000_000.0;

static RE_PRICE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\s*(\d+(?:\.\d+)?)\s*([KkMm])").expect("price suffix regex"));

/// Words starting with a suffix letter that never denote an amount.
const NON_PRICE_WORDS: [&str; 4] = ["kid", "kitchen", "mile", "month"];

static RE_PRICE_FULL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d{5,})").expect("full price regex"));

static RE_CITY_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*),\s*([A-Z]{2})\b").expect("city/state regex")
});

/// Clean text for downstream CSV/warehouse use (ASCII only).
pub fn normalize_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\u{201C}' | '\u{201D}' | '\u{2033}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{2032}' => out.push('\''),
            '\u{2013}' => out.push('-'),
            '\u{2014}' => out.push_str("--"),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            '\n' | '\t' => out.push(ch),
            c if c.is_ascii_control() && c != '\u{7F}' => {}
            c if c.is_ascii() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Purchase price mentioned in `text`, if any.
///
/// A `K`/`M` suffixed amount wins over a full number; a full number is only
/// accepted inside [`MIN_PRICE`, `MAX_PRICE`].
pub fn extract_price(text: &str) -> Option<f64> {
    for caps in RE_PRICE_SUFFIX.captures_iter(text) {
        let Some(suffix) = caps.get(2) else { continue };
        let rest = &text[suffix.start()..];
        let non_price = NON_PRICE_WORDS
            .iter()
            .any(|w| rest.get(..w.len()).is_some_and(|p| p.eq_ignore_ascii_case(w)));
        if non_price {
            continue;
        }
        if let Ok(amount) = caps[1].parse::<f64>() {
            let factor = match suffix.as_str() {
                "K" | "k" => 1_000.0,
                _ => 1_000_000.0,
            };
            return Some(amount * factor);
        }
    }

    let caps = RE_PRICE_FULL.captures(text)?;
    let amount: f64 = caps[1].replace(',', "").parse().ok()?;
    (MIN_PRICE..=MAX_PRICE).contains(&amount).then_some(amount)
}

/// `"City, ST"` pairs written explicitly in the text with a known state code.
fn explicit_city_states(text: &str) -> impl Iterator<Item = String> + '_ {
    RE_CITY_STATE.captures_iter(text).filter_map(|caps| {
        let state = caps.get(2)?.as_str();
        is_state_code(state).then(|| format!("{}, {}", &caps[1], state))
    })
}

pub struct TextExtractor {
    gazetteer: Gazetteer,
}

impl TextExtractor {
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self { gazetteer }
    }

    /// Single location for a post. Only the first `"City, ST"` candidate is
    /// considered; when its code is not a state, the first gazetteer city
    /// (load order) named anywhere in the text is used instead.
    pub fn extract_location(&self, text: &str) -> Option<String> {
        if let Some(caps) = RE_CITY_STATE.captures(text) {
            let state = &caps[2];
            if is_state_code(state) {
                return Some(format!("{}, {}", &caps[1], state));
            }
        }
        self.gazetteer
            .cities()
            .find(|c| c.is_mentioned_in(text))
            .map(|c| c.label())
    }

    /// Every distinct city mentioned, explicit pairs first, then gazetteer
    /// hits scanned longest name first. Deduplicated case-insensitively.
    pub fn extract_city_mentions(&self, text: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for cs in explicit_city_states(text) {
            if seen.insert(cs.to_lowercase()) {
                out.push(cs);
            }
        }
        for city in self.gazetteer.cities_longest_first() {
            if !city.is_mentioned_in(text) {
                continue;
            }
            let label = city.label();
            if seen.insert(label.to_lowercase()) {
                out.push(label);
            }
        }
        out
    }
}
