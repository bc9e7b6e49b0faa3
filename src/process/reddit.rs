// src/process/reddit.rs
//! Raw submissions -> `Post` rows with extracted location, price and mentions.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::config::SubredditCategory;
use crate::extract::{extract_price, normalize_text, TextExtractor};
use crate::ingest::providers::pullpush::RawPost;

pub const CITY_MENTION_SEPARATOR: &str = "|";
const PERMALINK_HOST: &str = "https://reddit.com";
const REMOVED_MARKERS: [&str; 2] = ["[deleted]", "[removed]"];
const UNKNOWN_AUTHOR: &str = "[deleted]";

/// Natural key: `post_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub subreddit: String,
    pub created_utc: i64,
    /// `YYYY-MM-DD` of `created_utc` in UTC.
    pub created_date: String,
    pub title: String,
    pub selftext: String,
    pub score: i64,
    pub num_comments: i64,
    pub author: String,
    pub location: Option<String>,
    pub purchase_price: Option<f64>,
    /// Distinct cities joined with [`CITY_MENTION_SEPARATOR`].
    pub city_mentions: Option<String>,
    pub permalink: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostStats {
    pub loaded: usize,
    pub removed: usize,
    pub with_location: usize,
    pub with_price: usize,
    pub with_mentions: usize,
}

fn clean(s: &str) -> String {
    normalize_text(&html_escape::decode_html_entities(s))
}

fn is_removed(selftext: &str) -> bool {
    REMOVED_MARKERS.contains(&selftext.trim())
}

/// Process one subreddit's raw collection. Removed posts are skipped; the
/// category decides which fields get extracted.
pub fn process_posts(
    raw: &[RawPost],
    category: SubredditCategory,
    extractor: &TextExtractor,
) -> (Vec<Post>, PostStats) {
    let mut stats = PostStats {
        loaded: raw.len(),
        ..Default::default()
    };
    let mut out = Vec::with_capacity(raw.len());

    for p in raw {
        if is_removed(&p.selftext) {
            stats.removed += 1;
            continue;
        }
        let title = clean(&p.title);
        let selftext = clean(&p.selftext);
        let full_text = format!("{title}\n\n{selftext}");

        let (location, purchase_price, city_mentions) = match category {
            SubredditCategory::Purchase => (
                extractor.extract_location(&full_text),
                extract_price(&full_text),
                None,
            ),
            SubredditCategory::Relocation => {
                let cities = extractor.extract_city_mentions(&full_text);
                let joined = (!cities.is_empty()).then(|| cities.join(CITY_MENTION_SEPARATOR));
                (None, None, joined)
            }
        };
        stats.with_location += usize::from(location.is_some());
        stats.with_price += usize::from(purchase_price.is_some());
        stats.with_mentions += usize::from(city_mentions.is_some());

        let created_date = DateTime::from_timestamp(p.created_utc, 0)
            .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let permalink = if p.permalink.is_empty() || p.permalink.starts_with("http") {
            p.permalink.clone()
        } else {
            format!("{PERMALINK_HOST}{}", p.permalink)
        };

        out.push(Post {
            post_id: p.id.clone(),
            subreddit: p.subreddit.clone(),
            created_utc: p.created_utc,
            created_date,
            title,
            selftext,
            score: p.score,
            num_comments: p.num_comments,
            author: p
                .author
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            location,
            purchase_price,
            city_mentions,
            permalink,
        });
    }

    tracing::info!(
        target: "extract",
        loaded = stats.loaded,
        removed = stats.removed,
        with_location = stats.with_location,
        with_price = stats.with_price,
        with_mentions = stats.with_mentions,
        "processed posts"
    );
    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Gazetteer, GazetteerEntry};

    fn raw(id: &str, title: &str, selftext: &str) -> RawPost {
        RawPost {
            id: id.into(),
            subreddit: "FirstTimeHomeBuyer".into(),
            created_utc: 1_704_067_200,
            title: title.into(),
            selftext: selftext.into(),
            score: 5,
            num_comments: 2,
            author: None,
            permalink: format!("/r/FirstTimeHomeBuyer/comments/{id}/"),
        }
    }

    fn extractor() -> TextExtractor {
        let entries = [("Denver", "CO"), ("Kansas City", "MO"), ("Austin", "TX")]
            .into_iter()
            .map(|(c, s)| GazetteerEntry {
                city: c.into(),
                state: s.into(),
                population: 700_000,
            });
        TextExtractor::new(Gazetteer::from_entries(entries, 200_000).unwrap())
    }

    #[test]
    fn purchase_posts_get_location_and_price() {
        let posts = vec![
            raw("a1", "Closed on our first home!", "Paid $385K in Austin, TX &amp; we are thrilled"),
            raw("a2", "gone", "[removed]"),
        ];
        let (rows, stats) = process_posts(&posts, SubredditCategory::Purchase, &extractor());
        assert_eq!(stats.removed, 1);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.location.as_deref(), Some("Austin, TX"));
        assert_eq!(r.purchase_price, Some(385_000.0));
        assert_eq!(r.city_mentions, None);
        assert!(r.selftext.contains("& we"));
        assert_eq!(r.created_date, "2024-01-01");
        assert_eq!(r.author, "[deleted]");
        assert_eq!(r.permalink, "https://reddit.com/r/FirstTimeHomeBuyer/comments/a1/");
    }

    #[test]
    fn relocation_posts_get_joined_mentions() {
        let posts = vec![raw(
            "b1",
            "Denver or Kansas City?",
            "Also considering Boise, ID. Denver winters scare me.",
        )];
        let (rows, _) = process_posts(&posts, SubredditCategory::Relocation, &extractor());
        assert_eq!(
            rows[0].city_mentions.as_deref(),
            Some("Boise, ID|Kansas City, MO|Denver, CO")
        );
        assert_eq!(rows[0].location, None);
        assert_eq!(rows[0].purchase_price, None);
    }
}
