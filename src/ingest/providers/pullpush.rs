// src/ingest/providers/pullpush.rs
//! PullPush submission search: cursor-paginated by `created_utc`, oldest first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::ingest::providers::{de_epoch, get_json};
use crate::ingest::types::{CursorKind, FetchWindow, RawRecord, Upstream, Watermark};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(deserialize_with = "de_epoch")]
    pub created_utc: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: String,
}

impl RawRecord for RawPost {
    type Key = String;

    fn natural_key(&self) -> String {
        self.id.clone()
    }

    fn stamp(&self) -> Watermark {
        Watermark::Timestamp(self.created_utc)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<serde_json::Value>>,
}

pub struct PullPushClient {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
}

impl PullPushClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, page_size: usize) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            page_size: page_size.clamp(1, 100),
        }
    }
}

/// Decode one page, skipping submissions without an id or timestamp.
fn decode_page(items: Vec<serde_json::Value>) -> (Vec<RawPost>, usize) {
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for v in items {
        match serde_json::from_value::<RawPost>(v) {
            Ok(p) if !p.id.is_empty() => out.push(p),
            _ => skipped += 1,
        }
    }
    (out, skipped)
}

#[async_trait]
impl Upstream for PullPushClient {
    type Record = RawPost;

    fn name(&self) -> &'static str {
        "reddit"
    }

    fn cursor_kind(&self) -> CursorKind {
        CursorKind::Timestamp
    }

    fn page_size(&self) -> Option<usize> {
        Some(self.page_size)
    }

    async fn fetch_page(
        &self,
        subreddit: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawPost>, FetchError> {
        let req = self.client.get(&self.base_url).query(&[
            ("subreddit", subreddit.to_string()),
            ("after", window.start.as_timestamp().to_string()),
            ("before", window.end.as_timestamp().to_string()),
            ("size", self.page_size.to_string()),
            ("sort", "asc".to_string()),
            ("sort_type", "created_utc".to_string()),
        ]);
        let body: SearchResponse = get_json(req).await?;
        let Some(data) = body.data else {
            tracing::warn!(target: "ingest", source = "reddit", subreddit, "unexpected response format");
            return Ok(Vec::new());
        };

        let (posts, skipped) = decode_page(data);
        if skipped > 0 {
            tracing::debug!(target: "ingest", source = "reddit", subreddit, skipped, "undecodable submissions");
        }
        tracing::info!(
            target: "ingest",
            source = "reddit",
            subreddit,
            after = window.start.as_timestamp(),
            count = posts.len(),
            "retrieved batch"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_skips_submissions_without_id() {
        let page = serde_json::json!([
            {"id": "abc", "subreddit": "FirstTimeHomeBuyer", "created_utc": 1700000000.0,
             "title": "Closed!", "selftext": "", "score": 3, "num_comments": 1,
             "author": "u1", "permalink": "/r/x/abc", "over_18": false},
            {"subreddit": "FirstTimeHomeBuyer", "created_utc": 1700000001},
        ]);
        let serde_json::Value::Array(items) = page else {
            unreachable!()
        };
        let (posts, skipped) = decode_page(items);
        assert_eq!(posts.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(posts[0].created_utc, 1_700_000_000);
        assert_eq!(posts[0].author.as_deref(), Some("u1"));
    }
}
