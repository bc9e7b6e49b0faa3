// src/ingest/providers/mod.rs
pub mod fred;
pub mod pullpush;
pub mod trends;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::FetchError;

/// Shared HTTP client with the per-call request timeout.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("housing-signals/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")
}

/// Send a GET and decode the JSON body, classifying failures for retry.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    req: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let resp = req.send().await.map_err(FetchError::from_reqwest)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let detail: String = body.chars().take(200).collect();
        return Err(FetchError::from_status(status.as_u16(), &detail));
    }
    resp.json::<T>()
        .await
        .map_err(|e| FetchError::Permanent(format!("decoding response: {e}")))
}

/// Accepts unix seconds as integer, float or numeric string.
pub(crate) fn de_epoch<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let v = serde_json::Value::deserialize(d)?;
    match &v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom("epoch out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f as i64)
            .map_err(D::Error::custom),
        _ => Err(D::Error::custom("expected unix timestamp")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct T {
        #[serde(deserialize_with = "de_epoch")]
        ts: i64,
    }

    #[test]
    fn epoch_accepts_int_float_and_string() {
        let a: T = serde_json::from_str(r#"{"ts": 1700000000}"#).unwrap();
        let b: T = serde_json::from_str(r#"{"ts": 1700000000.0}"#).unwrap();
        let c: T = serde_json::from_str(r#"{"ts": "1700000000"}"#).unwrap();
        assert_eq!(a.ts, 1_700_000_000);
        assert_eq!(b.ts, 1_700_000_000);
        assert_eq!(c.ts, 1_700_000_000);
    }
}
