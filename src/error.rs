// src/error.rs
//! Error taxonomy shared by the ingest, normalize and pipeline stages.
//!
//! - [`FetchError`] classifies upstream failures into retryable and final.
//! - [`PipelineError`] separates fatal configuration problems from per-unit
//!   input problems that are logged and skipped.

use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network error, timeout, rate-limit rejection or 5xx. Retried with backoff.
    #[error("transient upstream failure: {0}")]
    Transient(String),
    /// Anything retrying will not fix (4xx other than 429, undecodable body).
    #[error("permanent upstream failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// Classify a transport-level `reqwest` error.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), &e.to_string());
        }
        if e.is_timeout() || e.is_connect() || e.is_request() {
            FetchError::Transient(e.to_string())
        } else if e.is_decode() || e.is_body() {
            FetchError::Permanent(format!("decoding response: {e}"))
        } else {
            FetchError::Transient(e.to_string())
        }
    }

    /// Classify an HTTP status returned by an upstream.
    pub fn from_status(status: u16, detail: &str) -> Self {
        if status == 429 || status >= 500 {
            FetchError::Transient(format!("HTTP {status}: {detail}"))
        } else {
            FetchError::Permanent(format!("HTTP {status}: {detail}"))
        }
    }
}

/// Stage-level errors. Only `Config` aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Broken mapping table or unrecognized input file.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raw file, workbook sheet or expected column absent.
    #[error("missing input: {0}")]
    MissingInput(String),
    /// Input present but unusable (bad header, unparsable date column).
    #[error("malformed input: {0}")]
    Malformed(String),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(FetchError::from_status(429, "slow down").is_transient());
        assert!(FetchError::from_status(503, "unavailable").is_transient());
        assert!(!FetchError::from_status(404, "not found").is_transient());
        assert!(!FetchError::from_status(400, "bad series").is_transient());
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(PipelineError::Config("unknown file".into()).is_fatal());
        assert!(!PipelineError::MissingInput("x.csv".into()).is_fatal());
        assert!(!PipelineError::Malformed("bad header".into()).is_fatal());
    }
}
