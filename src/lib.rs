// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod sink;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::error::{FetchError, PipelineError};
pub use crate::pipeline::{run, RunReport, Stores};
pub use crate::sink::{CsvDirSink, MemorySink, Sink, TableBatch, WriteMode};
