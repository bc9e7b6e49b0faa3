//! Housing signals — batch entrypoint.
//! Runs one pipeline pass and exits non-zero only on a fatal error.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use housing_signals::pipeline::{self, Stores};
use housing_signals::{CsvDirSink, PipelineConfig};

/// Compact logs by default; JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("housing_signals=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::load_default()?;
    let stores = Stores::on_disk(&cfg.paths);
    let extractor = pipeline::load_extractor(&cfg)?;
    let sink = CsvDirSink::new(&cfg.paths.output_dir);

    let report = pipeline::run(&cfg, &stores, &extractor, &sink, chrono::Utc::now()).await?;
    if report.failed_units() > 0 {
        tracing::warn!(failed_units = report.failed_units(), "run finished with failed units");
    }
    Ok(())
}
