//! Shared start-up for the operator binaries.

use caselake_core::config::{Config, Settings};
use caselake_core::types::{HealthReport, HealthStatus};
use caselake_vector::{open_storage, VectorIndex};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` filtering, `info` by default. Logs go to stderr so command
/// output stays pipeable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    Ok(config.settings()?)
}

/// The persisted index, without touching any provider.
pub fn open_index(settings: &Settings) -> caselake_core::Result<VectorIndex> {
    VectorIndex::open_existing(open_storage(&settings.index)?, settings.index.dimension)
}

pub fn index_health(settings: &Settings) -> caselake_core::Result<HealthReport> {
    Ok(open_index(settings)?.health())
}

pub fn print_health(report: &HealthReport) {
    println!("Vector DB status");
    println!("----------------");
    println!("Total vectors in index : {}", report.total_vectors);
    println!("Total metadata records : {}", report.total_metadata);
    match report.status {
        HealthStatus::Empty => println!("Vector DB is empty"),
        HealthStatus::Mismatch => println!("WARNING: vector count and metadata count do not match; re-run ingestion"),
        HealthStatus::Healthy => println!("Vector DB is healthy and ready"),
    }
}
