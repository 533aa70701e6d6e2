//! End-of-run metrics export.
//!
//! - `<dir>/scheduler_summary.csv`: one row per run with the global counters (appended).
//! - `<dir>/actors.csv`: per-actor counters for the last run (overwritten).

use std::{
    fs::{OpenOptions, create_dir_all},
    path::Path,
};

use csv::WriterBuilder;
use log::{error, info};

use crate::error::Result;
use crate::utils::metrics::SharedMetrics;

pub fn export_metrics(metrics: &SharedMetrics, dir: &Path) -> Result<()> {
    create_dir_all(dir)?;

    let summary_path = dir.join("scheduler_summary.csv");
    let write_header = !summary_path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&summary_path)?;
    let mut wtr = WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    wtr.serialize(metrics.snapshot()).map_err(csv_err)?;
    wtr.flush()?;

    let actors_path = dir.join("actors.csv");
    let mut wtr = csv::Writer::from_path(&actors_path).map_err(csv_err)?;
    for row in metrics.actor_snapshots() {
        wtr.serialize(row).map_err(csv_err)?;
    }
    wtr.flush()?;

    info!(
        "[export] metrics written to {} and {}",
        summary_path.display(),
        actors_path.display()
    );
    Ok(())
}

/// Logs instead of failing; used on the shutdown path.
pub fn run_exports(metrics: &SharedMetrics, dir: &Path) {
    if let Err(e) = export_metrics(metrics, dir) {
        error!("[export] failed: {}", e);
    }
}

fn csv_err(e: csv::Error) -> std::io::Error {
    std::io::Error::other(e)
}
