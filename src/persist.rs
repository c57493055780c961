//! Run artifacts on disk.
//!
//! Counts and queries are written as pretty-printed JSON objects keyed by
//! technique label, then by year. Existing files are overwritten.

use crate::aggregate::{CountTable, CumulativeSeries, QueryTable, SurveyOutcome};
use crate::config::OutputPaths;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::info;

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    info!("Saved {:?}", path);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write technique -> year -> count
pub fn write_counts(path: &Path, counts: &CountTable) -> Result<()> {
    write_json(path, counts)
}

/// Read a counts file written by [`write_counts`]
pub fn read_counts(path: &Path) -> Result<CountTable> {
    read_json(path)
}

/// Write technique -> year -> search term
pub fn write_queries(path: &Path, queries: &QueryTable) -> Result<()> {
    write_json(path, queries)
}

/// Read a queries file written by [`write_queries`]
pub fn read_queries(path: &Path) -> Result<QueryTable> {
    read_json(path)
}

/// Write both JSON artifacts of a search run
pub fn save_outcome(paths: &OutputPaths, outcome: &SurveyOutcome) -> Result<()> {
    write_counts(&paths.counts, &outcome.counts)?;
    write_queries(&paths.queries, &outcome.queries)
}

#[derive(Debug, Serialize)]
struct SeriesRow<'a> {
    technique: &'a str,
    year: i32,
    cumulative: u64,
}

/// Export cumulative series as CSV, one row per (technique, year).
pub fn write_series_csv(path: &Path, series: &[CumulativeSeries]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

    for s in series {
        for (year, cumulative) in &s.points {
            wtr.serialize(SeriesRow {
                technique: &s.technique,
                year: *year,
                cumulative: *cumulative,
            })?;
        }
    }

    wtr.flush()?;
    info!("Saved {:?}", path);
    Ok(())
}
