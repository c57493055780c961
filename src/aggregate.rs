//! Per-technique, per-year aggregation of search results.
//!
//! Queries run strictly in order: techniques as configured, years ascending.
//! Identifiers are threaded through a [`SeenIds`] set so that a record
//! returned by several queries is counted once, under the first query that
//! returned it (or, with [`DedupScope::WithinTechnique`], once per technique).

use crate::config::{DedupScope, SurveyConfig};
use crate::entrez::CountFetcher;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// technique -> year -> number of publications counted for that year
pub type CountTable = BTreeMap<String, BTreeMap<i32, u64>>;

/// technique -> year -> search term that was sent
pub type QueryTable = BTreeMap<String, BTreeMap<i32, String>>;

/// Everything a search run produces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyOutcome {
    pub counts: CountTable,
    pub queries: QueryTable,
}

/// Running totals for one technique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeSeries {
    pub technique: String,
    /// (year, cumulative count), years ascending
    pub points: Vec<(i32, u64)>,
}

impl CumulativeSeries {
    /// Final cumulative total, 0 for an empty series
    pub fn total(&self) -> u64 {
        self.points.last().map(|(_, n)| *n).unwrap_or(0)
    }
}

/// Identifiers already attributed earlier in the run
#[derive(Debug, Default)]
pub struct SeenIds {
    ids: HashSet<String>,
}

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `ids` and return how many of them were not seen before.
    pub fn admit(&mut self, ids: Vec<String>) -> u64 {
        ids.into_iter().filter(|id| self.ids.insert(id.clone())).count() as u64
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Keeps consecutive requests at least `delay` apart
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_request: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    /// Wait until the next request may be sent
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Run every (technique, year) query and collect deduplicated counts.
///
/// The first failing query aborts the run; the error names its technique and
/// year. A fetcher that returns a count without identifiers is trusted as-is,
/// since there is nothing to deduplicate against.
pub async fn run_survey<F: CountFetcher>(fetcher: &F, config: &SurveyConfig) -> Result<SurveyOutcome> {
    config.validate()?;

    let total = config.query_count();
    let mut outcome = SurveyOutcome::default();
    let mut seen = SeenIds::new();
    let mut pacer = Pacer::new(config.policy.delay);
    let mut query_no = 0;

    info!(
        techniques = config.techniques.len(),
        first_year = config.first_year,
        last_year = config.last_year,
        dedup = ?config.dedup,
        "Starting PubMed survey"
    );

    for technique in &config.techniques {
        if config.dedup == DedupScope::WithinTechnique {
            seen.clear();
        }

        let counts = outcome.counts.entry(technique.label.clone()).or_default();
        let queries = outcome.queries.entry(technique.label.clone()).or_default();

        for year in config.years() {
            query_no += 1;
            let query = config.template.build(&technique.expression, year);

            pacer.wait().await;
            let result = fetcher
                .search(&query)
                .await
                .map_err(|e| e.for_query(&technique.label, year))?;

            let found = result.count;
            let kept = if result.ids.is_empty() {
                debug!(technique = %technique.label, year, "No identifiers returned, count not deduplicated");
                found
            } else {
                seen.admit(result.ids)
            };

            info!(
                technique = %technique.label,
                year,
                found,
                kept,
                "Query #{}/{}: {}",
                query_no,
                total,
                query
            );

            counts.insert(year, kept);
            queries.insert(year, query);
        }
    }

    info!(queries = total, unique_ids = seen.len(), "Survey complete");

    Ok(outcome)
}

/// Running sum of yearly counts, years ascending.
pub fn cumulative(yearly: &BTreeMap<i32, u64>) -> Vec<(i32, u64)> {
    yearly
        .iter()
        .scan(0u64, |total, (year, n)| {
            *total += n;
            Some((*year, *total))
        })
        .collect()
}

/// Cumulative series for every technique in the table.
pub fn cumulative_series(counts: &CountTable) -> Vec<CumulativeSeries> {
    counts
        .iter()
        .map(|(technique, yearly)| CumulativeSeries {
            technique: technique.clone(),
            points: cumulative(yearly),
        })
        .collect()
}

/// Sort series into the given technique label order. Labels not listed keep
/// their relative order after the listed ones.
pub fn order_series(series: &mut [CumulativeSeries], labels: &[String]) {
    series.sort_by_key(|s| {
        labels
            .iter()
            .position(|label| *label == s.technique)
            .unwrap_or(labels.len())
    });
}
