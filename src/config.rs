//! Survey configuration.
//!
//! Everything a run needs is carried in [`SurveyConfig`] and passed into each
//! stage explicitly. Defaults reproduce the renal MRI survey: four techniques,
//! publication years 1989 through 2020, and a request pace that stays under
//! NCBI's limit of three requests per second without an API key.

use crate::error::{Result, SurveyError};
use crate::query::QueryTemplate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// First publication year searched by default
pub const DEFAULT_FIRST_YEAR: i32 = 1989;

/// Last publication year searched by default
pub const DEFAULT_LAST_YEAR: i32 = 2020;

/// Requests per second allowed by NCBI without an API key
const ALLOWED_REQUESTS_PER_SECOND: u64 = 3;

/// Extra pause added on top of the allowed rate
const SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// An MRI technique and the boolean sub-expression that matches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    /// Label used as key in output files and in the chart legend
    pub label: String,
    /// Search sub-expression, e.g. `arterial spin label*`
    pub expression: String,
}

impl Technique {
    pub fn new(label: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expression: expression.into(),
        }
    }
}

/// The four renal MRI techniques, in processing order.
pub fn default_techniques() -> Vec<Technique> {
    vec![
        Technique::new(
            "Diffusion imaging",
            "(diffusion weighted imaging OR diffusion tensor imaging OR intravoxel incoherent motion)",
        ),
        Technique::new("Arterial spin labeling", "arterial spin label*"),
        Technique::new("BOLD", "blood oxygenation level-dependent"),
        Technique::new("T1&T2 mapping", "(T1 mapping OR T2 mapping)"),
    ]
}

/// Which earlier records an identifier is checked against before counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupScope {
    /// One seen-set for the whole run: a record is attributed to the first
    /// technique/year that returned it.
    #[default]
    AcrossTechniques,
    /// Seen-set reset for every technique: only repeats across years of the
    /// same technique are dropped.
    WithinTechnique,
}

/// How the fetcher paces and identifies itself to the search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Pause between consecutive requests
    pub delay: Duration,
    /// NCBI API key; raises the allowed request rate
    pub api_key: Option<String>,
    /// Tool name reported with every request
    pub tool: String,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000 / ALLOWED_REQUESTS_PER_SECOND) + SAFETY_MARGIN,
            api_key: None,
            tool: "renal-mri-trends".to_string(),
        }
    }
}

/// File names of the three run artifacts, resolved against one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub counts: PathBuf,
    pub queries: PathBuf,
    pub plot: PathBuf,
}

impl OutputPaths {
    pub const COUNTS_FILE: &'static str = "n_ids.json";
    pub const QUERIES_FILE: &'static str = "queries.json";
    pub const PLOT_FILE: &'static str = "cumulative_publications.svg";

    /// Default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            counts: dir.join(Self::COUNTS_FILE),
            queries: dir.join(Self::QUERIES_FILE),
            plot: dir.join(Self::PLOT_FILE),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

/// Complete configuration for one survey run
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Contact address NCBI uses to reach the operator before blocking
    pub email: String,
    pub techniques: Vec<Technique>,
    pub first_year: i32,
    pub last_year: i32,
    pub template: QueryTemplate,
    pub dedup: DedupScope,
    pub policy: RequestPolicy,
    pub output: OutputPaths,
}

impl SurveyConfig {
    /// Default survey for the given contact email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            techniques: default_techniques(),
            first_year: DEFAULT_FIRST_YEAR,
            last_year: DEFAULT_LAST_YEAR,
            template: QueryTemplate::default(),
            dedup: DedupScope::default(),
            policy: RequestPolicy::default(),
            output: OutputPaths::default(),
        }
    }

    /// Years searched, ascending
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.first_year..=self.last_year
    }

    /// Technique labels in processing order
    pub fn labels(&self) -> Vec<String> {
        self.techniques.iter().map(|t| t.label.clone()).collect()
    }

    /// Labels of [`default_techniques`], in processing order
    pub fn default_labels() -> Vec<String> {
        default_techniques().into_iter().map(|t| t.label).collect()
    }

    /// Total number of remote queries a run will issue
    pub fn query_count(&self) -> usize {
        self.techniques.len() * self.years().count()
    }

    /// Check the configuration before any request is made.
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(SurveyError::Config(format!(
                "contact email '{}' is not a valid address",
                self.email
            )));
        }

        if self.techniques.is_empty() {
            return Err(SurveyError::Config("no techniques configured".to_string()));
        }

        let mut labels = HashSet::new();
        for technique in &self.techniques {
            if technique.label.trim().is_empty() || technique.expression.trim().is_empty() {
                return Err(SurveyError::Config(
                    "technique label and expression must not be empty".to_string(),
                ));
            }
            if !labels.insert(technique.label.as_str()) {
                return Err(SurveyError::Config(format!(
                    "duplicate technique label '{}'",
                    technique.label
                )));
            }
        }

        if self.first_year > self.last_year {
            return Err(SurveyError::Config(format!(
                "first year {} is after last year {}",
                self.first_year, self.last_year
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SurveyConfig::new("someone@example.org");
        assert!(config.validate().is_ok());
        assert_eq!(config.techniques.len(), 4);
        assert_eq!(config.years().next(), Some(1989));
        assert_eq!(config.years().last(), Some(2020));
        assert_eq!(config.query_count(), 4 * 32);
        assert_eq!(config.policy.delay, Duration::from_millis(433));
        assert_eq!(config.dedup, DedupScope::AcrossTechniques);
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let config = SurveyConfig::new("  ");
        assert!(matches!(config.validate(), Err(SurveyError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_labels() {
        let mut config = SurveyConfig::new("someone@example.org");
        config.techniques.push(Technique::new("BOLD", "BOLD"));
        assert!(matches!(config.validate(), Err(SurveyError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_years() {
        let mut config = SurveyConfig::new("someone@example.org");
        config.first_year = 2021;
        config.last_year = 2020;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_paths_in_dir() {
        let paths = OutputPaths::in_dir(Path::new("out"));
        assert_eq!(paths.counts, Path::new("out").join("n_ids.json"));
        assert_eq!(paths.queries, Path::new("out").join("queries.json"));
        assert_eq!(paths.plot, Path::new("out").join("cumulative_publications.svg"));
    }
}
