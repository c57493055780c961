//! Errors raised while searching PubMed, saving results, or plotting.
//!
//! A failed query is wrapped in [`SurveyError::Query`] so the message names
//! the technique and year that broke the run.

use thiserror::Error;

/// Everything that can stop a search, save, or plot stage.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the search service
    #[error("Rate limited by search service (HTTP 429)")]
    RateLimited,

    /// Search service returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status, or 0 for an error reported inside a 200 response
        code: u16,
        /// Error message from API
        message: String,
    },

    /// A single (technique, year) query failed
    #[error("Query for technique '{technique}' in {year} failed: {source}")]
    Query {
        technique: String,
        year: i32,
        #[source]
        source: Box<SurveyError>,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Chart rendering error
    #[error("Plot error: {0}")]
    Plot(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl SurveyError {
    /// Wrap an error with the technique and year whose query produced it.
    pub fn for_query(self, technique: &str, year: i32) -> Self {
        SurveyError::Query {
            technique: technique.to_string(),
            year,
            source: Box::new(self),
        }
    }
}

/// Result type alias using `SurveyError`
pub type Result<T> = std::result::Result<T, SurveyError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| SurveyError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_technique_and_year() {
        let err = SurveyError::Parse("empty body".to_string()).for_query("BOLD", 2019);
        let msg = err.to_string();
        assert!(msg.contains("BOLD"));
        assert!(msg.contains("2019"));
        assert!(msg.contains("empty body"));
    }

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u32> = None;
        assert!(matches!(missing.ok_or_parse("no count"), Err(SurveyError::Parse(_))));
        assert_eq!(Some(3).ok_or_parse("no count").ok(), Some(3));
    }
}
