//! NCBI E-utilities client for PubMed searches.
//!
//! Only `esearch` is used: it returns the number of records matching a term
//! together with their PubMed identifiers.
//!
//! Usage policy (see <https://www.ncbi.nlm.nih.gov/books/NBK25497/>):
//! - Every request carries `tool` and `email` so NCBI can contact the operator
//! - At most 3 requests/second without an API key, 10 with one
//!
//! Pacing is the caller's job, see [`crate::aggregate`].

use crate::config::RequestPolicy;
use crate::error::{OptionExt, Result, SurveyError};
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// E-utilities base URL
const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";

/// Database searched
const DB: &str = "pubmed";

/// Result ordering requested from esearch
const SORT: &str = "relevance";

/// Maximum identifiers returned per query. A yearly count above this aborts
/// the run rather than silently truncating the id list.
pub const RETMAX: u32 = 2000;

/// Records matching one search term
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Total matches reported by the service
    pub count: u64,
    /// PubMed identifiers of the matches
    pub ids: Vec<String>,
}

/// Something that can run a search term and report its matches.
///
/// [`EntrezClient`] talks to PubMed; tests substitute canned results.
pub trait CountFetcher {
    fn search(&self, query: &str) -> impl Future<Output = Result<SearchResult>> + Send;
}

/// PubMed esearch client
pub struct EntrezClient {
    client: reqwest::Client,
    endpoint: Url,
    email: String,
    policy: RequestPolicy,
}

impl EntrezClient {
    /// Create a client against the public E-utilities endpoint
    ///
    /// # Arguments
    ///
    /// * `email` - Contact address required by NCBI
    /// * `policy` - Tool name and optional API key
    pub fn new(email: impl Into<String>, policy: RequestPolicy) -> Result<Self> {
        Self::with_base_url(EUTILS_BASE, email, policy)
    }

    /// Create a client against a custom E-utilities base URL (mirrors, tests)
    pub fn with_base_url(
        base_url: &str,
        email: impl Into<String>,
        policy: RequestPolicy,
    ) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| SurveyError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        let endpoint = base
            .join("esearch.fcgi")
            .map_err(|e| SurveyError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", policy.tool, env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SurveyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            email: email.into(),
            policy,
        })
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the esearch GET request for `query`, contact details attached
    pub fn build_request(&self, query: &str) -> Result<reqwest::Request> {
        let retmax = RETMAX.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("db", DB),
            ("sort", SORT),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
            ("term", query),
            ("tool", self.policy.tool.as_str()),
            ("email", self.email.as_str()),
        ];
        if let Some(key) = self.policy.api_key.as_deref() {
            params.push(("api_key", key));
        }

        Ok(self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .build()?)
    }

    async fn do_search(&self, query: &str) -> Result<SearchResult> {
        debug!(query = query, "Querying esearch");

        let request = self.build_request(query)?;
        let response = self.client.execute(request).await?;

        if let Err(e) = check_status(response.status()) {
            warn!(query = query, status = response.status().as_u16(), "esearch request rejected");
            return Err(e);
        }

        let body = response.text().await?;
        parse_esearch(&body, query)
    }
}

/// Map a non-success HTTP status to an error.
pub fn check_status(status: reqwest::StatusCode) -> Result<()> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SurveyError::RateLimited);
    }

    if !status.is_success() {
        return Err(SurveyError::Api {
            code: status.as_u16(),
            message: format!("esearch returned {}", status),
        });
    }

    Ok(())
}

impl CountFetcher for EntrezClient {
    fn search(&self, query: &str) -> impl Future<Output = Result<SearchResult>> + Send {
        self.do_search(query)
    }
}

// === esearch Response Types ===

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: Option<EsearchResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// Parse an esearch JSON body and check it is complete.
///
/// Fails when the service reports an error, when the body lacks a count, when
/// fewer ids came back than matched (raise [`RETMAX`]), or when an id repeats.
pub fn parse_esearch(body: &str, query: &str) -> Result<SearchResult> {
    if body.trim().is_empty() {
        return Err(SurveyError::Parse("empty esearch response".to_string()));
    }

    let response: EsearchResponse = serde_json::from_str(body)
        .map_err(|e| SurveyError::Parse(format!("malformed esearch response: {}", e)))?;

    if let Some(message) = response.error {
        return Err(SurveyError::Api { code: 0, message });
    }

    let result = response
        .esearchresult
        .ok_or_parse("esearch response has no 'esearchresult'")?;

    if let Some(message) = result.error {
        return Err(SurveyError::Api { code: 0, message });
    }

    let count: u64 = result
        .count
        .ok_or_parse("esearch response has no 'count'")?
        .trim()
        .parse()
        .map_err(|e| SurveyError::Parse(format!("non-numeric esearch count: {}", e)))?;

    if count != result.idlist.len() as u64 {
        return Err(SurveyError::Validation(format!(
            "Found {} papers but only {} ids were returned for '{}'; increase RETMAX ({})",
            count,
            result.idlist.len(),
            query,
            RETMAX
        )));
    }

    let mut unique = HashSet::with_capacity(result.idlist.len());
    if let Some(dup) = result.idlist.iter().find(|id| !unique.insert(id.as_str())) {
        return Err(SurveyError::Validation(format!(
            "Non-unique id {} returned for '{}'",
            dup, query
        )));
    }

    Ok(SearchResult {
        count,
        ids: result.idlist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const QUERY: &str = "(kidney* OR renal) AND BOLD AND MRI AND 2019[PDAT]";

    #[test]
    fn test_parse_esearch() -> Result<()> {
        let body = r#"{
            "header": {"type": "esearch", "version": "0.3"},
            "esearchresult": {
                "count": "3", "retmax": "3", "retstart": "0",
                "idlist": ["31278684", "31762715", "31069053"],
                "querytranslation": "..."
            }
        }"#;
        let result = parse_esearch(body, QUERY)?;
        assert_eq!(result.count, 3);
        assert_eq!(result.ids, vec!["31278684", "31762715", "31069053"]);
        Ok(())
    }

    #[test]
    fn test_parse_esearch_zero_matches() -> Result<()> {
        let body = r#"{"esearchresult": {"count": "0", "retmax": "0", "idlist": []}}"#;
        let result = parse_esearch(body, QUERY)?;
        assert_eq!(result, SearchResult::default());
        Ok(())
    }

    #[test]
    fn test_parse_esearch_truncated_list() {
        let body = r#"{"esearchresult": {"count": "2500", "retmax": "1", "idlist": ["1"]}}"#;
        let err = parse_esearch(body, QUERY).err();
        assert!(matches!(err, Some(SurveyError::Validation(msg)) if msg.contains("RETMAX")));
    }

    #[test]
    fn test_parse_esearch_duplicate_ids() {
        let body = r#"{"esearchresult": {"count": "2", "idlist": ["7", "7"]}}"#;
        assert!(matches!(
            parse_esearch(body, QUERY),
            Err(SurveyError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_esearch_reported_error() {
        let body = r#"{"esearchresult": {"ERROR": "Invalid query syntax"}}"#;
        assert!(matches!(
            parse_esearch(body, QUERY),
            Err(SurveyError::Api { code: 0, .. })
        ));

        let body = r#"{"error": "API rate limit exceeded", "count": "11"}"#;
        assert!(matches!(
            parse_esearch(body, QUERY),
            Err(SurveyError::Api { .. })
        ));
    }

    #[test]
    fn test_parse_esearch_malformed() {
        assert!(matches!(parse_esearch("", QUERY), Err(SurveyError::Parse(_))));
        assert!(matches!(parse_esearch("<html>", QUERY), Err(SurveyError::Parse(_))));
        assert!(matches!(parse_esearch("{}", QUERY), Err(SurveyError::Parse(_))));
        assert!(matches!(
            parse_esearch(r#"{"esearchresult": {"count": "many", "idlist": []}}"#, QUERY),
            Err(SurveyError::Parse(_))
        ));
    }

    #[test]
    fn test_client_endpoint() -> Result<()> {
        let client = EntrezClient::new("someone@example.org", RequestPolicy::default())?;
        assert_eq!(
            client.endpoint().as_str(),
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi"
        );

        let mirror = EntrezClient::with_base_url(
            "http://localhost:8080/eutils/",
            "someone@example.org",
            RequestPolicy::default(),
        )?;
        assert_eq!(mirror.endpoint().as_str(), "http://localhost:8080/eutils/esearch.fcgi");
        Ok(())
    }

    fn query_pairs(request: &reqwest::Request) -> HashMap<String, String> {
        request.url().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_request_carries_contact_and_search_params() -> Result<()> {
        let client = EntrezClient::new("someone@example.org", RequestPolicy::default())?;
        let request = client.build_request(QUERY)?;
        let pairs = query_pairs(&request);

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/entrez/eutils/esearch.fcgi");
        assert_eq!(pairs.get("email").map(String::as_str), Some("someone@example.org"));
        assert_eq!(pairs.get("tool").map(String::as_str), Some("renal-mri-trends"));
        assert_eq!(pairs.get("db").map(String::as_str), Some("pubmed"));
        assert_eq!(pairs.get("sort").map(String::as_str), Some("relevance"));
        assert_eq!(pairs.get("retmax").map(String::as_str), Some("2000"));
        assert_eq!(pairs.get("retmode").map(String::as_str), Some("json"));
        assert_eq!(pairs.get("term").map(String::as_str), Some(QUERY));
        assert!(!pairs.contains_key("api_key"));
        Ok(())
    }

    #[test]
    fn test_request_includes_api_key_when_set() -> Result<()> {
        let policy = RequestPolicy {
            api_key: Some("abc123".to_string()),
            ..RequestPolicy::default()
        };
        let client = EntrezClient::new("someone@example.org", policy)?;
        let pairs = query_pairs(&client.build_request(QUERY)?);

        assert_eq!(pairs.get("api_key").map(String::as_str), Some("abc123"));
        assert_eq!(pairs.get("email").map(String::as_str), Some("someone@example.org"));
        Ok(())
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            Err(SurveyError::RateLimited)
        ));
        assert!(matches!(
            check_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            Err(SurveyError::Api { code: 500, .. })
        ));
        assert!(matches!(
            check_status(reqwest::StatusCode::BAD_REQUEST),
            Err(SurveyError::Api { code: 400, .. })
        ));
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let result = EntrezClient::with_base_url("not a url", "a@b.c", RequestPolicy::default());
        assert!(matches!(result, Err(SurveyError::Config(_))));
    }
}
