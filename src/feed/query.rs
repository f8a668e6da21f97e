use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::QueryError;
use crate::events::FilingEvent;

/// One bounded historical search.
#[derive(Clone, Debug, PartialEq)]
pub struct FilingSearch {
    pub ticker: String,
    pub form_types: Vec<String>,
    pub filed_since: NaiveDate,
    pub size: usize,
}

impl FilingSearch {
    /// Lucene-style query string understood by the query API.
    pub fn query_string(&self) -> String {
        let forms = self
            .form_types
            .iter()
            .map(|f| format!("\"{}\"", f))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "ticker:{} AND formType:({}) AND filedAt:[{} TO *]",
            self.ticker,
            forms,
            self.filed_since.format("%Y-%m-%d")
        )
    }

    pub fn request_body(&self) -> serde_json::Value {
        json!({
            "query": { "query_string": { "query": self.query_string() } },
            "from": "0",
            "size": self.size.to_string(),
            "sort": [{ "filedAt": { "order": "desc" } }],
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchTotal {
    #[serde(default)]
    pub value: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub filings: Vec<FilingEvent>,
    #[serde(default = "empty_total")]
    pub total: SearchTotal,
}

fn empty_total() -> SearchTotal {
    SearchTotal { value: 0 }
}

#[async_trait]
pub trait FilingQuery: Send + Sync {
    async fn search(&self, search: &FilingSearch) -> Result<SearchResults, QueryError>;
}

#[derive(Clone)]
pub struct QueryApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl QueryApiClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl FilingQuery for QueryApiClient {
    async fn search(&self, search: &FilingSearch) -> Result<SearchResults, QueryError> {
        info!("🔎 Query API: {}", search.query_string());

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("token", self.api_key.as_str())])
            .json(&search.request_body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(QueryError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search() -> FilingSearch {
        FilingSearch {
            ticker: "PDI".to_string(),
            form_types: vec!["8-K".to_string(), "N-CSR".to_string()],
            filed_since: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            size: 25,
        }
    }

    #[test]
    fn test_query_string() {
        assert_eq!(
            search().query_string(),
            r#"ticker:PDI AND formType:("8-K" OR "N-CSR") AND filedAt:[2024-03-01 TO *]"#
        );
    }

    #[test]
    fn test_request_body_sorts_newest_first() {
        let body = search().request_body();
        assert_eq!(body["size"], "25");
        assert_eq!(body["from"], "0");
        assert_eq!(body["sort"][0]["filedAt"]["order"], "desc");
    }

    #[test]
    fn test_search_results_deserialize() {
        let json = r#"{"total":{"value":2,"relation":"eq"},"filings":[
            {"ticker":"PDI","formType":"8-K","companyName":"PIMCO Dynamic Income Fund",
             "filedAt":"2024-05-01T16:30:00-04:00","linkToTxt":"https://x/a.txt",
             "linkToFilingDetails":"https://x/index.htm","cik":"1510599"}]}"#;
        let results: SearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.total.value, 2);
        assert_eq!(results.filings.len(), 1);
        assert_eq!(results.filings[0].company_name, "PIMCO Dynamic Income Fund");
    }
}
