// Google Custom Search adapter.

use async_trait::async_trait;
use chrono::Utc;
use research_common::{ConfigError, Record, SourceConfig};
use serde::Deserialize;
use tracing::info;

use super::{get_json, require_endpoint, SourceAdapter};
use crate::error::Result;

const DEFAULT_NUM_RESULTS: &str = "10";

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

pub struct GoogleAdapter {
    endpoint: String,
    api_key: String,
    cx: String,
    /// Extra query parameters forwarded verbatim (`num` overrides the default).
    params: Vec<(String, String)>,
    client: reqwest::Client,
}

impl GoogleAdapter {
    pub fn new(source: &SourceConfig, client: reqwest::Client) -> Result<Self> {
        let endpoint = require_endpoint("google", source)?;
        let api_key = source
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::Missing("google: api_key".to_string()))?;
        let cx = source
            .param("cx")
            .filter(|cx| !cx.is_empty())
            .ok_or_else(|| ConfigError::Missing("google: cx parameter".to_string()))?
            .to_string();
        let params = source
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "cx")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            endpoint,
            api_key,
            cx,
            params,
            client,
        })
    }

    fn query_params(&self, query: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("key".to_string(), self.api_key.clone()),
            ("cx".to_string(), self.cx.clone()),
        ];
        if !self.params.iter().any(|(k, _)| k == "num") {
            params.push(("num".to_string(), DEFAULT_NUM_RESULTS.to_string()));
        }
        params.extend(self.params.iter().cloned());
        params
    }
}

#[async_trait]
impl SourceAdapter for GoogleAdapter {
    fn name(&self) -> &str {
        "google"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Record>> {
        info!(query, "Google custom search");

        let data: GoogleResponse =
            get_json(&self.client, &self.endpoint, &self.query_params(query)).await?;

        let now = Utc::now();
        let records: Vec<Record> = data
            .items
            .into_iter()
            .map(|item| {
                Record::new("google")
                    .with_title(item.title.unwrap_or_default())
                    .with_snippet(item.snippet.unwrap_or_default())
                    .with_url(item.link.unwrap_or_default())
                    .with_timestamp(now)
            })
            .collect();

        info!(query, count = records.len(), "Google custom search complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use mockito::{Matcher, Server};

    fn config(endpoint: &str) -> SourceConfig {
        SourceConfig::new(endpoint)
            .with_api_key("test-key")
            .with_param("cx", "engine-7")
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let source = SourceConfig::new("http://x").with_param("cx", "engine-7");
        let err = GoogleAdapter::new(&source, reqwest::Client::new()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required configuration: google: api_key"
        );
    }

    #[test]
    fn missing_cx_is_a_configuration_error() {
        let source = SourceConfig::new("http://x").with_api_key("k");
        let err = GoogleAdapter::new(&source, reqwest::Client::new()).err().unwrap();
        assert!(matches!(err, SourceError::Config(ref m) if m.contains("cx")));
    }

    #[test]
    fn num_defaults_to_ten_and_can_be_overridden() {
        let adapter = GoogleAdapter::new(&config("http://x"), reqwest::Client::new()).unwrap();
        let params = adapter.query_params("q");
        assert!(params.contains(&("num".to_string(), "10".to_string())));

        let source = config("http://x").with_param("num", "5");
        let adapter = GoogleAdapter::new(&source, reqwest::Client::new()).unwrap();
        let nums: Vec<_> = adapter
            .query_params("q")
            .into_iter()
            .filter(|(k, _)| k == "num")
            .collect();
        assert_eq!(nums, vec![("num".to_string(), "5".to_string())]);
    }

    #[tokio::test]
    async fn maps_items_in_response_order() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/customsearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "quantum computing".into()),
                Matcher::UrlEncoded("key".into(), "test-key".into()),
                Matcher::UrlEncoded("cx".into(), "engine-7".into()),
                Matcher::UrlEncoded("num".into(), "10".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items": [
                    {"title": "First", "snippet": "one", "link": "https://a.example"},
                    {"title": "Second", "link": "https://b.example"},
                    {"snippet": null}
                ]}"#,
            )
            .create_async()
            .await;

        let endpoint = format!("{}/customsearch", server.url());
        let adapter = GoogleAdapter::new(&config(&endpoint), reqwest::Client::new()).unwrap();
        let records = adapter.fetch("quantum computing").await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[0].snippet, "one");
        assert_eq!(records[0].url, "https://a.example");
        assert_eq!(records[1].title, "Second");
        assert_eq!(records[1].snippet, "");
        assert_eq!(records[2].title, "");
        assert!(records.iter().all(|r| r.source == "google"));
    }

    #[tokio::test]
    async fn response_without_items_yields_no_records() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/customsearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"searchInformation": {"totalResults": "0"}}"#)
            .create_async()
            .await;

        let endpoint = format!("{}/customsearch", server.url());
        let adapter = GoogleAdapter::new(&config(&endpoint), reqwest::Client::new()).unwrap();
        assert!(adapter.fetch("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/customsearch")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let endpoint = format!("{}/customsearch", server.url());
        let adapter = GoogleAdapter::new(&config(&endpoint), reqwest::Client::new()).unwrap();
        let err = adapter.fetch("q").await.unwrap_err();

        assert!(err.is_transient());
        match err {
            SourceError::Http { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "backend unavailable");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/customsearch")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let endpoint = format!("{}/customsearch", server.url());
        let adapter = GoogleAdapter::new(&config(&endpoint), reqwest::Client::new()).unwrap();
        assert!(matches!(adapter.fetch("q").await, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let adapter =
            GoogleAdapter::new(&config("http://127.0.0.1:1/search"), reqwest::Client::new())
                .unwrap();
        let err = adapter.fetch("q").await.unwrap_err();
        assert!(matches!(err, SourceError::Network(_)));
        assert!(err.is_transient());
    }
}
