// arXiv search adapter. Expects a JSON gateway in front of the arXiv query API
// returning `{ "items": [{ "title", "summary", "link" | "id" }] }`.

use async_trait::async_trait;
use chrono::Utc;
use research_common::{Record, SourceConfig};
use serde::Deserialize;
use tracing::info;

use super::{get_json, require_endpoint, SourceAdapter};
use crate::error::Result;

const DEFAULT_MAX_RESULTS: &str = "10";

#[derive(Debug, Deserialize)]
struct ArxivResponse {
    #[serde(default)]
    items: Vec<ArxivEntry>,
}

#[derive(Debug, Deserialize)]
struct ArxivEntry {
    title: Option<String>,
    summary: Option<String>,
    link: Option<String>,
    id: Option<String>,
}

pub struct ArxivAdapter {
    endpoint: String,
    api_key: Option<String>,
    params: Vec<(String, String)>,
    client: reqwest::Client,
}

impl ArxivAdapter {
    pub fn new(source: &SourceConfig, client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            endpoint: require_endpoint("arxiv", source)?,
            api_key: source.api_key.clone().filter(|k| !k.is_empty()),
            params: source
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            client,
        })
    }

    fn query_params(&self, query: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("search_query".to_string(), format!("all:{query}")),
            ("start".to_string(), "0".to_string()),
        ];
        if !self.params.iter().any(|(k, _)| k == "max_results") {
            params.push(("max_results".to_string(), DEFAULT_MAX_RESULTS.to_string()));
        }
        if let Some(key) = &self.api_key {
            params.push(("key".to_string(), key.clone()));
        }
        params.extend(self.params.iter().cloned());
        params
    }
}

/// arXiv titles and abstracts arrive hard-wrapped.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Record>> {
        info!(query, "arxiv: searching");

        let data: ArxivResponse =
            get_json(&self.client, &self.endpoint, &self.query_params(query)).await?;

        let now = Utc::now();
        let records: Vec<Record> = data
            .items
            .into_iter()
            .map(|entry| {
                Record::new("arxiv")
                    .with_title(collapse_whitespace(&entry.title.unwrap_or_default()))
                    .with_snippet(collapse_whitespace(&entry.summary.unwrap_or_default()))
                    .with_url(entry.link.or(entry.id).unwrap_or_default())
                    .with_timestamp(now)
            })
            .collect();

        info!(query, count = records.len(), "arxiv: search complete");
        Ok(records)
    }
}
