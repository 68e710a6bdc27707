pub mod arxiv;
pub mod google;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use research_common::{CollectorConfig, ConfigError, Record, SourceConfig};
use serde::de::DeserializeOwned;

use crate::error::{Result, SourceError};

pub use arxiv::ArxivAdapter;
pub use google::GoogleAdapter;

/// A source-specific fetch strategy producing normalized records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key and the value stamped into `Record::source`.
    fn name(&self) -> &str;

    /// One network call for `query`. Records keep the source's response order.
    async fn fetch(&self, query: &str) -> Result<Vec<Record>>;
}

/// Adapters keyed by source name.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per configured source. Fails on the first source
    /// that is unsupported or missing a required setting.
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (name, source) in &config.sources {
            let client = http_client(config)?;
            registry.register(build_adapter(name, source, client)?);
        }
        Ok(registry)
    }

    /// Add or replace the adapter registered under its own name.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn SourceAdapter>> {
        self.adapters
            .get(name)
            .ok_or_else(|| SourceError::Config(format!("Unsupported source: {name}")))
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Build an adapter based on source name.
pub fn build_adapter(
    name: &str,
    source: &SourceConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn SourceAdapter>> {
    match name {
        "google" => Ok(Arc::new(GoogleAdapter::new(source, client)?)),
        "arxiv" => Ok(Arc::new(ArxivAdapter::new(source, client)?)),
        other => Err(SourceError::Config(format!("Unsupported source: {other}"))),
    }
}

/// HTTP client carrying the collector's user agent and per-call timeout.
/// Each adapter gets its own.
pub fn http_client(config: &CollectorConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| SourceError::Config(format!("Failed to build HTTP client: {e}")))
}

/// GET `endpoint` with `params` and decode a JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    params: &[(String, String)],
) -> Result<T> {
    let resp = client.get(endpoint).query(params).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceError::Http {
            status: status.as_u16(),
            message: body,
        });
    }

    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Require a non-empty endpoint, naming the source in the error.
pub(crate) fn require_endpoint(source_name: &str, source: &SourceConfig) -> Result<String> {
    let endpoint = source.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Missing(format!("{source_name}: endpoint")).into());
    }
    Ok(endpoint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_name_is_a_configuration_error() {
        let err = build_adapter("bing", &SourceConfig::new("http://x"), reqwest::Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Config(ref m) if m.contains("bing")));
    }

    #[test]
    fn registry_builds_configured_sources() {
        let mut config = CollectorConfig::default();
        config.sources.insert(
            "google".into(),
            SourceConfig::new("http://google.test")
                .with_api_key("k")
                .with_param("cx", "cx-1"),
        );
        config
            .sources
            .insert("arxiv".into(), SourceConfig::new("http://arxiv.test"));

        let registry = AdapterRegistry::from_config(&config).unwrap();
        assert_eq!(registry.names(), vec!["arxiv", "google"]);
        assert_eq!(registry.get("google").unwrap().name(), "google");
        assert!(matches!(registry.get("bing"), Err(SourceError::Config(_))));
    }

    #[test]
    fn registry_rejects_misconfigured_source_up_front() {
        let mut config = CollectorConfig::default();
        config
            .sources
            .insert("google".into(), SourceConfig::new("http://google.test"));

        let err = AdapterRegistry::from_config(&config).err().unwrap();
        assert!(matches!(err, SourceError::Config(ref m) if m.contains("api_key")));
    }

    #[test]
    fn blank_endpoint_is_rejected() {
        let err = require_endpoint("arxiv", &SourceConfig::new("  ")).unwrap_err();
        assert!(matches!(err, SourceError::Config(ref m) if m.contains("arxiv")));
    }
}
