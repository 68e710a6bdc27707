use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "ResearchBot/1.0";
pub const GOOGLE_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

// =============================================================================
// Source settings
// =============================================================================

/// Immutable per-source settings, resolved before any collection starts.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: String,
    /// Already-resolved secret. Never read from the environment by adapters.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Source-specific query parameters (e.g. `cx` for Google custom search).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("params", &self.params)
            .finish()
    }
}

// =============================================================================
// Collection settings
// =============================================================================

/// Exponential backoff settings. Delay after the n-th failed attempt is
/// `multiplier * exp_base^(n-1)`, clamped to `[min_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub multiplier_ms: u64,
    pub exp_base: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier_ms: 1_000,
            exp_base: 2.0,
            min_delay_ms: 4_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub user_agent: String,
    /// Minimum spacing between successive source calls.
    pub min_interval_ms: u64,
    /// Per network call.
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub sources: BTreeMap<String, SourceConfig>,
    /// Sources used when the caller does not name any.
    pub default_sources: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_interval_ms: 1_000,
            request_timeout_ms: 10_000,
            retry: RetryConfig::default(),
            sources: BTreeMap::new(),
            default_sources: vec!["google".to_string(), "arxiv".to_string()],
        }
    }
}

impl CollectorConfig {
    /// Resolve endpoints and secrets from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// A source whose endpoint or required parameters cannot be resolved is
    /// left out of `sources`; asking for it later fails as a configuration error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(agent) = get("RESEARCH_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(raw) = get("RESEARCH_RATE_LIMIT_MS") {
            config.min_interval_ms = raw.parse().map_err(|e| ConfigError::Invalid {
                key: "RESEARCH_RATE_LIMIT_MS".to_string(),
                message: format!("{e}"),
            })?;
        }

        if let (Some(key), Some(cx)) = (get("SEARCH_API_KEY"), get("GOOGLE_CX")) {
            let endpoint =
                get("GOOGLE_SEARCH_ENDPOINT").unwrap_or_else(|| GOOGLE_SEARCH_ENDPOINT.to_string());
            config.sources.insert(
                "google".to_string(),
                SourceConfig::new(endpoint)
                    .with_api_key(key)
                    .with_param("cx", cx),
            );
        }

        if let Some(endpoint) = get("ARXIV_ENDPOINT") {
            let mut source = SourceConfig::new(endpoint);
            source.api_key = get("ARXIV_API_KEY");
            config.sources.insert("arxiv".to_string(), source);
        }

        Ok(config)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }

    /// Log the resolved configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            user_agent = self.user_agent.as_str(),
            min_interval_ms = self.min_interval_ms,
            request_timeout_ms = self.request_timeout_ms,
            max_attempts = self.retry.max_attempts,
            sources = ?self.sources.keys().collect::<Vec<_>>(),
            "Collector configuration resolved"
        );
    }
}

// =============================================================================
// Analysis settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Vocabulary cap for the term weighting stage.
    pub max_features: usize,
    /// Embedding dimensionality.
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f32,
    /// Unset lets the reducer choose from the corpus size.
    pub n_epochs: Option<usize>,
    pub min_cluster_size: usize,
    /// Defaults to `min_cluster_size` when unset.
    pub min_samples: Option<usize>,
    /// Fixes every stochastic step. Unseeded runs may differ between calls.
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_features: 5_000,
            n_components: 50,
            n_neighbors: 15,
            min_dist: 0.1,
            n_epochs: None,
            min_cluster_size: 5,
            min_samples: None,
            seed: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
