use std::sync::Arc;

use research_common::{CollectorConfig, Record};

use crate::adapters::AdapterRegistry;
use crate::error::Result;
use crate::observer::{CollectionObserver, TracingObserver};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

/// Drives every requested source in order through the rate limiter and the
/// retry policy, isolating per-source failure.
pub struct Collector {
    registry: AdapterRegistry,
    default_sources: Vec<String>,
    retry: RetryPolicy,
    limiter: RateLimiter,
    observer: Arc<dyn CollectionObserver>,
}

impl Collector {
    pub fn new(registry: AdapterRegistry, retry: RetryPolicy, limiter: RateLimiter) -> Self {
        Self {
            default_sources: registry.names(),
            registry,
            retry,
            limiter,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Build adapters for every configured source. Misconfigured sources
    /// fail here rather than during collection.
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        config.log_redacted();
        let registry = AdapterRegistry::from_config(config)?;
        Ok(Self::new(
            registry,
            RetryPolicy::from_config(&config.retry),
            RateLimiter::new(config.min_interval()),
        )
        .with_default_sources(config.default_sources.clone()))
    }

    /// Resolve configuration from the environment, then build as
    /// [`Collector::from_config`] does.
    pub fn from_env() -> Result<Self> {
        let config = CollectorConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn with_observer(mut self, observer: Arc<dyn CollectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_default_sources(mut self, sources: Vec<String>) -> Self {
        self.default_sources = sources;
        self
    }

    pub fn default_sources(&self) -> &[String] {
        &self.default_sources
    }

    /// Collect records for `query` from `sources` (or the default set).
    ///
    /// Never fails: a source that errors after its last attempt, including an
    /// unknown source name, is reported to the observer and contributes zero
    /// records. Output order is source order, then each source's own order.
    pub async fn collect(&mut self, query: &str, sources: Option<&[&str]>) -> Vec<Record> {
        let sources: Vec<String> = match sources {
            Some(names) => names.iter().map(|s| s.to_string()).collect(),
            None => self.default_sources.clone(),
        };
        self.observer.collection_started(query, &sources);

        let mut records = Vec::new();
        let mut failed = 0;

        for name in &sources {
            self.limiter.wait().await;

            let registry = &self.registry;
            let name = name.as_str();
            let result = self
                .retry
                .run(name, move || async move { registry.get(name)?.fetch(query).await })
                .await;

            match result {
                Ok(batch) => {
                    self.observer.source_succeeded(name, batch.len());
                    records.extend(batch);
                }
                Err(e) => {
                    failed += 1;
                    self.observer.source_failed(name, &e);
                }
            }
        }

        self.observer.collection_finished(query, records.len(), failed);
        records
    }
}
