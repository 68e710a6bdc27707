use tracing::{error, info};

use crate::error::SourceError;

/// Receives collection lifecycle events.
///
/// The collector holds one observer for its whole life; every method has a
/// no-op default so implementations only override what they record.
pub trait CollectionObserver: Send + Sync {
    fn collection_started(&self, _query: &str, _sources: &[String]) {}

    fn source_succeeded(&self, _source: &str, _count: usize) {}

    /// The source contributed zero records after its final attempt.
    fn source_failed(&self, _source: &str, _error: &SourceError) {}

    fn collection_finished(&self, _query: &str, _total: usize, _failed: usize) {}
}

/// Emits collection events as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CollectionObserver for TracingObserver {
    fn collection_started(&self, query: &str, sources: &[String]) {
        info!(query, ?sources, "Collection started");
    }

    fn source_succeeded(&self, source: &str, count: usize) {
        info!(source, count, "Source collected");
    }

    fn source_failed(&self, source: &str, error: &SourceError) {
        error!(source, error = %error, "Error collecting from source");
    }

    fn collection_finished(&self, query: &str, total: usize, failed: usize) {
        info!(query, total, failed, "Collection finished");
    }
}
