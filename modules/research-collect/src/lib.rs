pub mod adapters;
pub mod collector;
pub mod error;
pub mod observer;
pub mod rate_limiter;
pub mod retry;

pub use adapters::{build_adapter, AdapterRegistry, ArxivAdapter, GoogleAdapter, SourceAdapter};
pub use collector::Collector;
pub use error::{Result, SourceError};
pub use observer::{CollectionObserver, TracingObserver};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
