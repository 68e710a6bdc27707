pub mod config;
pub mod embedding;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, CollectorConfig, RetryConfig, SourceConfig};
pub use embedding::{EmbeddingClient, TextAnalysis};
pub use error::ConfigError;
pub use types::*;
