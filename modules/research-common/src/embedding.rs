use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Output of a single language-model analysis task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    pub task: String,
    pub result: String,
}

// --- EmbeddingClient trait ---

/// Language-model client consumed downstream of collection and clustering.
/// Implementations live outside this workspace.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// One vector per input text, in input order.
    async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn analyze_text(&self, text: &str, task: &str) -> Result<TextAnalysis>;
}
