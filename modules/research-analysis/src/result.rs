use serde::{Deserialize, Serialize};

use crate::hdbscan::NOISE;

/// Output of one `analyze_corpus` call. Row `i` of `embeddings` and entry
/// `i` of `clusters` both describe document `i` of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub embeddings: Vec<Vec<f32>>,
    /// Cluster index from 0, or `-1` for noise.
    pub clusters: Vec<i32>,
    /// Sorted feature names of the term-weighting stage.
    pub vocabulary: Vec<String>,
}

impl AnalysisResult {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of distinct non-noise labels.
    pub fn cluster_count(&self) -> usize {
        self.clusters
            .iter()
            .filter(|&&l| l != NOISE)
            .max()
            .map_or(0, |&max| max as usize + 1)
    }

    pub fn noise_count(&self) -> usize {
        self.clusters.iter().filter(|&&l| l == NOISE).count()
    }

    /// Document indices carrying `label`, ascending.
    pub fn members(&self, label: i32) -> Vec<usize> {
        self.clusters
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }
}

// --- ReportRenderer trait ---

/// Turns an analysis into a human-readable document. Implementations live
/// outside this workspace.
pub trait ReportRenderer {
    fn render(&self, documents: &[String], result: &AnalysisResult) -> anyhow::Result<String>;
}
