use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::matrix::SparseMatrix;

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Lowercased runs of word characters. Single-character tokens are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    RE_TOKEN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// TF-IDF weights together with the vocabulary naming each column.
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatrix {
    pub matrix: SparseMatrix,
    /// Sorted; column `i` of `matrix` is `vocabulary[i]`.
    pub vocabulary: Vec<String>,
}

/// Term frequency / inverse document frequency weighting over a capped
/// vocabulary. Each call to `fit_transform` builds a fresh vocabulary.
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    max_features: usize,
}

impl TfIdfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(AnalysisError::InvalidParameter(
                "max_features must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fit_transform<S: AsRef<str>>(&self, corpus: &[S]) -> Result<TermMatrix> {
        self.validate()?;
        if corpus.is_empty() {
            return Err(AnalysisError::EmptyCorpus);
        }

        let documents: Vec<Vec<String>> = corpus.iter().map(|d| tokenize(d.as_ref())).collect();

        // Corpus-wide counts, in term order.
        let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &documents {
            for token in tokens {
                *totals.entry(token.as_str()).or_default() += 1;
            }
        }
        if totals.is_empty() {
            return Err(AnalysisError::EmptyVocabulary);
        }

        let mut ranked: Vec<(&str, usize)> = totals.into_iter().collect();
        // Stable sort keeps term order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(self.max_features);

        let mut vocabulary: Vec<String> = ranked.iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();
        let index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut counts: Vec<BTreeMap<usize, f32>> = Vec::with_capacity(documents.len());
        let mut doc_freq = vec![0usize; vocabulary.len()];
        for tokens in &documents {
            let mut row: BTreeMap<usize, f32> = BTreeMap::new();
            for token in tokens {
                if let Some(&col) = index.get(token.as_str()) {
                    *row.entry(col).or_default() += 1.0;
                }
            }
            for &col in row.keys() {
                doc_freq[col] += 1;
            }
            counts.push(row);
        }

        let n = documents.len() as f32;
        let idf: Vec<f32> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        let rows: Vec<Vec<(usize, f32)>> = counts
            .into_iter()
            .map(|row| {
                let mut weighted: Vec<(usize, f32)> =
                    row.into_iter().map(|(c, tf)| (c, tf * idf[c])).collect();
                let norm = weighted.iter().map(|&(_, v)| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for (_, v) in &mut weighted {
                        *v /= norm;
                    }
                }
                weighted
            })
            .collect();

        let matrix = SparseMatrix::new(vocabulary.len(), rows)?;
        debug!(
            documents = matrix.n_rows(),
            terms = matrix.n_cols(),
            nnz = matrix.nnz(),
            "TF-IDF matrix built"
        );
        Ok(TermMatrix { matrix, vocabulary })
    }
}

impl Default for TfIdfVectorizer {
    fn default() -> Self {
        Self::new(5_000)
    }
}
