use research_common::{AnalysisConfig, Corpus};
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::hdbscan::DensityClusterer;
use crate::reducer::ManifoldReducer;
use crate::result::AnalysisResult;
use crate::vectorizer::TfIdfVectorizer;

/// Vectorize, reduce, then cluster. Stages hold only parameters, so one
/// pipeline can analyze any number of corpora.
#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    vectorizer: TfIdfVectorizer,
    reducer: ManifoldReducer,
    clusterer: DensityClusterer,
}

impl AnalysisPipeline {
    pub fn new(
        vectorizer: TfIdfVectorizer,
        reducer: ManifoldReducer,
        clusterer: DensityClusterer,
    ) -> Result<Self> {
        vectorizer.validate()?;
        reducer.validate()?;
        clusterer.validate()?;
        Ok(Self {
            vectorizer,
            reducer,
            clusterer,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let mut reducer =
            ManifoldReducer::new(config.n_components, config.n_neighbors, config.min_dist)
                .with_seed(config.seed);
        if let Some(n_epochs) = config.n_epochs {
            reducer = reducer.with_epochs(n_epochs);
        }
        Self::new(
            TfIdfVectorizer::new(config.max_features),
            reducer,
            DensityClusterer::new(config.min_cluster_size).with_min_samples(config.min_samples),
        )
    }

    /// Any stage error propagates; there is no partial result.
    pub fn analyze_corpus<S: AsRef<str>>(&self, documents: &[S]) -> Result<AnalysisResult> {
        if documents.is_empty() {
            return Err(AnalysisError::EmptyCorpus);
        }
        info!(documents = documents.len(), "Analyzing corpus");

        let terms = self.vectorizer.fit_transform(documents)?;
        let embeddings = self.reducer.fit_transform(&terms.matrix)?;
        debug!(
            rows = embeddings.len(),
            dims = self.reducer.n_components(),
            "Embeddings computed"
        );
        let clusters = self.clusterer.fit_predict(&embeddings)?;

        let result = AnalysisResult {
            embeddings,
            clusters,
            vocabulary: terms.vocabulary,
        };
        info!(
            clusters = result.cluster_count(),
            noise = result.noise_count(),
            "Corpus analyzed"
        );
        Ok(result)
    }

    pub fn analyze(&self, corpus: &Corpus) -> Result<AnalysisResult> {
        self.analyze_corpus(corpus.documents())
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self {
            vectorizer: TfIdfVectorizer::default(),
            reducer: ManifoldReducer::default(),
            clusterer: DensityClusterer::default(),
        }
    }
}
