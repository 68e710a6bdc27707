use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Cannot analyze an empty corpus")]
    EmptyCorpus,

    #[error("Empty vocabulary: no document contains a term")]
    EmptyVocabulary,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),
}
