pub mod error;
pub mod hdbscan;
pub mod matrix;
pub mod pipeline;
pub mod reducer;
pub mod result;
pub mod vectorizer;

pub use error::AnalysisError;
pub use hdbscan::{DensityClusterer, NOISE};
pub use matrix::SparseMatrix;
pub use pipeline::AnalysisPipeline;
pub use reducer::ManifoldReducer;
pub use result::{AnalysisResult, ReportRenderer};
pub use vectorizer::{tokenize, TermMatrix, TfIdfVectorizer};
