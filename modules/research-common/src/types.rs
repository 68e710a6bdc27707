use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized result returned by a source adapter.
///
/// Every adapter maps its native response items onto this shape. Fields the
/// source did not provide are empty strings, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub snippet: String,
    pub url: String,
    /// Name of the source that produced the record (e.g. "google", "arxiv").
    pub source: String,
    /// When the record was collected, not when the content was published.
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            snippet: String::new(),
            url: String::new(),
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Ordered documents submitted for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    documents: Vec<String>,
}

impl Corpus {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }

    /// Build a corpus from collected records, keeping record order and
    /// skipping records whose snippet is blank.
    pub fn from_records(records: &[Record]) -> Self {
        let documents = records
            .iter()
            .map(|r| r.snippet.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { documents }
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn into_documents(self) -> Vec<String> {
        self.documents
    }
}

impl From<Vec<String>> for Corpus {
    fn from(documents: Vec<String>) -> Self {
        Self::new(documents)
    }
}

impl From<Vec<&str>> for Corpus {
    fn from(documents: Vec<&str>) -> Self {
        Self::new(documents.into_iter().map(str::to_string).collect())
    }
}
