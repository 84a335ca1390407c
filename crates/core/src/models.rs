use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstructionRecord {
    pub id: RecordId,
    pub title: String,
    pub content: String,
    /// Empty when no PDF is attached.
    pub pdf_path: String,
    pub created_at: DateTime<Utc>,
}

impl InstructionRecord {
    /// The text the fuzzy scorer runs against.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }

    pub fn has_attachment(&self) -> bool {
        !self.pdf_path.is_empty()
    }
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewInstruction {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub pdf_path: String,
}

impl NewInstruction {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        pdf_path: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let record = Self {
            title: title.into(),
            content: content.into(),
            pdf_path: pdf_path.into(),
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord("title must not be empty".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "content of '{}' must not be empty",
                self.title
            )));
        }
        Ok(())
    }
}

/// An uploaded document before it is placed on disk.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Operator-supplied title; the filename stem is used otherwise.
    pub title: Option<String>,
}

impl UploadedArtifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Fuzzy,
    Substring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub mode: SearchMode,
    /// Hits must score strictly above this.
    pub min_score: f64,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
            mode: SearchMode::Fuzzy,
            min_score: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: InstructionRecord,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub mode: SearchMode,
    /// Size of the snapshot the query was scored against.
    pub candidates: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
