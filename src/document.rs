//! Document types - extracted medical articles keyed by source URL
//!
//! Every article carries the same seven text sections:
//! - `title`: article heading
//! - `causes`: what brings the condition on
//! - `symptoms`: how it presents
//! - `first_aid`: what to do
//! - `contraindications`: what not to do
//! - `alternative_names`: synonyms for the condition
//! - `example_query`: a sample user question the article answers

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The fields a caller supplies when writing a document.
///
/// Any section left as `None` is stored as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub title: Option<String>,
    pub causes: Option<String>,
    pub symptoms: Option<String>,
    pub alternative_names: Option<String>,
    pub first_aid: Option<String>,
    pub contraindications: Option<String>,
    pub example_query: Option<String>,
}

impl DocumentFields {
    /// Create fields from the four sections every extraction produces
    pub fn new(
        title: Option<String>,
        causes: Option<String>,
        symptoms: Option<String>,
        alternative_names: Option<String>,
    ) -> Self {
        Self {
            title,
            causes,
            symptoms,
            alternative_names,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_causes(mut self, causes: impl Into<String>) -> Self {
        self.causes = Some(causes.into());
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl Into<String>) -> Self {
        self.symptoms = Some(symptoms.into());
        self
    }

    pub fn with_alternative_names(mut self, names: impl Into<String>) -> Self {
        self.alternative_names = Some(names.into());
        self
    }

    pub fn with_first_aid(mut self, first_aid: impl Into<String>) -> Self {
        self.first_aid = Some(first_aid.into());
        self
    }

    pub fn with_contraindications(mut self, contraindications: impl Into<String>) -> Self {
        self.contraindications = Some(contraindications.into());
        self
    }

    pub fn with_example_query(mut self, query: impl Into<String>) -> Self {
        self.example_query = Some(query.into());
        self
    }

    /// Materialize a full record, normalizing absent sections to `""`
    pub fn into_record(self, url: impl Into<String>, updated_at: NaiveDateTime) -> DocumentRecord {
        DocumentRecord {
            url: url.into(),
            title: self.title.unwrap_or_default(),
            causes: self.causes.unwrap_or_default(),
            symptoms: self.symptoms.unwrap_or_default(),
            first_aid: self.first_aid.unwrap_or_default(),
            contraindications: self.contraindications.unwrap_or_default(),
            alternative_names: self.alternative_names.unwrap_or_default(),
            example_query: self.example_query.unwrap_or_default(),
            updated_at,
        }
    }
}

/// A stored document, copied out of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Source URL, the primary key
    pub url: String,
    pub title: String,
    pub causes: String,
    pub symptoms: String,
    pub first_aid: String,
    pub contraindications: String,
    pub alternative_names: String,
    pub example_query: String,
    /// Naive UTC time of the last write
    pub updated_at: NaiveDateTime,
}

impl DocumentRecord {
    /// Whether every text section is empty
    pub fn is_blank(&self) -> bool {
        [
            &self.title,
            &self.causes,
            &self.symptoms,
            &self.first_aid,
            &self.contraindications,
            &self.alternative_names,
            &self.example_query,
        ]
        .iter()
        .all(|s| s.is_empty())
    }
}
