use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod config_file;
pub mod extract;
pub mod pipeline;
pub mod validate;

// Re-export for convenience
pub use aggregate::{AuthorMatrix, MentionTrend, TopEntry, YearMatrix, YearTop};
pub use extract::{TextField, TokenSplit};
pub use mirbib_reference::{OrganismFilter, ReferenceError, ReferenceIdentifierSet};
pub use pipeline::{CorpusStats, MentionPipeline, PipelineOptions};
pub use validate::ValidationPolicy;

/// One bibliographic record.
///
/// Fields missing from the source table are left empty; they simply contribute
/// no tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 0-based position in the source table.
    pub row: usize,
    pub title: String,
    pub abstract_text: String,
    /// Author keywords, `;`-separated as exported.
    pub keywords: String,
    pub year: Option<i32>,
    pub authors: Vec<String>,
}

/// Mentions found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMentions {
    pub row: usize,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    /// Normalized `miR-...` candidates before validation.
    pub candidates: BTreeSet<String>,
    /// Candidates that resolved to a reference identifier.
    pub validated: BTreeSet<String>,
}

impl DocumentMentions {
    /// Number of distinct validated identifiers.
    pub fn count(&self) -> usize {
        self.validated.len()
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for `{key}`")]
    InvalidSetting { key: &'static str, value: String },
}
