//! Per-document extraction and validation over a shared reference set.

use std::collections::BTreeSet;
use std::sync::Arc;

use mirbib_reference::{ReferenceIdentifierSet, ReferenceSources};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::extract::{self, TextField, TokenSplit};
use crate::validate::{self, ValidationPolicy};
use crate::{CoreError, Document, DocumentMentions};

/// Knobs for a [`MentionPipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub policy: ValidationPolicy,
    pub split: TokenSplit,
    /// Fields scanned for mentions, in concatenation order.
    pub fields: Vec<TextField>,
    /// Process documents on the rayon thread pool.
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            policy: ValidationPolicy::default(),
            split: TokenSplit::default(),
            fields: TextField::ALL.to_vec(),
            parallel: false,
        }
    }
}

/// Extracts and validates mentions document by document.
///
/// The reference set is read-only and shared, so documents are independent
/// of one another and may be processed in any order.
#[derive(Debug, Clone)]
pub struct MentionPipeline {
    reference: Arc<ReferenceIdentifierSet>,
    options: PipelineOptions,
}

impl MentionPipeline {
    pub fn new(reference: Arc<ReferenceIdentifierSet>, options: PipelineOptions) -> Self {
        Self { reference, options }
    }

    /// Load the reference files and build a pipeline over them.
    ///
    /// Unreadable or empty reference data fails here, before any document
    /// is looked at.
    pub fn from_sources(
        sources: &ReferenceSources,
        options: PipelineOptions,
    ) -> Result<Self, CoreError> {
        let reference = mirbib_reference::load(sources)?;
        Ok(Self::new(Arc::new(reference), options))
    }

    pub fn reference(&self) -> &ReferenceIdentifierSet {
        &self.reference
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Candidates of one document, before validation.
    pub fn candidates(&self, doc: &Document) -> BTreeSet<String> {
        extract::document_candidates(doc, &self.options.fields, self.options.split)
    }

    pub fn process(&self, doc: &Document) -> DocumentMentions {
        let candidates = self.candidates(doc);
        let validated =
            validate::validate_candidates(&candidates, &self.reference, self.options.policy);

        tracing::debug!(
            row = doc.row,
            candidates = candidates.len(),
            validated = validated.len(),
            "processed document"
        );

        DocumentMentions {
            row: doc.row,
            year: doc.year,
            authors: doc.authors.clone(),
            candidates,
            validated,
        }
    }

    /// Process every document, preserving input order.
    pub fn process_all(&self, docs: &[Document]) -> Vec<DocumentMentions> {
        self.process_all_with_progress(docs, |_| {})
    }

    /// Like [`MentionPipeline::process_all`], calling `progress` after each
    /// document. With `parallel` set the callback runs on worker threads.
    pub fn process_all_with_progress(
        &self,
        docs: &[Document],
        progress: impl Fn(&DocumentMentions) + Send + Sync,
    ) -> Vec<DocumentMentions> {
        let results: Vec<DocumentMentions> = if self.options.parallel {
            docs.par_iter()
                .map(|doc| {
                    let mentions = self.process(doc);
                    progress(&mentions);
                    mentions
                })
                .collect()
        } else {
            docs.iter()
                .map(|doc| {
                    let mentions = self.process(doc);
                    progress(&mentions);
                    mentions
                })
                .collect()
        };

        let stats = CorpusStats::from_results(&results);
        tracing::info!(
            documents = stats.documents,
            with_mentions = stats.documents_with_mentions,
            candidates = stats.candidates,
            validated = stats.validated,
            distinct = stats.distinct_identifiers,
            policy = %self.options.policy,
            "corpus processed"
        );

        results
    }
}

/// Summary counts over a processed corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub documents: usize,
    /// Documents with at least one validated identifier.
    pub documents_with_mentions: usize,
    /// Sum of per-document candidate counts.
    pub candidates: usize,
    /// Sum of per-document validated counts.
    pub validated: usize,
    /// Distinct validated identifiers across the corpus.
    pub distinct_identifiers: usize,
}

impl CorpusStats {
    pub fn from_results(results: &[DocumentMentions]) -> Self {
        let distinct: BTreeSet<&str> = results
            .iter()
            .flat_map(|r| r.validated.iter().map(String::as_str))
            .collect();

        Self {
            documents: results.len(),
            documents_with_mentions: results.iter().filter(|r| r.count() > 0).count(),
            candidates: results.iter().map(|r| r.candidates.len()).sum(),
            validated: results.iter().map(DocumentMentions::count).sum(),
            distinct_identifiers: distinct.len(),
        }
    }
}
