//! miRBase reference loader.
//!
//! Reads precursor definitions (`miRNA.dat`) and mature sequence headers
//! (`mature.fa`), optionally gzip-compressed, and freezes the identifiers they
//! name into an immutable [`ReferenceIdentifierSet`].

mod builder;
pub mod parser;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

// Re-export for convenience
pub use builder::ReferenceBuilder;
pub use parser::{DEFAULT_ORGANISM, OrganismFilter, normalize_dashes};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("failed to read reference file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference database yielded no identifiers (organism filter: {})", organism.as_deref().unwrap_or("<any>"))]
    Empty { organism: Option<String> },
}

/// Counters collected while building a reference set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Lines read from the precursor source.
    pub precursor_lines: u64,
    /// Precursor lines that yielded an identifier.
    pub precursor_identifiers: u64,
    /// Lines read from the mature source.
    pub mature_lines: u64,
    /// Mature headers that yielded an identifier.
    pub mature_identifiers: u64,
    /// Eligible lines skipped because the identifier field was missing.
    pub malformed: u64,
}

/// Locations of the two miRBase files plus the organism to keep.
#[derive(Debug, Clone)]
pub struct ReferenceSources {
    pub precursors: PathBuf,
    pub mature: PathBuf,
    pub organism: OrganismFilter,
}

/// Immutable set of canonical miRNA identifiers (e.g. `miR-21`, `miR-21-5p`).
#[derive(Debug, Clone, Default)]
pub struct ReferenceIdentifierSet {
    identifiers: BTreeSet<String>,
    stats: LoadStats,
}

impl ReferenceIdentifierSet {
    pub(crate) fn from_parts(identifiers: BTreeSet<String>, stats: LoadStats) -> Self {
        Self { identifiers, stats }
    }

    /// Build a set directly from identifier strings, applying the same dash
    /// normalization as the file loaders.
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers = identifiers
            .into_iter()
            .map(|id| normalize_dashes(id.as_ref().trim()))
            .filter(|id| !id.is_empty())
            .collect();
        Self {
            identifiers,
            stats: LoadStats::default(),
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

/// Load the reference set from the two miRBase files.
///
/// Fails if either file cannot be read or if nothing matched the organism
/// filter; callers should treat both as a precondition failure.
pub fn load(sources: &ReferenceSources) -> Result<ReferenceIdentifierSet, ReferenceError> {
    load_from_paths(&sources.precursors, &sources.mature, sources.organism.clone())
}

pub fn load_from_paths(
    precursors: &Path,
    mature: &Path,
    organism: OrganismFilter,
) -> Result<ReferenceIdentifierSet, ReferenceError> {
    ReferenceBuilder::new(organism)
        .precursor_file(precursors)?
        .mature_file(mature)?
        .finish()
}

/// Build the reference set from in-memory line sequences.
pub fn from_lines<P, M, S, T>(
    precursor_lines: P,
    mature_lines: M,
    organism: OrganismFilter,
) -> Result<ReferenceIdentifierSet, ReferenceError>
where
    P: IntoIterator<Item = S>,
    M: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    ReferenceBuilder::new(organism)
        .precursor_lines(precursor_lines)
        .mature_lines(mature_lines)
        .finish()
}
