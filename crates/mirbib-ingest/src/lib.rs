use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::read::GzDecoder;
use mirbib_core::aggregate::PUBLICATION_YEARS;
use thiserror::Error;

// Re-export the document model for convenience
pub use mirbib_core::Document;

/// Separator between names in an author cell.
const AUTHOR_SEPARATOR: char = ';';

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column {column:?} not found in header")]
    MissingColumn { column: String },
    #[error("unknown column preset {0:?} (expected `scopus` or `bibliometrix`)")]
    UnknownPreset(String),
}

/// Header names of the columns a [`Document`] is read from.
///
/// Only the title column is required; the others read as empty when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub title: String,
    pub abstract_text: String,
    pub keywords: String,
    pub year: String,
    pub authors: String,
}

impl ColumnMap {
    /// Column names of a Scopus CSV export.
    pub fn scopus() -> Self {
        Self {
            title: "Title".into(),
            abstract_text: "Abstract".into(),
            keywords: "Author Keywords".into(),
            year: "Year".into(),
            authors: "Authors".into(),
        }
    }

    /// Web of Science field tags, as written by bibliometrix.
    pub fn bibliometrix() -> Self {
        Self {
            title: "TI".into(),
            abstract_text: "AB".into(),
            keywords: "DE".into(),
            year: "PY".into(),
            authors: "AU".into(),
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::scopus()
    }
}

impl FromStr for ColumnMap {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scopus" => Ok(Self::scopus()),
            "bibliometrix" | "wos" => Ok(Self::bibliometrix()),
            _ => Err(IngestError::UnknownPreset(s.to_string())),
        }
    }
}

/// Resolved column positions for one header row.
struct ColumnIndex {
    title: usize,
    abstract_text: Option<usize>,
    keywords: Option<usize>,
    year: Option<usize>,
    authors: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &ColumnMap) -> Result<Self, IngestError> {
        let find = |name: &str| {
            headers.iter().position(|h| {
                // Scopus exports start with a UTF-8 byte order mark
                h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name.trim())
            })
        };

        let title = find(&columns.title).ok_or_else(|| IngestError::MissingColumn {
            column: columns.title.clone(),
        })?;

        let index = Self {
            title,
            abstract_text: find(&columns.abstract_text),
            keywords: find(&columns.keywords),
            year: find(&columns.year),
            authors: find(&columns.authors),
        };

        for (name, idx) in [
            (&columns.abstract_text, index.abstract_text),
            (&columns.keywords, index.keywords),
            (&columns.year, index.year),
            (&columns.authors, index.authors),
        ] {
            if idx.is_none() {
                tracing::warn!(column = %name, "column not found, reading it as empty");
            }
        }
        Ok(index)
    }
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Parse a publication year. Spreadsheet round-trips turn `2019` into
/// `2019.0`, so whole floats are accepted too. Years outside
/// [`PUBLICATION_YEARS`] read as `None`.
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let year = match raw.parse::<i32>() {
        Ok(year) => year,
        Err(_) => match raw.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => f as i32,
            _ => return None,
        },
    };
    PUBLICATION_YEARS.contains(&year).then_some(year)
}

/// Split an author cell into trimmed, non-empty names.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.split(AUTHOR_SEPARATOR)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read every row of a CSV export into [`Document`]s, in file order.
pub fn read_documents<R: Read>(reader: R, columns: &ColumnMap) -> Result<Vec<Document>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let index = ColumnIndex::resolve(rdr.headers()?, columns)?;

    let mut docs = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;

        let raw_year = cell(&record, index.year);
        let year = parse_year(raw_year);
        if year.is_none() && !raw_year.is_empty() {
            tracing::warn!(row, value = raw_year, "invalid publication year");
        }

        docs.push(Document {
            row,
            title: cell(&record, Some(index.title)).to_string(),
            abstract_text: cell(&record, index.abstract_text).to_string(),
            keywords: cell(&record, index.keywords).to_string(),
            year,
            authors: split_authors(cell(&record, index.authors)),
        });
    }

    tracing::info!(documents = docs.len(), "corpus read");
    Ok(docs)
}

/// Read a CSV export from disk; a `.gz` extension is decompressed on the fly.
pub fn read_documents_from_path(path: &Path, columns: &ColumnMap) -> Result<Vec<Document>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let is_gz = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));

    tracing::debug!(path = %path.display(), gzip = is_gz, "reading corpus");
    if is_gz {
        read_documents(GzDecoder::new(reader), columns)
    } else {
        read_documents(reader, columns)
    }
}
