//! Accumulates identifiers from precursor and mature record streams.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::parser::{self, OrganismFilter, ParsedLine};
use crate::{LoadStats, ReferenceError, ReferenceIdentifierSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Precursor,
    Mature,
}

impl RecordKind {
    fn as_str(self) -> &'static str {
        match self {
            RecordKind::Precursor => "precursor",
            RecordKind::Mature => "mature",
        }
    }
}

/// Builder for a [`ReferenceIdentifierSet`].
///
/// Lines are pushed one at a time so that callers can feed files, in-memory
/// fixtures or decompressed streams alike. Nothing is fatal until
/// [`ReferenceBuilder::finish`], which rejects an empty result.
#[derive(Debug, Default)]
pub struct ReferenceBuilder {
    organism: OrganismFilter,
    identifiers: BTreeSet<String>,
    stats: LoadStats,
}

impl ReferenceBuilder {
    pub fn new(organism: OrganismFilter) -> Self {
        Self {
            organism,
            identifiers: BTreeSet::new(),
            stats: LoadStats::default(),
        }
    }

    pub fn push_precursor_line(&mut self, line: &str) {
        self.stats.precursor_lines += 1;
        let parsed = parser::parse_precursor_line(line, &self.organism);
        self.record(RecordKind::Precursor, parsed, self.stats.precursor_lines);
    }

    pub fn push_mature_line(&mut self, line: &str) {
        self.stats.mature_lines += 1;
        let parsed = parser::parse_mature_line(line, &self.organism);
        self.record(RecordKind::Mature, parsed, self.stats.mature_lines);
    }

    pub fn precursor_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push_precursor_line(line.as_ref());
        }
        self
    }

    pub fn mature_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push_mature_line(line.as_ref());
        }
        self
    }

    /// Stream a `miRNA.dat` file (plain or `.gz`) into the builder.
    pub fn precursor_file(mut self, path: &Path) -> Result<Self, ReferenceError> {
        for_each_line(path, |line| self.push_precursor_line(line))?;
        Ok(self)
    }

    /// Stream a `mature.fa` file (plain or `.gz`) into the builder.
    pub fn mature_file(mut self, path: &Path) -> Result<Self, ReferenceError> {
        for_each_line(path, |line| self.push_mature_line(line))?;
        Ok(self)
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    /// Freeze the accumulated identifiers.
    ///
    /// Returns [`ReferenceError::Empty`] when no line yielded an identifier.
    pub fn finish(self) -> Result<ReferenceIdentifierSet, ReferenceError> {
        if self.identifiers.is_empty() {
            return Err(ReferenceError::Empty {
                organism: self.organism.marker().map(str::to_string),
            });
        }

        tracing::info!(
            identifiers = self.identifiers.len(),
            precursor = self.stats.precursor_identifiers,
            mature = self.stats.mature_identifiers,
            malformed = self.stats.malformed,
            "reference identifier set built"
        );

        Ok(ReferenceIdentifierSet::from_parts(
            self.identifiers,
            self.stats,
        ))
    }

    fn record(&mut self, kind: RecordKind, parsed: ParsedLine, line_no: u64) {
        match parsed {
            ParsedLine::Identifier(id) => {
                match kind {
                    RecordKind::Precursor => self.stats.precursor_identifiers += 1,
                    RecordKind::Mature => self.stats.mature_identifiers += 1,
                }
                self.identifiers.insert(id);
            }
            ParsedLine::Malformed => {
                self.stats.malformed += 1;
                tracing::debug!(
                    source = kind.as_str(),
                    line = line_no,
                    "skipping malformed reference line"
                );
            }
            ParsedLine::Ineligible => {}
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a reference file, transparently decompressing `.gz`.
fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, ReferenceError> {
    let file = File::open(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_gzip(path) {
        let decoder = flate2::read::GzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(256 * 1024, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(256 * 1024, file)))
    }
}

/// Call `f` for every line of `path`.
///
/// miRBase releases are ASCII in practice, but a stray Latin-1 byte must not
/// abort a whole load, so undecodable bytes are replaced rather than rejected.
fn for_each_line(path: &Path, mut f: impl FnMut(&str)) -> Result<(), ReferenceError> {
    let mut reader = open_reader(path)?;
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| ReferenceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        f(&String::from_utf8_lossy(&buf));
    }

    tracing::debug!(path = %path.display(), "finished reading reference file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DAT: &str = "\
ID   hsa-mir-21        standard; RNA; HSA; 72 BP.
XX
AC   MI0000077;
XX
DE   Homo sapiens miR-21 stem-loop
XX
ID   mmu-mir-21a       standard; RNA; MMU; 92 BP.
DE   Mus musculus miR-21a stem-loop
DE   Homo sapiens
";

    const MATURE: &str = "\
>hsa-miR-21-5p MIMAT0000076 Homo sapiens miR-21-5p
UAGCUUAUCAGACUGAUGUUGA
>hsa-miR-21-3p MIMAT0004494 Homo sapiens miR-21-3p
CAACACCAGUCGAUGGGCUGU
>mmu-miR-21a-5p MIMAT0000530 Mus musculus miR-21a-5p
UAGCUUAUCAGACUGAUGUUGA
";

    #[test]
    fn test_builds_from_lines() {
        let set = ReferenceBuilder::new(OrganismFilter::default())
            .precursor_lines(DAT.lines())
            .mature_lines(MATURE.lines())
            .finish()
            .unwrap();

        let ids: Vec<&str> = set.iter().collect();
        assert_eq!(ids, vec!["miR-21", "miR-21-3p", "miR-21-5p"]);
        assert_eq!(set.stats().precursor_identifiers, 1);
        assert_eq!(set.stats().mature_identifiers, 2);
        assert_eq!(set.stats().malformed, 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let set = ReferenceBuilder::new(OrganismFilter::default())
            .precursor_lines(["DE   Homo sapiens miR-21 stem-loop"; 3])
            .mature_lines([">hsa-miR-21 MIMAT0000000 Homo sapiens miR-21"])
            .finish()
            .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_empty_is_error() {
        let err = ReferenceBuilder::new(OrganismFilter::default())
            .precursor_lines(["DE   Mus musculus miR-21a stem-loop"])
            .finish()
            .unwrap_err();
        assert!(matches!(err, ReferenceError::Empty { organism: Some(ref o) } if o == "homo"));
    }

    #[test]
    fn test_reads_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();

        let dat_path = dir.path().join("miRNA.dat");
        std::fs::write(&dat_path, DAT).unwrap();

        let mature_path = dir.path().join("mature.fa.gz");
        let file = File::create(&mature_path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(MATURE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let set = ReferenceBuilder::new(OrganismFilter::default())
            .precursor_file(&dat_path)
            .unwrap()
            .mature_file(&mature_path)
            .unwrap()
            .finish()
            .unwrap();

        assert!(set.contains("miR-21"));
        assert!(set.contains("miR-21-5p"));
        assert!(!set.contains("miR-21a-5p"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ReferenceBuilder::default()
            .precursor_file(Path::new("/nonexistent/miRNA.dat"))
            .unwrap_err();
        match err {
            ReferenceError::Io { path, .. } => assert!(path.ends_with("miRNA.dat")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
