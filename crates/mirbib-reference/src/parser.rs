//! Line parsers for miRBase flat files.
//!
//! Two formats are understood:
//! - `miRNA.dat` (EMBL-style precursor records). Only the `DE` definition line is used:
//!   ```text
//!   DE   Homo sapiens miR-21 stem-loop
//!   ```
//! - `mature.fa` (FASTA). Only header lines are used:
//!   ```text
//!   >hsa-miR-21-5p MIMAT0000076 Homo sapiens miR-21-5p
//!   ```

/// Record tag of precursor definition lines.
pub const DEFINITION_TAG: &str = "DE";

/// Organism marker used when none is configured (matches "Homo sapiens").
pub const DEFAULT_ORGANISM: &str = "homo";

/// Position of the identifier in a definition line split on single spaces.
///
/// The run of spaces after `DE` produces empty fields, so for
/// `DE   Homo sapiens miR-21 stem-loop` the fields are
/// `["DE", "", "", "Homo", "sapiens", "miR-21", "stem-loop"]`.
pub const IDENTIFIER_FIELD: usize = 5;

/// Outcome of parsing one reference line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// The line is eligible and yielded a normalized identifier.
    Identifier(String),
    /// Not a record of interest (wrong tag, wrong organism, sequence line).
    Ineligible,
    /// Eligible, but no identifier at the expected position.
    Malformed,
}

/// Case-insensitive organism substring filter. `None` accepts every species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganismFilter(Option<String>);

impl OrganismFilter {
    pub fn new(marker: Option<&str>) -> Self {
        Self(
            marker
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty()),
        )
    }

    /// Accept records of every species.
    pub fn any() -> Self {
        Self(None)
    }

    pub fn marker(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn matches(&self, line: &str) -> bool {
        match &self.0 {
            Some(marker) => line.to_lowercase().contains(marker.as_str()),
            None => true,
        }
    }
}

impl Default for OrganismFilter {
    fn default() -> Self {
        Self::new(Some(DEFAULT_ORGANISM))
    }
}

/// Collapse en-dash and em-dash to an ASCII hyphen.
pub fn normalize_dashes(s: &str) -> String {
    s.replace(['\u{2013}', '\u{2014}'], "-")
}

/// Parse a line of a `miRNA.dat` file.
pub fn parse_precursor_line(line: &str, organism: &OrganismFilter) -> ParsedLine {
    let tag = line.split(' ').next().unwrap_or("");
    if !tag.contains(DEFINITION_TAG) || !organism.matches(line) {
        return ParsedLine::Ineligible;
    }

    match line.trim().split(' ').nth(IDENTIFIER_FIELD) {
        Some(field) if !field.is_empty() => ParsedLine::Identifier(normalize_dashes(field)),
        _ => ParsedLine::Malformed,
    }
}

/// Parse a line of a `mature.fa` file.
pub fn parse_mature_line(line: &str, organism: &OrganismFilter) -> ParsedLine {
    let line = line.trim();
    if !line.starts_with('>') || !organism.matches(line) {
        return ParsedLine::Ineligible;
    }

    // A header holding only the `>name` token has no identifier field. Its
    // last field would keep the `>` and could never match a `miR-` candidate.
    match line.split(' ').next_back() {
        Some(field) if !field.is_empty() && !field.starts_with('>') => {
            ParsedLine::Identifier(normalize_dashes(field))
        }
        _ => ParsedLine::Malformed,
    }
}
