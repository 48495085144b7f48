use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use mirbib_reference::normalize_dashes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CoreError, Document};

/// Prefixes a lowercase token must start with to be considered a mention.
pub const CANDIDATE_PREFIXES: [&str; 2] = ["mir", "hsa-mir"];

/// Generic words that start like a mention but never name a specific miRNA.
pub const GENERIC_MENTIONS: [&str; 2] = ["mirna", "mirnas"];

/// Tokens must be strictly longer than this (in characters).
pub const MIN_TOKEN_CHARS: usize = 4;

/// Prefix every normalized candidate carries.
pub const CANONICAL_PREFIX: &str = "miR-";

/// Spellings of the miRNA prefix inside a token; the text after the last one is kept.
static MIR_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:mir-|mirna-|mir\.)").unwrap());

/// How raw text is cut into tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSplit {
    /// Split on whitespace only.
    #[default]
    Whitespace,
    /// Split on whitespace and `/` (so `mir-21/mir-155` yields two tokens).
    WhitespaceAndSlash,
}

impl TokenSplit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSplit::Whitespace => "whitespace",
            TokenSplit::WhitespaceAndSlash => "slash",
        }
    }

    fn is_separator(&self, c: char) -> bool {
        match self {
            TokenSplit::Whitespace => c.is_whitespace(),
            TokenSplit::WhitespaceAndSlash => c.is_whitespace() || c == '/',
        }
    }
}

impl fmt::Display for TokenSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenSplit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whitespace" | "space" => Ok(TokenSplit::Whitespace),
            "slash" | "whitespace_and_slash" | "whitespace-and-slash" => {
                Ok(TokenSplit::WhitespaceAndSlash)
            }
            _ => Err(CoreError::InvalidSetting {
                key: "split",
                value: s.to_string(),
            }),
        }
    }
}

/// Text fields of a [`Document`] that can be scanned for mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Keywords,
    Title,
    Abstract,
}

impl TextField {
    /// All fields, in the order their tokens are concatenated.
    pub const ALL: [TextField; 3] = [TextField::Keywords, TextField::Title, TextField::Abstract];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Keywords => "keywords",
            TextField::Title => "title",
            TextField::Abstract => "abstract",
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keywords" | "author_keywords" | "de" => Ok(TextField::Keywords),
            "title" | "ti" => Ok(TextField::Title),
            "abstract" | "ab" => Ok(TextField::Abstract),
            _ => Err(CoreError::InvalidSetting {
                key: "fields",
                value: s.to_string(),
            }),
        }
    }
}

/// Lowercase `text` and cut it into non-empty tokens.
pub fn tokenize(text: &str, split: TokenSplit) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| split.is_separator(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens of the selected fields of `doc`, in field order.
///
/// Keyword cells hold a `;`-separated list, so they are cut on `;` before
/// the regular split.
pub fn document_tokens(doc: &Document, fields: &[TextField], split: TokenSplit) -> Vec<String> {
    let mut tokens = Vec::new();
    for field in fields {
        match field {
            TextField::Keywords => {
                for keyword in doc.keywords.split(';') {
                    tokens.extend(tokenize(keyword, split));
                }
            }
            TextField::Title => tokens.extend(tokenize(&doc.title, split)),
            TextField::Abstract => tokens.extend(tokenize(&doc.abstract_text, split)),
        }
    }
    tokens
}

/// Whether a lowercase token looks like a specific miRNA mention.
pub fn is_candidate(token: &str) -> bool {
    CANDIDATE_PREFIXES.iter().any(|p| token.starts_with(*p))
        && token.chars().count() > MIN_TOKEN_CHARS
        && !GENERIC_MENTIONS.contains(&token)
}

/// Rewrite a candidate token into `miR-<suffix>` form.
///
/// ```
/// use mirbib_core::extract::normalize_candidate;
///
/// assert_eq!(normalize_candidate("hsa-mir-21-5p"), "miR-21-5p");
/// assert_eq!(normalize_candidate("mirna-155"), "miR-155");
/// assert_eq!(normalize_candidate("mir.143"), "miR-143");
/// ```
pub fn normalize_candidate(token: &str) -> String {
    let clean = normalize_dashes(token);
    let suffix = MIR_PREFIX_RE.split(&clean).last().unwrap_or("");
    format!("{CANONICAL_PREFIX}{suffix}")
}

/// Filter and normalize `tokens` into a deduplicated candidate set.
pub fn extract_candidates<I, S>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .filter(|t| is_candidate(t.as_ref()))
        .map(|t| normalize_candidate(t.as_ref()))
        .collect()
}

/// Candidates found in the selected fields of one document.
pub fn document_candidates(
    doc: &Document,
    fields: &[TextField],
    split: TokenSplit,
) -> BTreeSet<String> {
    extract_candidates(document_tokens(doc, fields, split))
}
