use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use mirbib_reference::ReferenceIdentifierSet;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Truncation stops once fewer than this many characters remain.
pub const MIN_MATCH_CHARS: usize = 4;

/// Strand suffixes of mature identifiers, in the order they are looked for.
pub const STRAND_SUFFIXES: [&str; 2] = ["-5p", "-3p"];

/// How a candidate is reduced before it is matched against the reference set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Match the candidate as written, so `miR-21-5p` can resolve to the mature
    /// identifier `miR-21-5p`.
    #[default]
    MatureAware,
    /// Cut the strand suffix first, so `miR-21-5p` resolves to the precursor
    /// name `miR-21`.
    ImmatureStripped,
}

impl ValidationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPolicy::MatureAware => "mature",
            ValidationPolicy::ImmatureStripped => "immature",
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mature" | "mature_aware" | "mature-aware" => Ok(ValidationPolicy::MatureAware),
            "immature" | "immature_stripped" | "immature-stripped" | "precursor" => {
                Ok(ValidationPolicy::ImmatureStripped)
            }
            _ => Err(CoreError::InvalidSetting {
                key: "policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Cut `candidate` before the first `-5p`, or failing that the first `-3p`.
pub fn strip_strand_suffix(candidate: &str) -> &str {
    for suffix in STRAND_SUFFIXES {
        if let Some(pos) = candidate.find(suffix) {
            return &candidate[..pos];
        }
    }
    candidate
}

/// Drop characters from the right of `candidate` until it is a member of
/// `reference`. The first hit wins; `None` once fewer than
/// [`MIN_MATCH_CHARS`] characters remain.
pub fn truncate_to_reference(candidate: &str, reference: &ReferenceIdentifierSet) -> Option<String> {
    let mut current = candidate.to_string();
    let mut remaining = current.chars().count();

    while remaining >= MIN_MATCH_CHARS {
        if reference.contains(&current) {
            return Some(current);
        }
        current.pop();
        remaining -= 1;
    }
    None
}

/// Resolve one candidate to a reference identifier under `policy`.
pub fn resolve(
    candidate: &str,
    reference: &ReferenceIdentifierSet,
    policy: ValidationPolicy,
) -> Option<String> {
    let start = match policy {
        ValidationPolicy::MatureAware => candidate,
        ValidationPolicy::ImmatureStripped => strip_strand_suffix(candidate),
    };
    truncate_to_reference(start, reference)
}

/// Validate a candidate set; unmatched candidates are dropped.
pub fn validate_candidates<I, S>(
    candidates: I,
    reference: &ReferenceIdentifierSet,
    policy: ValidationPolicy,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter_map(|c| resolve(c.as_ref(), reference, policy))
        .collect()
}

/// [`validate_candidates`] with [`ValidationPolicy::MatureAware`].
pub fn validate_mature_aware<I, S>(candidates: I, reference: &ReferenceIdentifierSet) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_candidates(candidates, reference, ValidationPolicy::MatureAware)
}

/// [`validate_candidates`] with [`ValidationPolicy::ImmatureStripped`].
pub fn validate_immature_stripped<I, S>(
    candidates: I,
    reference: &ReferenceIdentifierSet,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    validate_candidates(candidates, reference, ValidationPolicy::ImmatureStripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(ids: &[&str]) -> ReferenceIdentifierSet {
        ReferenceIdentifierSet::from_identifiers(ids)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Truncation
    // =========================================================================

    #[test]
    fn test_canonical_identifier_unchanged() {
        let refs = reference(&["miR-21-5p", "miR-21"]);
        assert_eq!(
            truncate_to_reference("miR-21-5p", &refs).as_deref(),
            Some("miR-21-5p")
        );
        assert_eq!(
            resolve("miR-21", &refs, ValidationPolicy::ImmatureStripped).as_deref(),
            Some("miR-21")
        );
    }

    #[test]
    fn test_trailing_letter_truncated() {
        let refs = reference(&["miR-21"]);
        assert_eq!(
            resolve("miR-21a", &refs, ValidationPolicy::MatureAware).as_deref(),
            Some("miR-21")
        );
    }

    #[test]
    fn test_first_match_wins() {
        // "miR-1" is hit before the longer but absent forms
        let refs = reference(&["miR-1", "miR-12"]);
        assert_eq!(
            resolve("miR-123x", &refs, ValidationPolicy::MatureAware).as_deref(),
            Some("miR-12")
        );
        assert_eq!(
            resolve("miR-19b", &refs, ValidationPolicy::MatureAware).as_deref(),
            Some("miR-1")
        );
    }

    #[test]
    fn test_floor_never_matches_short_strings() {
        let refs = reference(&["miR", "mi", "m", "mir"]);
        assert_eq!(truncate_to_reference("miR-x", &refs), None);
        assert_eq!(truncate_to_reference("miR", &refs), None);
        assert_eq!(truncate_to_reference("", &refs), None);
    }

    #[test]
    fn test_four_characters_still_checked() {
        let refs = reference(&["miR-"]);
        assert_eq!(truncate_to_reference("miR-zzz", &refs).as_deref(), Some("miR-"));
    }

    #[test]
    fn test_multibyte_characters_popped_whole() {
        let refs = reference(&["miR-21"]);
        assert_eq!(
            truncate_to_reference("miR-21\u{3b1}\u{3b2}", &refs).as_deref(),
            Some("miR-21")
        );
    }

    // =========================================================================
    // Strand suffix handling
    // =========================================================================

    #[test]
    fn test_strip_strand_suffix() {
        assert_eq!(strip_strand_suffix("miR-21-5p"), "miR-21");
        assert_eq!(strip_strand_suffix("miR-155-3p"), "miR-155");
        assert_eq!(strip_strand_suffix("miR-21"), "miR-21");
        // -5p is looked for before -3p regardless of position
        assert_eq!(strip_strand_suffix("miR-1-3p-5p"), "miR-1-3p");
    }

    #[test]
    fn test_immature_policy_strips_suffix() {
        let refs = reference(&["miR-21"]);
        assert_eq!(
            resolve("miR-21-5p", &refs, ValidationPolicy::ImmatureStripped).as_deref(),
            Some("miR-21")
        );
    }

    #[test]
    fn test_policies_differ_on_mature_reference() {
        let refs = reference(&["miR-21", "miR-21-5p"]);
        assert_eq!(
            validate_mature_aware(["miR-21-5p"], &refs),
            set(&["miR-21-5p"])
        );
        assert_eq!(
            validate_immature_stripped(["miR-21-5p"], &refs),
            set(&["miR-21"])
        );
    }

    // =========================================================================
    // Sets
    // =========================================================================

    #[test]
    fn test_unmatched_dropped_and_results_deduplicated() {
        let refs = reference(&["miR-21", "miR-155"]);
        let validated = validate_mature_aware(
            ["miR-21", "miR-21a", "miR-155-3p", "miR-family"],
            &refs,
        );
        assert_eq!(validated, set(&["miR-155", "miR-21"]));
    }

    #[test]
    fn test_policy_parse_round_trip() {
        for policy in [ValidationPolicy::MatureAware, ValidationPolicy::ImmatureStripped] {
            assert_eq!(policy.as_str().parse::<ValidationPolicy>().unwrap(), policy);
        }
        assert!("greedy".parse::<ValidationPolicy>().is_err());
    }
}
