//! Year and author pivots over processed documents.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Range, RangeInclusive};

use serde::Serialize;

use crate::DocumentMentions;

/// Publication years accepted into a [`YearMatrix`].
pub const PUBLICATION_YEARS: RangeInclusive<i32> = 1000..=9999;

/// Identifier x year counts of distinct documents.
///
/// Years form a contiguous range from the earliest to the latest publication
/// year; years without documents are present with zero counts. Documents
/// without a year, or with one outside [`PUBLICATION_YEARS`], are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearMatrix {
    years: Vec<i32>,
    papers: Vec<usize>,
    rows: BTreeMap<String, Vec<usize>>,
}

/// One identifier's yearly counts, masked before its first appearance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentionTrend {
    pub identifier: String,
    /// Parallel to [`YearMatrix::trend_years`]; `None` before the first year
    /// with a positive count.
    pub counts: Vec<Option<usize>>,
    pub total: usize,
    /// Mean over the unmasked years, rounded to two decimals.
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopEntry {
    pub identifier: String,
    pub count: usize,
    /// Also in the top list of at least one other year.
    pub recurring: bool,
}

/// The most mentioned identifiers of one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearTop {
    pub year: i32,
    /// Documents published that year (with or without mentions).
    pub papers: usize,
    pub entries: Vec<TopEntry>,
}

impl YearMatrix {
    pub fn build(results: &[DocumentMentions]) -> Self {
        let dated = |r: &DocumentMentions| r.year.filter(|y| PUBLICATION_YEARS.contains(y));

        let Some((min, max)) = results
            .iter()
            .filter_map(dated)
            .fold(None, |acc: Option<(i32, i32)>, y| match acc {
                Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
                None => Some((y, y)),
            })
        else {
            return Self::default();
        };

        let years: Vec<i32> = (min..=max).collect();
        let mut papers = vec![0; years.len()];
        let mut rows: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for result in results {
            let Some(year) = dated(result) else {
                if let Some(year) = result.year {
                    tracing::warn!(row = result.row, year, "publication year out of range, skipped");
                }
                continue;
            };
            let idx = (year - min) as usize;
            papers[idx] += 1;
            for id in &result.validated {
                rows.entry(id.clone()).or_insert_with(|| vec![0; years.len()])[idx] += 1;
            }
        }

        Self {
            years,
            papers,
            rows,
        }
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Years from the first to the last with a validated mention; the columns
    /// of [`trends`](Self::trends).
    pub fn trend_years(&self) -> &[i32] {
        &self.years[self.mention_span()]
    }

    /// `(year, documents published that year)` for every year in range.
    pub fn papers_per_year(&self) -> impl Iterator<Item = (i32, usize)> + '_ {
        self.years.iter().copied().zip(self.papers.iter().copied())
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn row(&self, identifier: &str) -> Option<&[usize]> {
        self.rows.get(identifier).map(Vec::as_slice)
    }

    pub fn count(&self, identifier: &str, year: i32) -> usize {
        let Some(row) = self.rows.get(identifier) else {
            return 0;
        };
        self.year_index(year).map_or(0, |i| row[i])
    }

    /// Year with the most documents; the earliest wins ties.
    pub fn peak_year(&self) -> Option<(i32, usize)> {
        self.papers_per_year()
            .filter(|&(_, n)| n > 0)
            .fold(None, |best, (year, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((year, n)),
            })
    }

    /// Per-identifier trend rows over [`trend_years`](Self::trend_years),
    /// most mentioned first.
    ///
    /// Trailing years whose documents carry no mentions are not columns, so
    /// they do not lower the averages.
    pub fn trends(&self) -> Vec<MentionTrend> {
        let span = self.mention_span();
        let mut trends: Vec<MentionTrend> = self
            .rows
            .iter()
            .map(|(id, row)| {
                let row = &row[span.clone()];
                let first = row.iter().position(|&c| c > 0).unwrap_or(row.len());
                let counts: Vec<Option<usize>> = row
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| (i >= first).then_some(c))
                    .collect();
                let total: usize = row.iter().sum();
                let observed = counts.iter().flatten().count();
                let average = if observed == 0 {
                    0.0
                } else {
                    round2(total as f64 / observed as f64)
                };
                MentionTrend {
                    identifier: id.clone(),
                    counts,
                    total,
                    average,
                }
            })
            .collect();

        trends.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.identifier.cmp(&b.identifier)));
        trends
    }

    /// Up to `n` identifiers with the highest positive count for each year.
    pub fn top_per_year(&self, n: usize) -> Vec<YearTop> {
        let mut per_year: Vec<(i32, usize, Vec<(String, usize)>)> = Vec::with_capacity(self.years.len());
        let mut appearances: HashMap<&str, usize> = HashMap::new();

        for (idx, &year) in self.years.iter().enumerate() {
            let mut ranked: Vec<(&str, usize)> = self
                .rows
                .iter()
                .map(|(id, row)| (id.as_str(), row[idx]))
                .filter(|&(_, c)| c > 0)
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            ranked.truncate(n);

            for &(id, _) in &ranked {
                *appearances.entry(id).or_default() += 1;
            }
            per_year.push((
                year,
                self.papers[idx],
                ranked.into_iter().map(|(id, c)| (id.to_string(), c)).collect(),
            ));
        }

        per_year
            .into_iter()
            .map(|(year, papers, ranked)| YearTop {
                year,
                papers,
                entries: ranked
                    .into_iter()
                    .map(|(identifier, count)| TopEntry {
                        recurring: appearances.get(identifier.as_str()).copied().unwrap_or(0) > 1,
                        identifier,
                        count,
                    })
                    .collect(),
            })
            .collect()
    }

    fn mention_span(&self) -> Range<usize> {
        let mentioned = |i: &usize| self.rows.values().any(|row| row[*i] > 0);
        let indices = 0..self.years.len();
        match (indices.clone().find(mentioned), indices.rev().find(mentioned)) {
            (Some(first), Some(last)) => first..last + 1,
            _ => 0..0,
        }
    }

    fn year_index(&self, year: i32) -> Option<usize> {
        let first = *self.years.first()?;
        let idx = usize::try_from(year - first).ok()?;
        (idx < self.years.len()).then_some(idx)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Author x identifier counts.
///
/// Every document adds one to each (author, validated identifier) pair it
/// contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorMatrix {
    counts: BTreeMap<String, BTreeMap<String, usize>>,
    documents: BTreeMap<String, usize>,
}

impl AuthorMatrix {
    pub fn build(results: &[DocumentMentions]) -> Self {
        let mut matrix = Self::default();

        for result in results {
            let authors: BTreeSet<&str> = result
                .authors
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .collect();

            for author in authors {
                *matrix.documents.entry(author.to_string()).or_default() += 1;
                let row = matrix.counts.entry(author.to_string()).or_default();
                for id in &result.validated {
                    *row.entry(id.clone()).or_default() += 1;
                }
            }
        }

        matrix
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers().is_empty()
    }

    pub fn authors(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Every identifier with a positive count for some author, sorted.
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.counts
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    pub fn count(&self, author: &str, identifier: &str) -> usize {
        self.counts
            .get(author)
            .and_then(|row| row.get(identifier))
            .copied()
            .unwrap_or(0)
    }

    /// Documents listing `author`, with or without mentions.
    pub fn documents(&self, author: &str) -> usize {
        self.documents.get(author).copied().unwrap_or(0)
    }

    /// Number of distinct authors with a positive count for `identifier`.
    pub fn authors_for(&self, identifier: &str) -> usize {
        self.counts
            .values()
            .filter(|row| row.get(identifier).is_some_and(|&c| c > 0))
            .count()
    }

    /// Keep identifiers studied by at least `min_authors` distinct authors.
    pub fn filter_min_authors(mut self, min_authors: usize) -> Self {
        let keep: BTreeSet<String> = self
            .identifiers()
            .into_iter()
            .filter(|id| self.authors_for(id) >= min_authors)
            .map(str::to_string)
            .collect();

        for row in self.counts.values_mut() {
            row.retain(|id, _| keep.contains(id));
        }
        self
    }

    /// Keep the `n` authors with the most documents (name order breaks ties).
    pub fn top_authors(mut self, n: usize) -> Self {
        let mut ranked: Vec<(&String, &usize)> = self.documents.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let keep: BTreeSet<String> = ranked.into_iter().take(n).map(|(a, _)| a.clone()).collect();

        self.counts.retain(|a, _| keep.contains(a));
        self.documents.retain(|a, _| keep.contains(a));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mentions(year: Option<i32>, authors: &[&str], ids: &[&str]) -> DocumentMentions {
        DocumentMentions {
            year,
            authors: authors.iter().map(|s| s.to_string()).collect(),
            validated: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    // =========================================================================
    // Year matrix
    // =========================================================================

    #[test]
    fn test_year_range_filled() {
        let results = vec![
            mentions(Some(2015), &[], &["miR-21"]),
            mentions(Some(2018), &[], &["miR-21", "miR-155"]),
            mentions(None, &[], &["miR-31"]),
        ];
        let m = YearMatrix::build(&results);
        assert_eq!(m.years(), &[2015, 2016, 2017, 2018]);
        assert_eq!(m.row("miR-21"), Some(&[1, 0, 0, 1][..]));
        assert_eq!(m.count("miR-155", 2018), 1);
        assert_eq!(m.count("miR-155", 2030), 0);
        assert_eq!(m.row("miR-31"), None);
    }

    #[test]
    fn test_papers_counted_without_mentions() {
        let results = vec![
            mentions(Some(2020), &[], &[]),
            mentions(Some(2020), &[], &["miR-21"]),
            mentions(Some(2021), &[], &[]),
        ];
        let m = YearMatrix::build(&results);
        let papers: Vec<(i32, usize)> = m.papers_per_year().collect();
        assert_eq!(papers, vec![(2020, 2), (2021, 1)]);
        assert_eq!(m.peak_year(), Some((2020, 2)));
    }

    #[test]
    fn test_empty_when_no_years() {
        let m = YearMatrix::build(&[mentions(None, &[], &["miR-21"])]);
        assert!(m.is_empty());
        assert!(m.years().is_empty());
        assert_eq!(m.peak_year(), None);
        assert!(m.top_per_year(5).is_empty());
    }

    #[test]
    fn test_peak_year_tie_prefers_earliest() {
        let results = vec![mentions(Some(2010), &[], &[]), mentions(Some(2012), &[], &[])];
        assert_eq!(YearMatrix::build(&results).peak_year(), Some((2010, 1)));
    }

    #[test]
    fn test_trends_mask_and_stats() {
        let results = vec![
            mentions(Some(2010), &[], &["miR-155"]),
            mentions(Some(2011), &[], &["miR-21"]),
            mentions(Some(2012), &[], &[]),
            mentions(Some(2013), &[], &["miR-21"]),
            mentions(Some(2013), &[], &["miR-21"]),
        ];
        let trends = YearMatrix::build(&results).trends();

        assert_eq!(trends[0].identifier, "miR-21");
        assert_eq!(trends[0].counts, vec![None, Some(1), Some(0), Some(2)]);
        assert_eq!(trends[0].total, 3);
        assert_eq!(trends[0].average, 1.0);

        assert_eq!(trends[1].identifier, "miR-155");
        assert_eq!(trends[1].counts, vec![Some(1), Some(0), Some(0), Some(0)]);
        assert_eq!(trends[1].average, 0.25);
    }

    #[test]
    fn test_trend_average_rounded() {
        let results = vec![
            mentions(Some(2000), &[], &["miR-1"]),
            mentions(Some(2001), &[], &["miR-2"]),
            mentions(Some(2002), &[], &["miR-2"]),
        ];
        let trends = YearMatrix::build(&results).trends();
        let mir1 = trends.iter().find(|t| t.identifier == "miR-1").unwrap();
        assert_eq!(mir1.average, 0.33);
    }

    #[test]
    fn test_trends_skip_years_without_mentions() {
        let results = vec![
            mentions(Some(2008), &[], &[]),
            mentions(Some(2010), &[], &["miR-21"]),
            mentions(Some(2011), &[], &[]),
        ];
        let m = YearMatrix::build(&results);
        assert_eq!(m.years(), &[2008, 2009, 2010, 2011]);
        assert_eq!(m.trend_years(), &[2010]);

        let trends = m.trends();
        assert_eq!(trends[0].counts, vec![Some(1)]);
        assert_eq!(trends[0].average, 1.0);

        // document years still drive the paper counts and top lists
        assert_eq!(m.papers_per_year().count(), 4);
        assert_eq!(m.top_per_year(3).len(), 4);
    }

    #[test]
    fn test_no_mentions_means_no_trend_years() {
        let m = YearMatrix::build(&[mentions(Some(2020), &[], &[])]);
        assert!(m.trend_years().is_empty());
        assert!(m.trends().is_empty());
    }

    #[test]
    fn test_out_of_range_years_skipped() {
        let results = vec![
            mentions(Some(2019), &[], &["miR-21"]),
            mentions(Some(99_999_999), &[], &["miR-21"]),
            mentions(Some(i32::MIN), &[], &["miR-155"]),
            mentions(Some(i32::MAX), &[], &[]),
        ];
        let m = YearMatrix::build(&results);
        assert_eq!(m.years(), &[2019]);
        assert_eq!(m.row("miR-21"), Some(&[1][..]));
        assert_eq!(m.row("miR-155"), None);
    }

    #[test]
    fn test_top_per_year_marks_recurring() {
        let results = vec![
            mentions(Some(2019), &[], &["miR-21", "miR-155"]),
            mentions(Some(2019), &[], &["miR-21"]),
            mentions(Some(2020), &[], &["miR-21", "miR-31"]),
        ];
        let tops = YearMatrix::build(&results).top_per_year(2);

        assert_eq!(tops.len(), 2);
        assert_eq!(tops[0].year, 2019);
        assert_eq!(tops[0].papers, 2);
        assert_eq!(
            tops[0].entries,
            vec![
                TopEntry { identifier: "miR-21".into(), count: 2, recurring: true },
                TopEntry { identifier: "miR-155".into(), count: 1, recurring: false },
            ]
        );
        assert_eq!(tops[1].entries[1].identifier, "miR-31");
        assert!(!tops[1].entries[1].recurring);
    }

    #[test]
    fn test_top_per_year_truncates() {
        let results = vec![mentions(Some(2019), &[], &["miR-1", "miR-2", "miR-3"])];
        let tops = YearMatrix::build(&results).top_per_year(2);
        let ids: Vec<&str> = tops[0].entries.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["miR-1", "miR-2"]);
    }

    // =========================================================================
    // Author matrix
    // =========================================================================

    #[test]
    fn test_author_counts() {
        let results = vec![
            mentions(None, &["Rossi M", "Bianchi L"], &["miR-21"]),
            mentions(None, &["Rossi M"], &["miR-21", "miR-155"]),
            mentions(None, &["Verdi G"], &[]),
        ];
        let m = AuthorMatrix::build(&results);
        assert_eq!(m.count("Rossi M", "miR-21"), 2);
        assert_eq!(m.count("Bianchi L", "miR-155"), 0);
        assert_eq!(m.documents("Rossi M"), 2);
        assert_eq!(m.documents("Verdi G"), 1);
        assert_eq!(m.authors_for("miR-21"), 2);
        assert_eq!(
            m.identifiers().into_iter().collect::<Vec<_>>(),
            vec!["miR-155", "miR-21"]
        );
    }

    #[test]
    fn test_duplicate_author_in_document_counted_once() {
        let m = AuthorMatrix::build(&[mentions(None, &["Rossi M", " Rossi M "], &["miR-21"])]);
        assert_eq!(m.count("Rossi M", "miR-21"), 1);
    }

    #[test]
    fn test_filter_min_authors() {
        let results = vec![
            mentions(None, &["A"], &["miR-21", "miR-155"]),
            mentions(None, &["B"], &["miR-21"]),
            mentions(None, &["C"], &["miR-21", "miR-31"]),
        ];
        let m = AuthorMatrix::build(&results).filter_min_authors(3);
        assert_eq!(m.identifiers().into_iter().collect::<Vec<_>>(), vec!["miR-21"]);
        assert_eq!(m.count("A", "miR-155"), 0);
        assert_eq!(m.authors().count(), 3);
    }

    #[test]
    fn test_top_authors() {
        let results = vec![
            mentions(None, &["A", "B"], &["miR-21"]),
            mentions(None, &["B"], &["miR-155"]),
            mentions(None, &["C"], &["miR-31"]),
        ];
        let m = AuthorMatrix::build(&results).top_authors(2);
        assert_eq!(m.authors().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(m.count("C", "miR-31"), 0);
        assert!(!m.identifiers().contains("miR-31"));
    }
}
