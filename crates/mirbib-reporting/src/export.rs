use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use csv::Writer;
use mirbib_core::{AuthorMatrix, DocumentMentions, YearMatrix, YearTop};
use serde::Serialize;

use crate::ReportError;
use crate::types::ExportFormat;

/// Separator used when a set is flattened into one cell.
const LIST_SEPARATOR: &str = "; ";

/// Write a header and rows as one CSV table.
fn csv_table<R>(header: &[String], rows: impl IntoIterator<Item = R>) -> Result<String, ReportError>
where
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // every cell came from a String
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn strings<const N: usize>(cells: [&str; N]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn md_row(out: &mut String, cells: &[String]) {
    out.push('|');
    for cell in cells {
        let _ = write!(out, " {} |", md_escape(cell));
    }
    out.push('\n');
}

fn md_header(out: &mut String, cells: &[String]) {
    md_row(out, cells);
    out.push('|');
    for _ in cells {
        out.push_str("---|");
    }
    out.push('\n');
}

fn masked_cells(counts: &[Option<usize>]) -> Vec<String> {
    counts
        .iter()
        .map(|c| c.map(|n| n.to_string()).unwrap_or_default())
        .collect()
}

fn opt_year(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_default()
}

// =============================================================================
// Per-document results
// =============================================================================

#[derive(Serialize)]
struct DocumentRecord<'a> {
    row: usize,
    year: Option<i32>,
    count: usize,
    candidates: &'a BTreeSet<String>,
    validated: &'a BTreeSet<String>,
    authors: &'a [String],
}

/// Render per-document candidates and validated identifiers.
pub fn render_documents(
    results: &[DocumentMentions],
    format: ExportFormat,
) -> Result<String, ReportError> {
    match format {
        ExportFormat::Json => {
            let records: Vec<DocumentRecord<'_>> = results
                .iter()
                .map(|r| DocumentRecord {
                    row: r.row,
                    year: r.year,
                    count: r.count(),
                    candidates: &r.candidates,
                    validated: &r.validated,
                    authors: &r.authors,
                })
                .collect();
            Ok(serde_json::to_string_pretty(&records)? + "\n")
        }
        ExportFormat::Csv => csv_table(
            &strings(["Row", "Year", "Count", "Candidates", "Validated", "Authors"]),
            results.iter().map(|r| {
                [
                    r.row.to_string(),
                    opt_year(r.year),
                    r.count().to_string(),
                    join(&r.candidates),
                    join(&r.validated),
                    join(&r.authors),
                ]
            }),
        ),
        ExportFormat::Markdown => {
            let mut out = String::from("# miRNA mentions\n\n");
            md_header(&mut out, &strings(["Row", "Year", "Count", "Validated"]));
            for r in results {
                md_row(
                    &mut out,
                    &[
                        r.row.to_string(),
                        opt_year(r.year),
                        r.count().to_string(),
                        join(&r.validated),
                    ],
                );
            }
            Ok(out)
        }
    }
}

// =============================================================================
// Year trends
// =============================================================================

#[derive(Serialize)]
struct YearReport<'a> {
    years: &'a [i32],
    papers: Vec<usize>,
    trend_years: &'a [i32],
    trends: Vec<mirbib_core::MentionTrend>,
}

fn trend_row(t: &mirbib_core::MentionTrend) -> Vec<String> {
    let mut row = vec![t.identifier.clone()];
    row.extend(masked_cells(&t.counts));
    row.push(t.total.to_string());
    row.push(format!("{:.2}", t.average));
    row
}

/// Render the identifier x year matrix with totals and averages.
///
/// Columns run from the first to the last year with a mention. Years before
/// an identifier's first mention are left blank.
pub fn render_year_trends(matrix: &YearMatrix, format: ExportFormat) -> Result<String, ReportError> {
    let trends = matrix.trends();
    let years = matrix.trend_years();

    let mut header = vec!["Identifier".to_string()];
    header.extend(years.iter().map(i32::to_string));
    header.push("Total".into());
    header.push("Average".into());

    match format {
        ExportFormat::Json => {
            let report = YearReport {
                years: matrix.years(),
                papers: matrix.papers_per_year().map(|(_, n)| n).collect(),
                trend_years: years,
                trends,
            };
            Ok(serde_json::to_string_pretty(&report)? + "\n")
        }
        ExportFormat::Csv => csv_table(&header, trends.iter().map(trend_row)),
        ExportFormat::Markdown => {
            let mut out = String::from("# Mentions per year\n\n");
            md_header(&mut out, &header);
            for t in &trends {
                md_row(&mut out, &trend_row(t));
            }

            let papers_in_span: Vec<usize> = matrix
                .papers_per_year()
                .filter(|(year, _)| years.contains(year))
                .map(|(_, n)| n)
                .collect();
            let mut papers = vec!["*papers*".to_string()];
            papers.extend(papers_in_span.iter().map(usize::to_string));
            papers.push(papers_in_span.iter().sum::<usize>().to_string());
            papers.push(String::new());
            md_row(&mut out, &papers);

            if let Some((year, n)) = matrix.peak_year() {
                let _ = writeln!(out, "\nPeak year: {year} ({n} papers)");
            }
            Ok(out)
        }
    }
}

// =============================================================================
// Top identifiers per year
// =============================================================================

/// Render the per-year top lists; recurring identifiers are flagged.
pub fn render_top_per_year(tops: &[YearTop], format: ExportFormat) -> Result<String, ReportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(tops)? + "\n"),
        ExportFormat::Csv => csv_table(
            &strings(["Year", "Papers", "Rank", "Identifier", "Count", "Recurring"]),
            tops.iter().flat_map(|top| {
                top.entries.iter().enumerate().map(move |(rank, e)| {
                    [
                        top.year.to_string(),
                        top.papers.to_string(),
                        (rank + 1).to_string(),
                        e.identifier.clone(),
                        e.count.to_string(),
                        e.recurring.to_string(),
                    ]
                })
            }),
        ),
        ExportFormat::Markdown => {
            let mut out = String::from("# Top miRNAs per year\n\n");
            for top in tops {
                let _ = writeln!(out, "## {} ({} papers)\n", top.year, top.papers);
                if top.entries.is_empty() {
                    out.push_str("_No validated mentions._\n\n");
                    continue;
                }
                for (rank, e) in top.entries.iter().enumerate() {
                    let marker = if e.recurring { " *" } else { "" };
                    let _ = writeln!(out, "{}. {} ({}){}", rank + 1, md_escape(&e.identifier), e.count, marker);
                }
                out.push('\n');
            }
            out.push_str("`*` also in the top list of another year.\n");
            Ok(out)
        }
    }
}

// =============================================================================
// Author matrix
// =============================================================================

#[derive(Serialize)]
struct AuthorRecord<'a> {
    author: &'a str,
    documents: usize,
    counts: BTreeMap<&'a str, usize>,
}

/// Render the author x identifier matrix, one row per author.
pub fn render_author_matrix(
    matrix: &AuthorMatrix,
    format: ExportFormat,
) -> Result<String, ReportError> {
    let identifiers: Vec<&str> = matrix.identifiers().into_iter().collect();

    let mut header = strings(["Author", "Documents"]);
    header.extend(identifiers.iter().map(|id| id.to_string()));
    let row = |author: &str| {
        let mut row = vec![author.to_string(), matrix.documents(author).to_string()];
        row.extend(identifiers.iter().map(|id| matrix.count(author, id).to_string()));
        row
    };

    match format {
        ExportFormat::Json => {
            let records: Vec<AuthorRecord<'_>> = matrix
                .authors()
                .map(|author| AuthorRecord {
                    author,
                    documents: matrix.documents(author),
                    counts: identifiers
                        .iter()
                        .map(|&id| (id, matrix.count(author, id)))
                        .filter(|&(_, n)| n > 0)
                        .collect(),
                })
                .collect();
            Ok(serde_json::to_string_pretty(&records)? + "\n")
        }
        ExportFormat::Csv => csv_table(&header, matrix.authors().map(row)),
        ExportFormat::Markdown => {
            let mut out = String::from("# miRNAs per author\n\n");
            md_header(&mut out, &header);
            for author in matrix.authors() {
                md_row(&mut out, &row(author));
            }
            Ok(out)
        }
    }
}
