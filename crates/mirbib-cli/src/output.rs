use std::io::Write;

use mirbib_core::{CorpusStats, OrganismFilter, ReferenceIdentifierSet, ValidationPolicy};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn header(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

/// Print load statistics for the reference set.
pub fn print_reference_summary(
    w: &mut dyn Write,
    reference: &ReferenceIdentifierSet,
    organism: &OrganismFilter,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = reference.stats();
    header(w, "REFERENCE", color)?;
    writeln!(w, "  Organism: {}", organism.marker().unwrap_or("<any>"))?;
    writeln!(
        w,
        "  Precursor lines read: {} ({} identifiers)",
        stats.precursor_lines, stats.precursor_identifiers
    )?;
    writeln!(
        w,
        "  Mature lines read: {} ({} identifiers)",
        stats.mature_lines, stats.mature_identifiers
    )?;
    if stats.malformed > 0 {
        let msg = format!("Malformed lines skipped: {}", stats.malformed);
        if color.enabled() {
            writeln!(w, "  {}", msg.yellow())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    if color.enabled() {
        writeln!(w, "  {} {}", "Distinct identifiers:".green(), reference.len())?;
    } else {
        writeln!(w, "  Distinct identifiers: {}", reference.len())?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print the identifier list, one per line.
pub fn print_identifiers(w: &mut dyn Write, reference: &ReferenceIdentifierSet) -> std::io::Result<()> {
    for id in reference.iter() {
        writeln!(w, "{}", id)?;
    }
    Ok(())
}

/// Print the summary after a corpus has been processed.
pub fn print_corpus_summary(
    w: &mut dyn Write,
    stats: &CorpusStats,
    policy: ValidationPolicy,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    header(w, "SUMMARY", color)?;
    writeln!(w, "  Documents: {}", stats.documents)?;
    writeln!(w, "  Validation policy: {}", policy)?;
    writeln!(w, "  Candidates found: {}", stats.candidates)?;

    let without = stats.documents - stats.documents_with_mentions;
    if color.enabled() {
        writeln!(
            w,
            "  {} {}",
            "Documents with validated mentions:".green(),
            stats.documents_with_mentions
        )?;
    } else {
        writeln!(
            w,
            "  Documents with validated mentions: {}",
            stats.documents_with_mentions
        )?;
    }
    if without > 0 {
        let msg = format!("Documents without mentions: {}", without);
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w, "  Validated mentions: {}", stats.validated)?;
    writeln!(w, "  Distinct miRNAs: {}", stats.distinct_identifiers)?;

    if stats.candidates > 0 && stats.validated == 0 {
        let msg = "No candidate matched the reference set; check the organism filter";
        if color.enabled() {
            writeln!(w, "  {}", msg.yellow())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_corpus_summary_plain() {
        let stats = CorpusStats {
            documents: 3,
            documents_with_mentions: 2,
            candidates: 4,
            validated: 3,
            distinct_identifiers: 2,
        };
        let out = render(|w| {
            print_corpus_summary(w, &stats, ValidationPolicy::MatureAware, ColorMode(false))
        });
        assert!(out.contains("SUMMARY"));
        assert!(out.contains("Validation policy: mature"));
        assert!(out.contains("Documents without mentions: 1"));
        assert!(out.contains("Distinct miRNAs: 2"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_reference_summary_any_organism() {
        let reference = ReferenceIdentifierSet::from_identifiers(["miR-21", "miR-155"]);
        let out = render(|w| {
            print_reference_summary(w, &reference, &OrganismFilter::any(), ColorMode(false))
        });
        assert!(out.contains("Organism: <any>"));
        assert!(out.contains("Distinct identifiers: 2"));
        assert!(!out.contains("Malformed"));
    }

    #[test]
    fn test_print_identifiers_sorted() {
        let reference = ReferenceIdentifierSet::from_identifiers(["miR-21", "miR-155"]);
        let out = render(|w| print_identifiers(w, &reference));
        assert_eq!(out, "miR-155\nmiR-21\n");
    }
}
